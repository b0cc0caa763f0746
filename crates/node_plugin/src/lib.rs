pub mod message;
pub mod static_data;
