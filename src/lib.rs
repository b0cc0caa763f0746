pub mod client;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logger;
pub mod node;
pub mod nodes;
pub mod schema;
pub mod secret;
pub mod webhook;
