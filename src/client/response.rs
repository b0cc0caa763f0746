use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ChatDataError;

/// Decode the in-band status marker: any object carrying
/// `status: "error"` is a failure, everything else is the payload.
pub fn check_status(body: Value, fallback: &str, http_status: u16) -> Result<Value, ChatDataError> {
    let is_error = body
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "error");
    if !is_error {
        return Ok(body);
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback);
    Err(ChatDataError::remote(message, Some(http_status)))
}

/// One window of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub enum PageDecode {
    Page { records: Vec<Value>, total: u64 },
    /// The expected array was missing or not an array.
    Exhausted,
}

pub fn decode_page(body: &Value, field: &str) -> PageDecode {
    let Some(records) = body.get(field).and_then(Value::as_array) else {
        warn!(field, "page has no `{}` array, treating listing as exhausted", field);
        return PageDecode::Exhausted;
    };
    PageDecode::Page {
        records: records.clone(),
        total: total_of(body),
    }
}

// `total` is usually a number, occasionally a numeric string; anything else counts as 0.
fn total_of(body: &Value) -> u64 {
    match body.get("total") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotSummary {
    pub chatbot_id: String,
    pub chatbot_name: String,
}

/// A dropdown entry as the host renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub name: String,
    pub value: String,
}

impl From<ChatbotSummary> for OptionEntry {
    fn from(bot: ChatbotSummary) -> Self {
        OptionEntry { name: bot.chatbot_name, value: bot.chatbot_id }
    }
}

pub fn decode_chatbots(body: Value) -> Result<Vec<ChatbotSummary>, ChatDataError> {
    let shape = || ChatDataError::Shape("Invalid response format. Expected chatbots array.".into());
    match body {
        Value::Object(mut map) => match map.remove("chatbots") {
            Some(list @ Value::Array(_)) => serde_json::from_value(list).map_err(|_| shape()),
            _ => Err(shape()),
        },
        _ => Err(shape()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_status_uses_message_or_fallback() {
        let err = check_status(json!({"status": "error", "message": "Chatbot not found"}), "x", 200)
            .unwrap_err();
        assert_eq!(err.to_string(), "Chatbot not found");

        let err = check_status(json!({"status": "error"}), "Failed to register webhook", 200)
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to register webhook");

        let ok = check_status(json!({"status": "success", "id": 1}), "x", 200).unwrap();
        assert_eq!(ok["id"], 1);
        assert_eq!(check_status(json!("plain"), "x", 200).unwrap(), json!("plain"));
    }

    #[test]
    fn page_decodes_records_and_total() {
        let body = json!({"customers": [{"id": 1}, {"id": 2}], "total": "250"});
        assert_eq!(
            decode_page(&body, "customers"),
            PageDecode::Page { records: vec![json!({"id": 1}), json!({"id": 2})], total: 250 }
        );
        assert_eq!(decode_page(&json!({"customers": {}}), "customers"), PageDecode::Exhausted);
        assert_eq!(
            decode_page(&json!({"conversations": []}), "conversations"),
            PageDecode::Page { records: vec![], total: 0 }
        );
    }

    #[test]
    fn chatbots_require_array() {
        let bots = decode_chatbots(json!({"chatbots": [{"chatbotId": "cb1", "chatbotName": "Support"}]}))
            .unwrap();
        assert_eq!(
            OptionEntry::from(bots[0].clone()),
            OptionEntry { name: "Support".into(), value: "cb1".into() }
        );
        let err = decode_chatbots(json!({"bots": []})).unwrap_err();
        assert_eq!(err.to_string(), "Invalid response format. Expected chatbots array.");
    }
}
