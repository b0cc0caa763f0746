use node_plugin::message::NodeItem;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::TriggerOperation;

/// Fields the API sometimes sends as JSON encoded inside a string.
const NESTED_FIELDS: [&str; 3] = ["messages", "answer", "lead"];

/// Turn a raw request body into a payload object.
pub fn from_bytes(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => normalize(value),
        Err(e) => {
            warn!(error = %e, "discarding delivery with a non-JSON body");
            None
        }
    }
}

/// Accept a pre-parsed body, a string holding JSON, or an object; decode the
/// nested string fields in place. Anything that is not an object is dropped.
pub fn normalize(value: Value) -> Option<Map<String, Value>> {
    let value = match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("discarding delivery: string body is not JSON");
                return None;
            }
        },
        other => other,
    };
    let Value::Object(mut payload) = value else {
        warn!("discarding delivery: payload is not a JSON object");
        return None;
    };
    decode_nested(&mut payload);
    Some(payload)
}

fn decode_nested(payload: &mut Map<String, Value>) {
    for field in NESTED_FIELDS {
        let Some(Value::String(text)) = payload.get(field) else { continue };
        match serde_json::from_str::<Value>(text) {
            Ok(decoded @ (Value::Object(_) | Value::Array(_))) => {
                payload.insert(field.to_string(), decoded);
            }
            _ => debug!(field, "nested field left as a string"),
        }
    }
}

/// Pass a delivery downstream only if it carries the configured
/// operation's event tag and, when a chatbot is configured, its id.
pub fn accept(
    operation: Option<TriggerOperation>,
    configured_chatbot_id: &str,
    payload: Map<String, Value>,
) -> Option<NodeItem> {
    let Some(operation) = operation else {
        warn!("discarding delivery for a trigger without a webhook event");
        return None;
    };
    let event = payload.get("event").and_then(Value::as_str);
    if event != Some(operation.event_type().as_str()) {
        debug!(?event, expected = operation.event_type().as_str(), "event does not match trigger");
        return None;
    }

    if !configured_chatbot_id.is_empty() {
        let delivered = payload.get("chatbot_id").and_then(Value::as_str);
        if delivered != Some(configured_chatbot_id) {
            debug!(?delivered, "delivery is for another chatbot");
            return None;
        }
    }

    Some(NodeItem::paired(Value::Object(payload), 0))
}
