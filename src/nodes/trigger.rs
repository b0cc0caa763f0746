use async_trait::async_trait;
use node_plugin::message::NodeItem;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ChatDataError;
use crate::node::{NodeContext, NodeType};
use crate::webhook::{CreateOutcome, DeleteOutcome, TriggerOperation, delivery};

/// Starts a workflow when Chat Data posts an event to the node's webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Chat Data Trigger")]
pub struct ChatDataTrigger {
    /// Event to listen for
    #[schemars(with = "TriggerOperation")]
    pub operation: String,
    /// Only accept events of this chatbot; empty accepts all
    #[serde(default)]
    pub chatbot_id: String,
}

impl ChatDataTrigger {
    pub fn new(operation: TriggerOperation, chatbot_id: &str) -> Self {
        let operation = match serde_json::to_value(operation) {
            Ok(Value::String(s)) => s,
            _ => String::new(),
        };
        Self { operation, chatbot_id: chatbot_id.to_string() }
    }

    pub fn trigger_operation(&self) -> Option<TriggerOperation> {
        TriggerOperation::parse(&self.operation)
    }

    pub async fn check_exists(&self, ctx: &NodeContext) -> Result<bool, ChatDataError> {
        ctx.webhook()?.check_exists().await
    }

    pub async fn create(&self, ctx: &NodeContext) -> Result<CreateOutcome, ChatDataError> {
        let lifecycle = ctx.webhook()?;
        if self.trigger_operation().is_none() {
            // no credentials needed to decline
            return Ok(CreateOutcome::NotApplicable);
        }
        let client = ctx.client().await?;
        lifecycle.create(&client, &self.operation, &self.chatbot_id).await
    }

    pub async fn delete(&self, ctx: &NodeContext) -> Result<DeleteOutcome, ChatDataError> {
        ctx.webhook()?
            .delete_with(ctx.settings(), ctx.mode(), || ctx.client())
            .await
    }

    /// Inbound delivery from a raw request body.
    pub fn webhook(&self, body: &[u8]) -> Option<NodeItem> {
        let payload = delivery::from_bytes(body)?;
        delivery::accept(self.trigger_operation(), &self.chatbot_id, payload)
    }

    /// Inbound delivery the host already parsed.
    pub fn webhook_value(&self, body: Value) -> Option<NodeItem> {
        let payload = delivery::normalize(body)?;
        delivery::accept(self.trigger_operation(), &self.chatbot_id, payload)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[async_trait]
#[typetag::serde]
impl NodeType for ChatDataTrigger {
    fn type_name(&self) -> String {
        "chatDataTrigger".to_string()
    }

    /// Manual run: report the registration while nothing arrived yet,
    /// otherwise hand on the first received payload.
    async fn execute(
        &self,
        items: Vec<NodeItem>,
        ctx: &NodeContext,
    ) -> Result<Vec<NodeItem>, ChatDataError> {
        let store = ctx.static_data();
        let setup_info = store.get("setupInfo").await?;

        let incoming = match (items.first(), setup_info) {
            (None, Some(info)) => json!({
                "webhookSetup": {
                    "status": "success",
                    "message": "Webhook registered successfully. Waiting for events...",
                    "response": info.get("response").cloned().unwrap_or(Value::Null),
                    "chatbotId": info.get("chatbotId").cloned().unwrap_or(Value::Null),
                    "eventType": info.get("eventType").cloned().unwrap_or(Value::Null),
                    "webhookUrl": info.get("webhookUrl").cloned().unwrap_or(Value::Null),
                    "createdAt": info.get("createdAt").cloned().unwrap_or(Value::Null),
                }
            }),
            (Some(item), _) if item.json.is_object() => item.json.clone(),
            (Some(item), _) if is_truthy(&item.json) => match &item.json {
                Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| {
                    json!({
                        "data": text,
                        "parseError": "Could not parse incoming data as JSON",
                    })
                }),
                other => other.clone(),
            },
            (_, setup_info) => {
                let webhook_info = match setup_info {
                    Some(info) => info,
                    None => json!({
                        "eventType": store.get("eventType").await?,
                        "chatbotId": store.get("chatbotId").await?,
                        "webhookUrl": store.get("webhookUrl").await?,
                    }),
                };
                json!({
                    "status": "waiting",
                    "message": "Waiting for webhook data...",
                    "webhookInfo": webhook_info,
                })
            }
        };

        Ok(vec![NodeItem::new(incoming)])
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }

    fn schema(&self) -> Schema {
        schema_for!(ChatDataTrigger)
    }
}
