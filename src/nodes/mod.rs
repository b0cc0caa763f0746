//! The two node types this plugin contributes to the host: the `ChatData`
//! action node and the `ChatDataTrigger` webhook node.

pub mod action;
pub mod chatbot;
pub mod trigger;

use async_trait::async_trait;
use node_plugin::message::NodeItem;
use schemars::{JsonSchema, Schema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::error::ChatDataError;
use crate::node::{NodeContext, NodeType};

pub use action::{ApiCallParams, CollectFilters, CollectParams, NameValue, SendMessageOptions, SendMessageParams};
pub use chatbot::{ChatbotIdParams, CreateChatbotParams, RetrainParams, UpdateBasePromptParams};
pub use trigger::ChatDataTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Action,
    Chatbot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum ChatDataOperation {
    /// Send a message to a chatbot and get a response
    SendMessage(SendMessageParams),
    /// Retrieve leads captured by a chatbot
    GetLeads(CollectParams),
    /// Retrieve conversations of a chatbot
    GetConversations(CollectParams),
    /// Call any `/api/v2/...` endpoint
    MakeApiCall(ApiCallParams),
    /// Create a new chatbot
    CreateChatbot(CreateChatbotParams),
    /// Add training data to a chatbot
    RetrainChatbot(RetrainParams),
    /// Replace a chatbot's base prompt
    UpdateBasePrompt(UpdateBasePromptParams),
    /// Training status of a chatbot
    GetChatbotStatus(ChatbotIdParams),
}

impl ChatDataOperation {
    pub fn resource(&self) -> Resource {
        match self {
            ChatDataOperation::SendMessage(_)
            | ChatDataOperation::GetLeads(_)
            | ChatDataOperation::GetConversations(_)
            | ChatDataOperation::MakeApiCall(_) => Resource::Action,
            _ => Resource::Chatbot,
        }
    }
}

/// The Chat Data action node. Parameters are fixed per node; per-item
/// operations run once for every input item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(title = "Chat Data")]
pub struct ChatDataNode {
    #[serde(flatten)]
    pub operation: ChatDataOperation,
}

impl ChatDataNode {
    pub fn new(operation: ChatDataOperation) -> Self {
        Self { operation }
    }
}

#[async_trait]
#[typetag::serde]
impl NodeType for ChatDataNode {
    fn type_name(&self) -> String {
        "chatData".to_string()
    }

    async fn execute(
        &self,
        items: Vec<NodeItem>,
        ctx: &NodeContext,
    ) -> Result<Vec<NodeItem>, ChatDataError> {
        match &self.operation {
            ChatDataOperation::SendMessage(p) => action::send_message(p, &items, ctx).await,
            ChatDataOperation::GetLeads(p) => action::get_leads(p, ctx).await,
            ChatDataOperation::GetConversations(p) => action::get_conversations(p, ctx).await,
            ChatDataOperation::MakeApiCall(p) => action::make_api_call(p, ctx).await,
            ChatDataOperation::CreateChatbot(p) => chatbot::create_chatbot(p, ctx).await,
            ChatDataOperation::RetrainChatbot(p) => chatbot::retrain_chatbot(p, &items, ctx).await,
            ChatDataOperation::UpdateBasePrompt(p) => {
                chatbot::update_base_prompt(p, &items, ctx).await
            }
            ChatDataOperation::GetChatbotStatus(p) => chatbot::get_chatbot_status(p, ctx).await,
        }
    }

    fn clone_box(&self) -> Box<dyn NodeType> {
        Box::new(self.clone())
    }

    fn schema(&self) -> Schema {
        schema_for!(ChatDataNode)
    }
}

// ----------------------------------------------------------------------
// Shared output shaping
// ----------------------------------------------------------------------

/// A whole-node failure: fatal, or a single `{error}` item under
/// continue-on-fail.
pub(crate) fn single_failure(
    err: ChatDataError,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    if ctx.continue_on_fail() {
        warn!(error = %err, "continuing after failure");
        Ok(vec![NodeItem::new(json!({ "error": err.to_string() }))])
    } else {
        Err(err)
    }
}

/// A per-item failure: fatal, or the input item with an `error` field,
/// paired to its index, under continue-on-fail.
pub(crate) fn item_failure(
    err: ChatDataError,
    item: &NodeItem,
    index: usize,
    ctx: &NodeContext,
) -> Result<NodeItem, ChatDataError> {
    if !ctx.continue_on_fail() {
        return Err(err);
    }
    warn!(error = %err, item = index, "continuing after item failure");
    let mut json = item.json_object();
    json.insert("error".into(), Value::String(err.to_string()));
    Ok(NodeItem::paired(Value::Object(json), index))
}

/// `{...response, success: true, chatbotId}`.
pub(crate) fn with_success(response: Value, chatbot_id: &str) -> Value {
    let mut map = match response {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("success".into(), Value::Bool(true));
    map.insert("chatbotId".into(), Value::String(chatbot_id.to_string()));
    Value::Object(map)
}
