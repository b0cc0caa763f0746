use node_plugin::message::NodeItem;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::{item_failure, single_failure};
use crate::client::{BaseModel, ChatMessage, ChatRequest, HttpMethod, RawCall, ResponseFormat};
use crate::collector::{Collection, PageFilters, PaginatedCollector, Source};
use crate::error::ChatDataError;
use crate::node::NodeContext;

fn default_limit() -> usize {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    #[serde(rename = "chatbot_id")]
    pub chatbot_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub additional_fields: SendMessageOptions,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageOptions {
    /// Continue an existing conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Only used by chatbots with a custom backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_model: Option<BaseModel>,
    /// Override the chatbot's base prompt for this request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_prompt: Option<String>,
    /// Whether the messages are appended to the conversation (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_messages: Option<bool>,
    /// Whether to stream the response (default false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl SendMessageParams {
    pub fn to_request(&self) -> Result<ChatRequest, ChatDataError> {
        let mut request = ChatRequest::new(&self.chatbot_id, self.messages.clone())?;
        let extra = &self.additional_fields;
        request.conversation_id = extra.conversation_id.clone().filter(|s| !s.is_empty());
        request.base_model = extra.base_model;
        request.base_prompt = extra.base_prompt.clone().filter(|s| !s.is_empty());
        if let Some(append) = extra.append_messages {
            request.append_messages = append;
        }
        if let Some(stream) = extra.stream {
            request.stream = stream;
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectParams {
    #[serde(rename = "chatbot_id")]
    pub chatbot_id: String,
    /// Max number of results to return; 0 returns everything
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub additional_fields: CollectFilters,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectFilters {
    /// Only records created after this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Only records created before this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default)]
    pub source: Source,
    /// Conversations of one lead only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
}

impl CollectFilters {
    fn page_filters(&self, collection: Collection) -> Result<PageFilters, ChatDataError> {
        let lead_id = match collection {
            Collection::Conversations => self.lead_id.as_deref(),
            Collection::Leads => None,
        };
        PageFilters::from_dates(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            Some(self.source),
            lead_id,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NameValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiCallParams {
    /// Endpoint path, must start with /api/v2/
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub headers: Vec<NameValue>,
    #[serde(default)]
    pub qs: Vec<NameValue>,
    /// JSON object sent with POST, PUT and PATCH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ApiCallParams {
    pub fn to_call(&self) -> RawCall {
        let pairs = |list: &[NameValue]| {
            list.iter()
                .map(|nv| (nv.name.clone(), nv.value.clone()))
                .collect::<Vec<_>>()
        };
        RawCall {
            method: self.method,
            path: self.url.clone(),
            headers: pairs(&self.headers),
            query: pairs(&self.qs),
            body: self.body.clone(),
        }
    }
}

pub async fn send_message(
    params: &SendMessageParams,
    items: &[NodeItem],
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let result = match params.to_request() {
            Ok(request) => client.chat(&request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(response) => out.push(NodeItem::paired(json!({ "output": response }), index)),
            Err(e) => out.push(item_failure(e, item, index, ctx)?),
        }
    }
    Ok(out)
}

async fn collect(
    collection: Collection,
    params: &CollectParams,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let result = async {
        let client = ctx.client().await?;
        let filters = params.additional_fields.page_filters(collection)?;
        PaginatedCollector::new(&client)
            .collect(collection, &params.chatbot_id, filters, params.limit)
            .await
    }
    .await;

    match result {
        Ok(records) => Ok(records.into_iter().map(NodeItem::new).collect()),
        Err(e) if e.is_configuration() => Err(e),
        Err(e) => single_failure(e, ctx),
    }
}

pub async fn get_leads(params: &CollectParams, ctx: &NodeContext) -> Result<Vec<NodeItem>, ChatDataError> {
    collect(Collection::Leads, params, ctx).await
}

pub async fn get_conversations(
    params: &CollectParams,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    collect(Collection::Conversations, params, ctx).await
}

pub async fn make_api_call(
    params: &ApiCallParams,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    match client.raw_call(&params.to_call()).await {
        Ok(response) => {
            let json = match params.response_format {
                ResponseFormat::Json => response,
                ResponseFormat::String => match response {
                    text @ Value::String(_) => text,
                    other => Value::String(other.to_string()),
                },
            };
            Ok(vec![NodeItem::new(json)])
        }
        Err(e) if ctx.continue_on_fail() => {
            warn!(error = %e, "api call failed, continuing");
            Ok(vec![NodeItem::new(json!({
                "error": e.to_string(),
                "statusCode": e.status_code(),
            }))])
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MessageRole;

    #[test]
    fn send_message_options_override_defaults() {
        let params = SendMessageParams {
            chatbot_id: "cb1".into(),
            messages: vec![ChatMessage { role: MessageRole::Assistant, content: "hello".into() }],
            additional_fields: SendMessageOptions {
                conversation_id: Some(String::new()),
                base_model: Some(BaseModel::Gpt4o),
                append_messages: Some(false),
                ..Default::default()
            },
        };
        let body = serde_json::to_value(params.to_request().unwrap()).unwrap();
        assert_eq!(body["baseModel"], "gpt-4o");
        assert_eq!(body["appendMessages"], false);
        assert_eq!(body["stream"], false);
        assert!(body.get("conversationId").is_none());
    }

    #[test]
    fn lead_id_only_applies_to_conversations() {
        let filters = CollectFilters { lead_id: Some("lead-9".into()), ..Default::default() };
        assert_eq!(filters.page_filters(Collection::Leads).unwrap().lead_id, None);
        assert_eq!(
            filters.page_filters(Collection::Conversations).unwrap().lead_id.as_deref(),
            Some("lead-9")
        );
    }

    #[test]
    fn api_call_params_deserialize_from_host_shape() {
        let params: ApiCallParams = serde_json::from_value(json!({
            "url": "/api/v2/get-chatbots",
            "method": "GET",
            "responseFormat": "string",
            "qs": [{"name": "size", "value": "5"}]
        }))
        .unwrap();
        let call = params.to_call();
        assert_eq!(call.query, vec![("size".to_string(), "5".to_string())]);
        assert_eq!(params.response_format, ResponseFormat::String);
    }
}
