use node_plugin::message::NodeItem;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{item_failure, single_failure, with_success};
use crate::client::{
    ChatbotModel, CreateChatbotRequest, QAndA, RetrainRequest, ScrapeOptions, UpdateSettingsRequest,
};
use crate::error::ChatDataError;
use crate::node::NodeContext;

fn non_blank(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.trim().is_empty())
}

fn urls(list: &[String]) -> Vec<String> {
    list.iter().filter(|u| !u.trim().is_empty()).cloned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChatbotIdParams {
    pub chatbot_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBasePromptParams {
    #[serde(rename = "chatbot_id")]
    pub chatbot_id: String,
    pub base_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetrainParams {
    #[serde(rename = "chatbot_id")]
    pub chatbot_id: String,
    /// Plain text added to the knowledge base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default)]
    pub q_and_as: Vec<QAndA>,
    #[serde(default)]
    pub urls_to_scrape: Vec<String>,
    #[serde(default)]
    pub options: ScrapeOptions,
}

impl RetrainParams {
    pub fn to_request(&self) -> RetrainRequest {
        RetrainRequest {
            chatbot_id: self.chatbot_id.clone(),
            source_text: non_blank(&self.source_text),
            q_and_as: self.q_and_as.clone(),
            urls_to_scrape: urls(&self.urls_to_scrape),
            options: (!self.options.is_empty()).then(|| self.options.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatbotParams {
    pub chatbot_name: String,
    #[serde(default)]
    pub model: ChatbotModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default)]
    pub urls_to_scrape: Vec<String>,
    /// Backend URL, only for `custom-model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_backend: Option<String>,
    /// Bearer token for the custom backend, only for `custom-model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

impl CreateChatbotParams {
    pub fn to_request(&self) -> CreateChatbotRequest {
        let custom = self.model == ChatbotModel::CustomModel;
        CreateChatbotRequest {
            chatbot_name: self.chatbot_name.clone(),
            model: self.model,
            source_text: non_blank(&self.source_text),
            urls_to_scrape: urls(&self.urls_to_scrape),
            custom_backend: custom.then(|| non_blank(&self.custom_backend)).flatten(),
            bearer: custom.then(|| non_blank(&self.bearer)).flatten(),
        }
    }
}

pub async fn create_chatbot(
    params: &CreateChatbotParams,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    match client.create_chatbot(&params.to_request()).await {
        Ok(response) => Ok(vec![NodeItem::new(response)]),
        Err(e) => single_failure(e, ctx),
    }
}

pub async fn get_chatbot_status(
    params: &ChatbotIdParams,
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    match client.chatbot_status(&params.chatbot_id).await {
        Ok(response) => Ok(vec![NodeItem::new(response)]),
        Err(e) => single_failure(e, ctx),
    }
}

pub async fn retrain_chatbot(
    params: &RetrainParams,
    items: &[NodeItem],
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    let request = params.to_request();
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match client.retrain_chatbot(&request).await {
            Ok(response) => {
                out.push(NodeItem::paired(with_success(response, &params.chatbot_id), index))
            }
            Err(e) => out.push(item_failure(e, item, index, ctx)?),
        }
    }
    Ok(out)
}

pub async fn update_base_prompt(
    params: &UpdateBasePromptParams,
    items: &[NodeItem],
    ctx: &NodeContext,
) -> Result<Vec<NodeItem>, ChatDataError> {
    let client = ctx.client().await?;
    let request = UpdateSettingsRequest {
        chatbot_id: params.chatbot_id.clone(),
        base_prompt: params.base_prompt.clone(),
    };
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match client.update_chatbot_settings(&request).await {
            Ok(response) => {
                out.push(NodeItem::paired(with_success(response, &params.chatbot_id), index))
            }
            Err(e) => out.push(item_failure(e, item, index, ctx)?),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn custom_backend_only_for_custom_model() {
        let mut params = CreateChatbotParams {
            chatbot_name: "Support".into(),
            model: ChatbotModel::CustomDataUpload,
            source_text: Some("  ".into()),
            urls_to_scrape: vec!["https://example.com".into(), String::new()],
            custom_backend: Some("https://llm.local".into()),
            bearer: Some("tok".into()),
        };
        assert_eq!(
            serde_json::to_value(params.to_request()).unwrap(),
            json!({
                "chatbotName": "Support",
                "model": "custom-data-upload",
                "urlsToScrape": ["https://example.com"]
            })
        );

        params.model = ChatbotModel::CustomModel;
        let body = serde_json::to_value(params.to_request()).unwrap();
        assert_eq!(body["customBackend"], "https://llm.local");
        assert_eq!(body["bearer"], "tok");
    }

    #[test]
    fn retrain_sends_options_only_when_set() {
        let params: RetrainParams = serde_json::from_value(json!({
            "chatbot_id": "cb1",
            "sourceText": "Opening hours are 9-5.",
        }))
        .unwrap();
        let body = serde_json::to_value(params.to_request()).unwrap();
        assert_eq!(body, json!({"chatbotId": "cb1", "sourceText": "Opening hours are 9-5."}));
    }
}
