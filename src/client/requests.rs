use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatDataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum BaseModel {
    #[default]
    #[serde(rename = "gpt-3.5")]
    Gpt35,
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "gpt-4")]
    Gpt4,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub chatbot_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model: Option<BaseModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_prompt: Option<String>,
    pub append_messages: bool,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(chatbot_id: &str, messages: Vec<ChatMessage>) -> Result<Self, ChatDataError> {
        if messages.is_empty() {
            return Err(ChatDataError::Validation("At least one message is required".into()));
        }
        Ok(Self {
            chatbot_id: chatbot_id.to_string(),
            messages,
            conversation_id: None,
            base_model: None,
            base_prompt: None,
            append_messages: true,
            stream: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QAndA {
    pub question: String,
    pub answer: String,
}

/// Crawler options for `urlsToScrape`. Unset options are not sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    /// Cookies separated by semicolons, used to authorize the scraping process
    #[serde(rename = "Cookies", default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    /// Remove common non-content elements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_main_content: Option<bool>,
    /// Comma-separated CSS selectors to extract exclusively
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_only_tags: Option<String>,
    /// Comma-separated CSS selectors to exclude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tags: Option<String>,
}

impl ScrapeOptions {
    pub fn is_empty(&self) -> bool {
        self == &ScrapeOptions::default()
    }
}

/// Body of `POST /retrain-chatbot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrainRequest {
    pub chatbot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub q_and_as: Vec<QAndA>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls_to_scrape: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ScrapeOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ChatbotModel {
    #[default]
    CustomDataUpload,
    MedicalChatVet,
    MedicalChatHuman,
    CustomModel,
}

/// Body of `POST /create-chatbot`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatbotRequest {
    pub chatbot_name: String,
    pub model: ChatbotModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls_to_scrape: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer: Option<String>,
}

/// Body of `POST /update-chatbot-settings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub chatbot_id: String,
    pub base_prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    String,
}

/// A raw call against any `/api/v2/...` endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCall {
    pub method: crate::client::HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    /// Raw JSON text; only sent for methods that carry a body.
    pub body: Option<String>,
}

impl RawCall {
    pub const PREFIX: &'static str = "/api/v2/";

    pub fn validate_path(&self) -> Result<(), ChatDataError> {
        if self.path.starts_with(Self::PREFIX) {
            Ok(())
        } else {
            Err(ChatDataError::Validation(
                "URL must start with \"/api/v2/\". Please use the format: /api/v2/your-endpoint"
                    .into(),
            ))
        }
    }

    /// Parse the body text into a JSON object. Blank text sends `{}`.
    pub fn parsed_body(&self) -> Result<Option<Value>, ChatDataError> {
        if !self.method.carries_body() {
            return Ok(None);
        }
        let text = self.body.as_deref().unwrap_or("{}");
        if text.trim().is_empty() {
            return Ok(Some(Value::Object(Map::new())));
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value @ Value::Object(_)) => Ok(Some(value)),
            _ => Err(ChatDataError::Validation("Body must be a valid JSON object".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpMethod;
    use serde_json::json;

    #[test]
    fn chat_request_defaults_and_validation() {
        let err = ChatRequest::new("cb1", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "At least one message is required");

        let req = ChatRequest::new(
            "cb1",
            vec![ChatMessage { role: MessageRole::User, content: "hi".into() }],
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "chatbotId": "cb1",
                "messages": [{"role": "user", "content": "hi"}],
                "appendMessages": true,
                "stream": false
            })
        );
    }

    #[test]
    fn retrain_request_omits_empty_parts() {
        let req = RetrainRequest {
            chatbot_id: "cb1".into(),
            source_text: None,
            q_and_as: vec![QAndA { question: "q".into(), answer: "a".into() }],
            urls_to_scrape: vec![],
            options: Some(ScrapeOptions { cookies: Some("a=b".into()), ..Default::default() }),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "chatbotId": "cb1",
                "qAndAs": [{"question": "q", "answer": "a"}],
                "options": {"Cookies": "a=b"}
            })
        );
    }

    #[test]
    fn raw_call_checks_prefix_and_body() {
        let mut call = RawCall { path: "/v1/chat".into(), ..Default::default() };
        assert!(call.validate_path().unwrap_err().to_string().starts_with("URL must start with"));

        call.path = "/api/v2/chat".into();
        call.validate_path().unwrap();
        call.body = Some("not json".into());
        assert_eq!(call.parsed_body().unwrap(), None);

        call.method = HttpMethod::Post;
        assert_eq!(call.parsed_body().unwrap_err().to_string(), "Body must be a valid JSON object");
        call.body = Some("[1]".into());
        assert!(call.parsed_body().is_err());
        call.body = Some("{\"a\":1}".into());
        assert_eq!(call.parsed_body().unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn model_names_are_kebab_case() {
        assert_eq!(serde_json::to_value(ChatbotModel::MedicalChatVet).unwrap(), json!("medical-chat-vet"));
        assert_eq!(serde_json::to_value(BaseModel::Gpt35).unwrap(), json!("gpt-3.5"));
    }
}
