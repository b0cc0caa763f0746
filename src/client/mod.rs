//! Thin, typed access to the Chat Data REST API.
//!
//! Every call goes through [`HttpTransport`], carries the bearer token and
//! JSON headers, ignores HTTP status codes and decodes the in-band
//! `status: "error"` marker once, here, into a [`ChatDataError`].

pub mod requests;
pub mod response;
pub mod transport;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::collector::{Collection, PageRequest};
use crate::credentials::ChatDataCredentials;
use crate::error::ChatDataError;
use crate::logger::instrument_request;
use crate::webhook::EventType;

pub use requests::{
    BaseModel, ChatMessage, ChatRequest, ChatbotModel, CreateChatbotRequest, MessageRole, QAndA,
    RawCall, ResponseFormat, RetrainRequest, ScrapeOptions, UpdateSettingsRequest,
};
pub use response::{ChatbotSummary, OptionEntry, PageDecode};
pub use transport::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, ReqwestTransport};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<EventType>,
    chatbot_id: &'a str,
}

#[derive(Clone)]
pub struct ChatDataClient {
    credentials: ChatDataCredentials,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for ChatDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDataClient")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ChatDataClient {
    pub fn new(credentials: ChatDataCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self { credentials, transport }
    }

    pub fn credentials(&self) -> &ChatDataCredentials {
        &self.credentials
    }

    fn authorize(&self, request: ApiRequest) -> ApiRequest {
        request.header("Authorization", format!("Bearer {}", self.credentials.api_key))
    }

    fn request(&self, method: HttpMethod, path: &str) -> ApiRequest {
        self.authorize(
            ApiRequest::new(method, self.credentials.endpoint(path))
                .header("Accept", "application/json")
                .header("Content-Type", "application/json"),
        )
    }

    fn to_body<T: Serialize>(body: &T) -> Result<Value, ChatDataError> {
        serde_json::to_value(body).map_err(|e| ChatDataError::Validation(e.to_string()))
    }

    /// Send and decode the status envelope.
    async fn call(&self, name: &str, request: ApiRequest, fallback: &str) -> Result<Value, ChatDataError> {
        instrument_request(name, async {
            let response = self.transport.send(request).await?;
            response::check_status(response.body, fallback, response.status)
        })
        .await
    }

    // ----------------------------------------------------------------------
    // Listings
    // ----------------------------------------------------------------------

    pub async fn get_chatbots(&self) -> Result<Vec<ChatbotSummary>, ChatDataError> {
        let request = self.request(HttpMethod::Get, "/get-chatbots");
        let body = self.call("get-chatbots", request, "Failed to fetch chatbots").await?;
        response::decode_chatbots(body)
    }

    /// Dropdown options for chatbot pickers.
    pub async fn chatbot_options(&self) -> Result<Vec<OptionEntry>, ChatDataError> {
        match self.get_chatbots().await {
            Ok(bots) => Ok(bots.into_iter().map(OptionEntry::from).collect()),
            Err(e) => Err(e.prefixed("Failed to fetch chatbots")),
        }
    }

    pub async fn fetch_page(
        &self,
        collection: Collection,
        page: &PageRequest,
    ) -> Result<PageDecode, ChatDataError> {
        let mut request = self.request(HttpMethod::Get, &collection.path(&page.resource_id));
        for (key, value) in page.query_pairs() {
            request = request.query(key, value);
        }
        let fallback = format!("Failed to fetch {}", collection.field());
        let body = self.call(collection.field(), request, &fallback).await?;
        Ok(response::decode_page(&body, collection.field()))
    }

    // ----------------------------------------------------------------------
    // Webhooks
    // ----------------------------------------------------------------------

    pub async fn add_webhook(
        &self,
        url: &str,
        event: EventType,
        chatbot_id: &str,
    ) -> Result<Value, ChatDataError> {
        let body = Self::to_body(&WebhookBody { url, event: Some(event), chatbot_id })?;
        let request = self.request(HttpMethod::Post, "/add-webhook").json(body);
        self.call("add-webhook", request, "Failed to register webhook").await
    }

    pub async fn delete_webhook(&self, url: &str, chatbot_id: &str) -> Result<Value, ChatDataError> {
        let body = Self::to_body(&WebhookBody { url, event: None, chatbot_id })?;
        let request = self.request(HttpMethod::Post, "/delete-webhook").json(body);
        self.call("delete-webhook", request, "Failed to delete webhook").await
    }

    // ----------------------------------------------------------------------
    // Chatbots and messaging
    // ----------------------------------------------------------------------

    pub async fn chat(&self, chat: &ChatRequest) -> Result<Value, ChatDataError> {
        let request = self.request(HttpMethod::Post, "/chat").json(Self::to_body(chat)?);
        self.call("chat", request, "Failed to send message").await
    }

    pub async fn update_chatbot_settings(
        &self,
        settings: &UpdateSettingsRequest,
    ) -> Result<Value, ChatDataError> {
        let request = self
            .request(HttpMethod::Post, "/update-chatbot-settings")
            .json(Self::to_body(settings)?);
        self.call("update-chatbot-settings", request, "Failed to update chatbot settings")
            .await
    }

    pub async fn retrain_chatbot(&self, retrain: &RetrainRequest) -> Result<Value, ChatDataError> {
        let request = self
            .request(HttpMethod::Post, "/retrain-chatbot")
            .json(Self::to_body(retrain)?);
        self.call("retrain-chatbot", request, "Failed to retrain chatbot").await
    }

    pub async fn chatbot_status(&self, chatbot_id: &str) -> Result<Value, ChatDataError> {
        let request = self.request(HttpMethod::Get, &format!("/chatbot/status/{chatbot_id}"));
        self.call("chatbot-status", request, "Failed to get chatbot status").await
    }

    pub async fn create_chatbot(&self, create: &CreateChatbotRequest) -> Result<Value, ChatDataError> {
        let request = self
            .request(HttpMethod::Post, "/create-chatbot")
            .json(Self::to_body(create)?);
        self.call("create-chatbot", request, "Failed to create chatbot").await
    }

    /// Credential test.
    pub async fn current_plan(&self) -> Result<Value, ChatDataError> {
        let request = self.request(HttpMethod::Get, "/current-plan");
        self.call("current-plan", request, "Invalid credentials").await
    }

    /// Arbitrary `/api/v2/...` call. User headers go first; the bearer
    /// token always wins over a user-supplied `Authorization`.
    pub async fn raw_call(&self, call: &RawCall) -> Result<Value, ChatDataError> {
        call.validate_path()?;
        let body = call.parsed_body()?;

        let mut request = ApiRequest::new(call.method, self.credentials.absolute(&call.path));
        for (name, value) in &call.headers {
            if !name.is_empty() {
                request = request.header(name, value.clone());
            }
        }
        request = self.authorize(request);
        for (key, value) in &call.query {
            if !key.is_empty() {
                request = request.query(key, value.clone());
            }
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .json(body);
        }
        self.call("api-call", request, "API call failed").await
    }
}
