//! Webhook registration for the trigger node.
//!
//! The registration lives in the node's static data under the keys
//! `chatbotId`, `eventType`, `webhookUrl`, `isPersistent`, `createdAt` and
//! `setupInfo`, so a host inspecting the node sees the same layout it
//! always has.

pub mod delivery;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use node_plugin::message::{NodeSettings, WorkflowMode};
use node_plugin::static_data::StaticDataStore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::client::ChatDataClient;
use crate::error::ChatDataError;

const CHATBOT_ID: &str = "chatbotId";
const EVENT_TYPE: &str = "eventType";
const WEBHOOK_URL: &str = "webhookUrl";
const IS_PERSISTENT: &str = "isPersistent";
const CREATED_AT: &str = "createdAt";
const SETUP_INFO: &str = "setupInfo";

const RECORD_KEYS: [&str; 6] = [CHATBOT_ID, EVENT_TYPE, WEBHOOK_URL, IS_PERSISTENT, CREATED_AT, SETUP_INFO];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    LeadSubmission,
    LiveChatEscalation,
    Chat,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LeadSubmission => "lead-submission",
            EventType::LiveChatEscalation => "live-chat-escalation",
            EventType::Chat => "chat",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lead-submission" => Some(EventType::LeadSubmission),
            "live-chat-escalation" => Some(EventType::LiveChatEscalation),
            "chat" => Some(EventType::Chat),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trigger operations backed by a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TriggerOperation {
    /// A user submits the lead form
    OnLeadSubmission,
    /// A conversation is escalated to a human agent
    OnLiveChatEscalation,
    /// A chat message is sent or received
    OnNewMessage,
}

impl TriggerOperation {
    /// `None` for operations that do not use a webhook.
    pub fn parse(operation: &str) -> Option<Self> {
        match operation {
            "onLeadSubmission" => Some(TriggerOperation::OnLeadSubmission),
            "onLiveChatEscalation" => Some(TriggerOperation::OnLiveChatEscalation),
            "onNewMessage" => Some(TriggerOperation::OnNewMessage),
            _ => None,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            TriggerOperation::OnLeadSubmission => EventType::LeadSubmission,
            TriggerOperation::OnLiveChatEscalation => EventType::LiveChatEscalation,
            TriggerOperation::OnNewMessage => EventType::Chat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    pub chatbot_id: String,
    pub event_type: EventType,
    pub webhook_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub is_persistent: bool,
}

/// What `create` did. Failures are `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Registered(WebhookRegistration),
    /// The operation has no webhook event; nothing was sent.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// Plain deactivation; the remote registration is left in place.
    Kept,
    Deregistered,
    /// Nothing was stored, so there was nothing to remove.
    NotRegistered,
}

/// Registers, checks and tears down one trigger node's webhook.
pub struct WebhookLifecycle {
    store: Arc<dyn StaticDataStore>,
    webhook_url: String,
}

impl WebhookLifecycle {
    /// `webhook_url` is the callback the host currently assigns to the node.
    pub fn new(store: Arc<dyn StaticDataStore>, webhook_url: impl Into<String>) -> Self {
        Self { store, webhook_url: webhook_url.into() }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    async fn get_str(&self, key: &str) -> Result<Option<String>, ChatDataError> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }

    /// The stored registration, if all of its identifying fields are present.
    pub async fn registration(&self) -> Result<Option<WebhookRegistration>, ChatDataError> {
        let (Some(chatbot_id), Some(webhook_url), Some(event)) = (
            self.get_str(CHATBOT_ID).await?,
            self.get_str(WEBHOOK_URL).await?,
            self.get_str(EVENT_TYPE).await?,
        ) else {
            return Ok(None);
        };
        let Some(event_type) = EventType::parse(&event) else {
            warn!(event, "stored webhook has an unknown event type");
            return Ok(None);
        };
        let created_at = self
            .get_str(CREATED_AT)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let is_persistent = self
            .store
            .get(IS_PERSISTENT)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(Some(WebhookRegistration {
            chatbot_id,
            event_type,
            webhook_url,
            created_at,
            is_persistent,
        }))
    }

    /// Raw `setupInfo` written by the last successful `create`.
    pub async fn setup_info(&self) -> Result<Option<Value>, ChatDataError> {
        Ok(self.store.get(SETUP_INFO).await?)
    }

    async fn clear(&self) -> Result<(), ChatDataError> {
        for key in RECORD_KEYS {
            self.store.delete(key).await?;
        }
        Ok(())
    }

    /// True iff a registration is stored for the current callback URL.
    /// A registration for an older URL is stale: it is cleared and reported
    /// as absent.
    pub async fn check_exists(&self) -> Result<bool, ChatDataError> {
        let Some(registration) = self.registration().await? else {
            return Ok(false);
        };
        if registration.webhook_url != self.webhook_url {
            warn!(
                stored = %registration.webhook_url,
                current = %self.webhook_url,
                "webhook url changed, dropping stale registration"
            );
            self.clear().await?;
            return Ok(false);
        }
        Ok(true)
    }

    pub async fn create(
        &self,
        client: &ChatDataClient,
        operation: &str,
        chatbot_id: &str,
    ) -> Result<CreateOutcome, ChatDataError> {
        let Some(operation) = TriggerOperation::parse(operation) else {
            info!(operation, "operation has no webhook event, skipping registration");
            return Ok(CreateOutcome::NotApplicable);
        };
        let event_type = operation.event_type();

        let response = client
            .add_webhook(&self.webhook_url, event_type, chatbot_id)
            .await?;

        let created_at = Utc::now();
        let created = created_at.to_rfc3339();
        self.store.set(CHATBOT_ID, json!(chatbot_id)).await?;
        self.store.set(EVENT_TYPE, json!(event_type)).await?;
        self.store.set(WEBHOOK_URL, json!(self.webhook_url)).await?;
        self.store.set(IS_PERSISTENT, json!(true)).await?;
        self.store.set(CREATED_AT, json!(created)).await?;
        self.store
            .set(
                SETUP_INFO,
                json!({
                    "response": response,
                    "chatbotId": chatbot_id,
                    "eventType": event_type,
                    "webhookUrl": self.webhook_url,
                    "createdAt": created,
                }),
            )
            .await?;

        info!("✅ webhook registered for chatbot {} on `{}`", chatbot_id, event_type);
        Ok(CreateOutcome::Registered(WebhookRegistration {
            chatbot_id: chatbot_id.to_string(),
            event_type,
            webhook_url: self.webhook_url.clone(),
            created_at: Some(created_at),
            is_persistent: true,
        }))
    }

    /// Deregister, but only when the node was removed or the workflow is
    /// being deleted.
    pub async fn delete(
        &self,
        client: &ChatDataClient,
        settings: &NodeSettings,
        mode: WorkflowMode,
    ) -> Result<DeleteOutcome, ChatDataError> {
        self.delete_with(settings, mode, || async { Ok(client.clone()) }).await
    }

    /// Like [`delete`](Self::delete), but only connects once a
    /// deregistration is actually due.
    pub async fn delete_with<F, Fut>(
        &self,
        settings: &NodeSettings,
        mode: WorkflowMode,
        connect: F,
    ) -> Result<DeleteOutcome, ChatDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChatDataClient, ChatDataError>>,
    {
        if !settings.disabled && !mode.is_workflow_deletion() {
            info!(node = %settings.name, %mode, "deactivation only, keeping webhook");
            return Ok(DeleteOutcome::Kept);
        }
        let (Some(chatbot_id), Some(webhook_url)) =
            (self.get_str(CHATBOT_ID).await?, self.get_str(WEBHOOK_URL).await?)
        else {
            return Ok(DeleteOutcome::NotRegistered);
        };

        let client = connect().await?;
        client.delete_webhook(&webhook_url, &chatbot_id).await?;
        self.clear().await?;
        info!("🗑️ webhook removed for chatbot {}", chatbot_id);
        Ok(DeleteOutcome::Deregistered)
    }
}
