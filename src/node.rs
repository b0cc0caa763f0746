use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use node_plugin::message::{NodeItem, NodeSettings, WorkflowMode};
use node_plugin::static_data::StaticDataStore;
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};

use crate::client::{ChatDataClient, HttpTransport, OptionEntry};
use crate::config::ConfigManager;
use crate::credentials::ChatDataCredentials;
use crate::error::ChatDataError;
use crate::nodes::{ChatDataNode, ChatDataTrigger};
use crate::secret::SecretsManager;
use crate::webhook::WebhookLifecycle;

pub const GET_CHATBOTS: &str = "getChatbots";

#[async_trait]
#[typetag::serde]
pub trait NodeType: Send + Sync + Debug {
    fn type_name(&self) -> String;

    async fn execute(
        &self,
        items: Vec<NodeItem>,
        ctx: &NodeContext,
    ) -> Result<Vec<NodeItem>, ChatDataError>;

    /// Dynamic dropdown options, by method name.
    async fn load_options(
        &self,
        method: &str,
        ctx: &NodeContext,
    ) -> Result<Vec<OptionEntry>, ChatDataError> {
        match method {
            GET_CHATBOTS => ctx.client().await?.chatbot_options().await,
            other => Err(ChatDataError::Validation(format!("unknown options method `{other}`"))),
        }
    }

    fn clone_box(&self) -> Box<dyn NodeType>;

    /// Return this concrete type's schema.
    fn schema(&self) -> Schema;
}

#[derive(Serialize, Deserialize)]
pub struct Node(pub Box<dyn NodeType>);

impl std::ops::Deref for Node {
    type Target = dyn NodeType;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        Node(self.0.clone_box())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Node").field(&self.0).finish()
    }
}

/// typetag writes `{ "<TypeName>": { ...params } }`; one branch per node type.
impl JsonSchema for Node {
    fn schema_name() -> Cow<'static, str> {
        "Node".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        let action = generator.subschema_for::<ChatDataNode>();
        let trigger = generator.subschema_for::<ChatDataTrigger>();
        json_schema!({
            "oneOf": [
                {
                    "type": "object",
                    "properties": { "ChatDataNode": action },
                    "required": ["ChatDataNode"],
                    "additionalProperties": false
                },
                {
                    "type": "object",
                    "properties": { "ChatDataTrigger": trigger },
                    "required": ["ChatDataTrigger"],
                    "additionalProperties": false
                }
            ]
        })
    }
}

/// Everything the host hands a node for one invocation.
#[derive(Clone)]
pub struct NodeContext {
    config: ConfigManager,
    secrets: SecretsManager,
    transport: Arc<dyn HttpTransport>,
    static_data: Arc<dyn StaticDataStore>,
    settings: NodeSettings,
    mode: WorkflowMode,
    webhook_url: Option<String>,
}

impl NodeContext {
    pub fn new(
        config: ConfigManager,
        secrets: SecretsManager,
        transport: Arc<dyn HttpTransport>,
        static_data: Arc<dyn StaticDataStore>,
    ) -> Self {
        Self {
            config,
            secrets,
            transport,
            static_data,
            settings: NodeSettings::default(),
            mode: WorkflowMode::default(),
            webhook_url: None,
        }
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_mode(mut self, mode: WorkflowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn continue_on_fail(&self) -> bool {
        self.settings.continue_on_fail
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn static_data(&self) -> Arc<dyn StaticDataStore> {
        self.static_data.clone()
    }

    /// A client bound to the resolved credentials. Fails before any
    /// request when credentials are incomplete.
    pub async fn client(&self) -> Result<ChatDataClient, ChatDataError> {
        let credentials = ChatDataCredentials::resolve(&self.config, &self.secrets).await?;
        Ok(ChatDataClient::new(credentials, self.transport.clone()))
    }

    pub fn webhook(&self) -> Result<WebhookLifecycle, ChatDataError> {
        let url = self.webhook_url.as_deref().ok_or_else(|| {
            ChatDataError::Configuration("the host did not assign a webhook url to this node".into())
        })?;
        Ok(WebhookLifecycle::new(self.static_data.clone(), url))
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("config", &self.config)
            .field("secrets", &self.secrets)
            .field("static_data", &self.static_data.name())
            .field("settings", &self.settings)
            .field("mode", &self.mode)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}
