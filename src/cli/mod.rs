use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use node_plugin::message::{LogLevel, NodeItem, NodeSettings};
use node_plugin::static_data::{FileStaticData, StaticDataStore};

pub mod chatbot;
pub mod collect;
pub mod node;
pub mod schema;
pub mod settings;
pub mod webhook;

use chatbot::{SendArgs, StatusArgs};
use collect::CollectArgs;
use node::NodeArgs;
use schema::SchemaArgs;
use settings::SettingArgs;
use webhook::WebhookArgs;

use chatdata::client::ReqwestTransport;
use chatdata::node::NodeContext;
use chatdata::{config::ConfigManager, secret::SecretsManager};

#[derive(Parser, Debug)]
#[command(
    name = "chatdata",
    about = "Chat Data nodes and webhook trigger",
    version
)]
pub struct Cli {
    /// Working directory holding config/, secrets/, state/ and logs/
    #[arg(long, global = true, env = "CHATDATA_ROOT")]
    pub root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LogLevel,

    /// Write logs to <root>/logs instead of stderr
    #[arg(long, global = true, default_value_t = false)]
    pub log_to_file: bool,

    /// OpenTelemetry OTLP/HTTP endpoint (e.g. http://localhost:4318)
    #[arg(long, global = true)]
    pub otel_endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the leads of a chatbot
    Leads(CollectArgs),

    /// Fetch the conversations of a chatbot
    Conversations(CollectArgs),

    /// List the chatbots of the account
    Chatbots,

    /// Show the training status of a chatbot
    Status(StatusArgs),

    /// Send a message to a chatbot
    Send(SendArgs),

    /// Run a node definition from a JSON file
    Node(NodeArgs),

    /// Manage the trigger's webhook
    Webhook(WebhookArgs),

    /// Emit JSON-Schema for the nodes and the credential
    Schema(SchemaArgs),

    /// Manage secrets (the API key)
    Secrets(SettingArgs),

    /// Manage configuration (base URL, timeout)
    Config(SettingArgs),
}

#[derive(Clone)]
pub struct CliContext {
    pub root: PathBuf,
    pub config_manager: ConfigManager,
    pub secrets_manager: SecretsManager,
}

impl CliContext {
    pub fn new(
        root: PathBuf,
        config_manager: ConfigManager,
        secrets_manager: SecretsManager,
    ) -> Self {
        Self {
            root,
            config_manager,
            secrets_manager,
        }
    }

    /// Per-node static data lives in `<root>/state/<node>.json`.
    pub fn static_data(&self, node_name: &str) -> Arc<dyn StaticDataStore> {
        FileStaticData::new(self.root.join("state").join(format!("{node_name}.json")))
    }

    pub async fn node_context(&self, settings: NodeSettings) -> anyhow::Result<NodeContext> {
        let transport = ReqwestTransport::new(self.config_manager.timeout().await)?;
        let static_data = self.static_data(&settings.name);
        Ok(NodeContext::new(
            self.config_manager.clone(),
            self.secrets_manager.clone(),
            Arc::new(transport),
            static_data,
        )
        .with_settings(settings))
    }
}

/// One JSON document per line on stdout.
pub fn print_items(items: &[NodeItem]) -> anyhow::Result<()> {
    for item in items {
        println!("{}", serde_json::to_string(&item.json)?);
    }
    Ok(())
}

pub async fn execute(context: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Leads(args) => collect::execute(collect::Listing::Leads, args, context).await,
        Commands::Conversations(args) => {
            collect::execute(collect::Listing::Conversations, args, context).await
        }
        Commands::Chatbots => chatbot::list(context).await,
        Commands::Status(args) => chatbot::status(args, context).await,
        Commands::Send(args) => chatbot::send(args, context).await,
        Commands::Node(args) => node::execute(args, context).await,
        Commands::Webhook(args) => webhook::execute(args, context).await,
        Commands::Schema(args) => schema::execute(args, context).await,
        Commands::Secrets(args) => settings::secrets(args, context).await,
        Commands::Config(args) => settings::config(args, context).await,
    }
}
