use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, bail};
use axum::{Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use clap::{Args, Subcommand};
use node_plugin::message::{NodeSettings, WorkflowMode};
use tokio::net::TcpListener;
use tracing::{error, info};
use url::Url;

use chatdata::node::NodeContext;
use chatdata::nodes::ChatDataTrigger;
use chatdata::webhook::{CreateOutcome, DeleteOutcome, TriggerOperation};

use super::CliContext;

#[derive(Args, Debug)]
pub struct WebhookArgs {
    #[command(subcommand)]
    pub command: WebhookCommands,
}

#[derive(Args, Debug, Clone)]
pub struct TriggerArgs {
    /// onLeadSubmission, onLiveChatEscalation or onNewMessage
    #[arg(long, value_parser = parse_operation)]
    pub operation: TriggerOperation,

    /// Chatbot id
    #[arg(long)]
    pub chatbot_id: String,

    /// Public callback URL Chat Data posts events to
    #[arg(long)]
    pub url: Url,

    /// Name under which the registration is kept in <root>/state
    #[arg(long, default_value = "chatdata-trigger")]
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum WebhookCommands {
    /// Register the callback unless it already is
    Register(TriggerArgs),

    /// Remove the registration kept under `name`
    Unregister {
        #[arg(long, default_value = "chatdata-trigger")]
        name: String,
    },

    /// Register, serve the callback and print accepted events until Ctrl-C
    Listen {
        #[command(flatten)]
        trigger: TriggerArgs,

        /// Local address to serve the callback on
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: SocketAddr,
    },
}

fn parse_operation(value: &str) -> Result<TriggerOperation, String> {
    TriggerOperation::parse(value).ok_or_else(|| format!("`{value}` is not a webhook trigger"))
}

async fn trigger_context(
    context: &CliContext,
    name: &str,
    url: &str,
) -> anyhow::Result<NodeContext> {
    Ok(context
        .node_context(NodeSettings::named(name))
        .await?
        .with_mode(WorkflowMode::Trigger)
        .with_webhook_url(url))
}

/// Removal as the host does it when a workflow is deleted.
async fn teardown(trigger: &ChatDataTrigger, ctx: NodeContext) -> anyhow::Result<()> {
    let ctx = ctx.with_mode(WorkflowMode::Internal);
    match trigger.delete(&ctx).await? {
        DeleteOutcome::Deregistered => println!("✅ Webhook removed."),
        DeleteOutcome::NotRegistered => println!("No webhook registered."),
        DeleteOutcome::Kept => println!("Webhook kept."),
    }
    Ok(())
}

async fn register(trigger: &ChatDataTrigger, ctx: &NodeContext) -> anyhow::Result<()> {
    if trigger.check_exists(ctx).await? {
        println!("✅ Webhook already registered.");
        return Ok(());
    }
    match trigger.create(ctx).await? {
        CreateOutcome::Registered(reg) => {
            println!("✅ Webhook registered for `{}` on {}.", reg.event_type, reg.webhook_url)
        }
        CreateOutcome::NotApplicable => println!("Operation has no webhook event."),
    }
    Ok(())
}

pub async fn execute(args: WebhookArgs, context: &CliContext) -> anyhow::Result<()> {
    match args.command {
        WebhookCommands::Register(args) => {
            let trigger = ChatDataTrigger::new(args.operation, &args.chatbot_id);
            let ctx = trigger_context(context, &args.name, args.url.as_str()).await?;
            register(&trigger, &ctx).await
        }
        WebhookCommands::Unregister { name } => {
            // the stored registration carries the url; the node parameters are not needed
            let trigger = ChatDataTrigger::new(TriggerOperation::OnNewMessage, "");
            let ctx = trigger_context(context, &name, "").await?;
            teardown(&trigger, ctx).await
        }
        WebhookCommands::Listen { trigger: args, bind } => listen(args, bind, context).await,
    }
}

#[derive(Clone)]
struct ListenState {
    trigger: Arc<ChatDataTrigger>,
}

async fn handle_delivery(State(state): State<ListenState>, body: Bytes) -> StatusCode {
    let delivery_id = uuid::Uuid::new_v4();
    match state.trigger.webhook(&body) {
        Some(item) => match serde_json::to_string(&item.json) {
            Ok(line) => {
                info!(%delivery_id, "delivery accepted");
                println!("{line}");
            }
            Err(e) => error!(%delivery_id, "could not print delivery: {e}"),
        },
        None => info!(%delivery_id, "delivery filtered out"),
    }
    StatusCode::OK
}

async fn listen(args: TriggerArgs, bind: SocketAddr, context: &CliContext) -> anyhow::Result<()> {
    let path = match args.url.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };
    if path.contains('{') {
        bail!("callback url path must not contain route parameters: {path}");
    }

    let trigger = Arc::new(ChatDataTrigger::new(args.operation, &args.chatbot_id));
    let ctx = trigger_context(context, &args.name, args.url.as_str()).await?;
    register(&trigger, &ctx).await?;

    let app = Router::new()
        .route(&path, post(handle_delivery))
        .with_state(ListenState { trigger: trigger.clone() });
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening for Chat Data events on {bind}{path}");
    eprintln!("Listening on {bind}{path}, press Ctrl-C to stop and remove the webhook.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for Ctrl-C: {e}");
            }
        })
        .await?;

    teardown(&trigger, ctx).await
}
