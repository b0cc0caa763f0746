//! `config` and `secrets`: the two key/value stores the credential is
//! resolved from. Secret values are never echoed back.

use clap::{Args, Subcommand};
use node_plugin::message::NodeSettings;
use tracing::info;

use super::CliContext;

#[derive(Args, Debug)]
pub struct SettingArgs {
    #[command(subcommand)]
    pub command: SettingCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingCommands {
    /// Store a value, e.g. `secrets set CHATDATA_API_KEY sk-...`
    Set { key: String, value: String },
    /// Remove a value
    Unset { key: String },
    /// Show the stored keys
    List,
    /// Resolve the credential and call `/current-plan` with it
    Verify,
}

pub async fn config(args: SettingArgs, context: &CliContext) -> anyhow::Result<()> {
    let config = &context.config_manager;
    match args.command {
        SettingCommands::Set { key, value } => match config.set(&key, &value).await {
            Ok(()) => println!("✅ {key} set."),
            Err(e) => eprintln!("❌ {key} could not be set: {e}"),
        },
        SettingCommands::Unset { key } => {
            config.del(&key).await;
            println!("✅ {key} removed.");
        }
        SettingCommands::List => {
            let mut keys = config.0.keys().await;
            keys.sort();
            for key in keys {
                println!("{key}={}", config.get(&key).await.unwrap_or_default());
            }
        }
        SettingCommands::Verify => verify(context).await?,
    }
    Ok(())
}

pub async fn secrets(args: SettingArgs, context: &CliContext) -> anyhow::Result<()> {
    let secrets = &context.secrets_manager;
    match args.command {
        SettingCommands::Set { key, value } => match secrets.add_secret(&key, &value).await {
            Ok(()) => println!("✅ Secret {key} stored."),
            Err(e) => eprintln!("❌ Secret {key} could not be stored: {e}"),
        },
        SettingCommands::Unset { key } => match secrets.delete_secret(&key).await {
            Ok(()) => println!("✅ Secret {key} removed."),
            Err(e) => eprintln!("❌ Secret {key} could not be removed: {e}"),
        },
        SettingCommands::List => {
            let mut keys = secrets.0.keys();
            keys.sort();
            for key in keys {
                println!("{key}");
            }
        }
        SettingCommands::Verify => verify(context).await?,
    }
    Ok(())
}

async fn verify(context: &CliContext) -> anyhow::Result<()> {
    let ctx = context.node_context(NodeSettings::named("verify")).await?;
    let client = ctx.client().await?;
    let plan = client.current_plan().await?;
    info!(base = %client.credentials().base(), "credential accepted");
    println!("🔑 Credential accepted.");
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
