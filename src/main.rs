use std::{env, path::PathBuf};

use clap::Parser;
use tracing::error;

mod cli;

use chatdata::config::{ConfigManager, EnvConfigManager};
use chatdata::logger::{LogConfig, init_tracing};
use chatdata::secret::{EnvSecretsManager, SecretsManager};
use cli::{Cli, CliContext};

/// `--root`/`CHATDATA_ROOT`, or the current directory.
fn resolve_root_dir(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = resolve_root_dir(cli.root.clone());

    let log_dir = cli.log_to_file.then(|| root.join("logs"));
    let _telemetry = init_tracing(&LogConfig::new(cli.log_level, log_dir, cli.otel_endpoint.clone()))?;

    // config & secrets
    std::fs::create_dir_all(root.join("config"))?;
    std::fs::create_dir_all(root.join("secrets"))?;
    let config_mgr = ConfigManager(EnvConfigManager::new(root.join("config").join(".env")));
    let secrets_mgr = SecretsManager(EnvSecretsManager::new(Some(root.join("secrets"))));

    let context = CliContext::new(root, config_mgr, secrets_mgr);
    let result = cli::execute(&context, cli.command).await;
    if let Err(e) = &result {
        error!("❌ {e:#}");
    }
    result
}
