use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use node_plugin::message::{NodeItem, NodeSettings};
use serde_json::Value;

use chatdata::node::Node;

use super::{CliContext, print_items};

#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Node definition, e.g. {"ChatDataNode": {"operation": "getLeads", "chatbot_id": "..."}}
    pub file: PathBuf,

    /// JSON array of input items' payloads; defaults to one empty item
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Emit error items instead of failing
    #[arg(long, default_value_t = false)]
    pub continue_on_fail: bool,
}

pub async fn execute(args: NodeArgs, context: &CliContext) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let node: Node = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid node definition", args.file.display()))?;

    let items = match &args.input {
        Some(path) => {
            let payloads: Vec<Value> = serde_json::from_str(&fs::read_to_string(path)?)
                .with_context(|| format!("{} must hold a JSON array", path.display()))?;
            payloads.into_iter().map(NodeItem::new).collect()
        }
        None => vec![NodeItem::default()],
    };

    let mut settings = NodeSettings::named(&node.type_name());
    settings.continue_on_fail = args.continue_on_fail;
    let ctx = context.node_context(settings).await?;

    print_items(&node.execute(items, &ctx).await?)
}
