use clap::Args;
use node_plugin::message::{NodeItem, NodeSettings};
use tracing::info;

use chatdata::collector::Source;
use chatdata::node::NodeType;
use chatdata::nodes::{ChatDataNode, ChatDataOperation, CollectFilters, CollectParams};

use super::{CliContext, print_items};

#[derive(Debug, Clone, Copy)]
pub enum Listing {
    Leads,
    Conversations,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Chatbot id
    pub chatbot_id: String,

    /// Max number of records; 0 fetches everything
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Only records created after this date (e.g. 2024-01-31 or 2024-01-31T12:00:00Z)
    #[arg(long)]
    pub start_date: Option<String>,

    /// Only records created before this date
    #[arg(long)]
    pub end_date: Option<String>,

    /// api, site, Discord, iframe, Messenger, Slack, Whatsapp or widget
    #[arg(long, value_parser = parse_source)]
    pub source: Option<Source>,

    /// Conversations of one lead only
    #[arg(long)]
    pub lead_id: Option<String>,
}

fn parse_source(value: &str) -> Result<Source, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown source `{value}`"))
}

pub async fn execute(listing: Listing, args: CollectArgs, context: &CliContext) -> anyhow::Result<()> {
    let params = CollectParams {
        chatbot_id: args.chatbot_id,
        limit: args.limit,
        additional_fields: CollectFilters {
            start_date: args.start_date,
            end_date: args.end_date,
            source: args.source.unwrap_or_default(),
            lead_id: args.lead_id,
        },
    };
    let (name, operation) = match listing {
        Listing::Leads => ("leads", ChatDataOperation::GetLeads(params)),
        Listing::Conversations => ("conversations", ChatDataOperation::GetConversations(params)),
    };

    let node = ChatDataNode::new(operation);
    let ctx = context.node_context(NodeSettings::named(name)).await?;
    let items = node.execute(vec![NodeItem::default()], &ctx).await?;
    info!("{} {} fetched", items.len(), name);
    print_items(&items)
}
