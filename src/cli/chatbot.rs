use clap::Args;
use node_plugin::message::{NodeItem, NodeSettings};

use chatdata::client::{ChatMessage, MessageRole};
use chatdata::node::{GET_CHATBOTS, NodeType};
use chatdata::nodes::{ChatDataNode, ChatDataOperation, ChatbotIdParams, SendMessageOptions, SendMessageParams};

use super::{CliContext, print_items};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Chatbot id
    pub chatbot_id: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Chatbot id
    pub chatbot_id: String,

    /// Message text
    pub message: String,

    /// Continue an existing conversation
    #[arg(long)]
    pub conversation_id: Option<String>,

    /// Override the chatbot's base prompt
    #[arg(long)]
    pub base_prompt: Option<String>,
}

pub async fn list(context: &CliContext) -> anyhow::Result<()> {
    let node = ChatDataNode::new(ChatDataOperation::GetChatbotStatus(ChatbotIdParams {
        chatbot_id: String::new(),
    }));
    let ctx = context.node_context(NodeSettings::named("chatbots")).await?;
    for option in node.load_options(GET_CHATBOTS, &ctx).await? {
        println!("{}\t{}", option.value, option.name);
    }
    Ok(())
}

pub async fn status(args: StatusArgs, context: &CliContext) -> anyhow::Result<()> {
    let node = ChatDataNode::new(ChatDataOperation::GetChatbotStatus(ChatbotIdParams {
        chatbot_id: args.chatbot_id,
    }));
    let ctx = context.node_context(NodeSettings::named("status")).await?;
    print_items(&node.execute(vec![NodeItem::default()], &ctx).await?)
}

pub async fn send(args: SendArgs, context: &CliContext) -> anyhow::Result<()> {
    let node = ChatDataNode::new(ChatDataOperation::SendMessage(SendMessageParams {
        chatbot_id: args.chatbot_id,
        messages: vec![ChatMessage { role: MessageRole::User, content: args.message }],
        additional_fields: SendMessageOptions {
            conversation_id: args.conversation_id,
            base_prompt: args.base_prompt,
            ..Default::default()
        },
    }));
    let ctx = context.node_context(NodeSettings::named("send")).await?;
    print_items(&node.execute(vec![NodeItem::default()], &ctx).await?)
}
