mod support;

use std::sync::atomic::{AtomicUsize, Ordering};

use chatdata::client::ApiResponse;
use chatdata::node::{GET_CHATBOTS, Node, NodeType};
use chatdata::nodes::ChatDataTrigger;
use chatdata::config::{ConfigManager, MapConfigManager};
use chatdata::error::ChatDataError;
use chatdata::node::NodeContext;
use chatdata::secret::{MapSecretsManager, SecretsManager};
use chatdata::webhook::{CreateOutcome, DeleteOutcome, TriggerOperation};
use node_plugin::message::{NodeItem, NodeSettings, WorkflowMode};
use node_plugin::static_data::InMemoryStaticData;
use serde_json::{Value, json};
use support::{ScriptedTransport, node_context};

fn node(definition: Value) -> Node {
    serde_json::from_value(definition).unwrap()
}

fn continue_on_fail() -> NodeSettings {
    let mut settings = NodeSettings::named("chat data");
    settings.continue_on_fail = true;
    settings
}

#[tokio::test]
async fn get_leads_emits_one_item_per_record() {
    let transport = ScriptedTransport::new(support::paged("customers", 7));
    let ctx = node_context(transport.clone(), InMemoryStaticData::new());
    let node = node(json!({"ChatDataNode": {"operation": "getLeads", "chatbot_id": "cb1", "limit": 5}}));

    let items = node.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[4].json["id"], 4);
}

#[tokio::test]
async fn collection_failure_becomes_single_error_item() {
    let transport = ScriptedTransport::always(json!({"status": "error", "message": "Chatbot not found"}));
    let ctx = node_context(transport, InMemoryStaticData::new()).with_settings(continue_on_fail());
    let node = node(json!({"ChatDataNode": {"operation": "getConversations", "chatbot_id": "nope"}}));

    let items = node.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items, vec![NodeItem::new(json!({"error": "Chatbot not found"}))]);
}

#[tokio::test]
async fn send_message_runs_per_item_and_pairs_errors() {
    let calls = AtomicUsize::new(0);
    let transport = ScriptedTransport::new(move |_| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            ApiResponse::ok(json!({"answer": "Hi!"}))
        } else {
            ApiResponse::ok(json!({"status": "error", "message": "Chatbot is busy"}))
        }
    });
    let ctx = node_context(transport.clone(), InMemoryStaticData::new()).with_settings(continue_on_fail());
    let node = node(json!({"ChatDataNode": {
        "operation": "sendMessage",
        "chatbot_id": "cb1",
        "messages": [{"role": "user", "content": "Hello"}]
    }}));

    let inputs = vec![NodeItem::new(json!({"row": 1})), NodeItem::new(json!({"row": 2}))];
    let items = node.execute(inputs, &ctx).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].json, json!({"output": {"answer": "Hi!"}}));
    assert_eq!(items[1].json, json!({"row": 2, "error": "Chatbot is busy"}));
    assert_eq!(items[1].paired_item.as_ref().map(|p| p.item), Some(1));

    let sent = transport.sent();
    assert_eq!(sent[0].url, "https://api.test.local/api/v2/chat");
    assert_eq!(
        sent[0].body,
        Some(json!({
            "chatbotId": "cb1",
            "messages": [{"role": "user", "content": "Hello"}],
            "appendMessages": true,
            "stream": false
        }))
    );
}

#[tokio::test]
async fn send_message_without_messages_fails_each_item() {
    let transport = ScriptedTransport::always(json!({}));
    let ctx = node_context(transport.clone(), InMemoryStaticData::new()).with_settings(continue_on_fail());
    let node = node(json!({"ChatDataNode": {"operation": "sendMessage", "chatbot_id": "cb1", "messages": []}}));

    let items = node.execute(vec![NodeItem::new(json!({"row": 1}))], &ctx).await.unwrap();
    assert_eq!(items[0].json, json!({"row": 1, "error": "At least one message is required"}));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn update_base_prompt_merges_success_fields() {
    let transport = ScriptedTransport::always(json!({"status": "success"}));
    let ctx = node_context(transport.clone(), InMemoryStaticData::new());
    let node = node(json!({"ChatDataNode": {
        "operation": "updateBasePrompt", "chatbot_id": "cb1", "basePrompt": "Be brief."
    }}));

    let items = node.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items[0].json, json!({"status": "success", "success": true, "chatbotId": "cb1"}));
    assert_eq!(transport.sent()[0].body, Some(json!({"chatbotId": "cb1", "basePrompt": "Be brief."})));
}

#[tokio::test]
async fn make_api_call_checks_prefix_and_forces_bearer() {
    let transport = ScriptedTransport::always(json!({"plan": "pro"}));
    let ctx = node_context(transport.clone(), InMemoryStaticData::new());

    let bad = node(json!({"ChatDataNode": {"operation": "makeApiCall", "url": "/current-plan"}}));
    let err = bad.execute(vec![NodeItem::default()], &ctx).await.unwrap_err();
    assert!(err.to_string().starts_with("URL must start with \"/api/v2/\""));

    let good = node(json!({"ChatDataNode": {
        "operation": "makeApiCall",
        "url": "/api/v2/current-plan",
        "responseFormat": "string",
        "headers": [{"name": "Authorization", "value": "Bearer mine"}, {"name": "X-Trace", "value": "1"}]
    }}));
    let items = good.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items[0].json, json!("{\"plan\":\"pro\"}"));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].header_value("Authorization"), Some("Bearer sk-test"));
    assert_eq!(sent[0].header_value("X-Trace"), Some("1"));
    assert_eq!(sent[0].body, None);
}

#[tokio::test]
async fn make_api_call_error_item_carries_status_code() {
    let transport = ScriptedTransport::always(json!({}));
    let ctx = node_context(transport, InMemoryStaticData::new()).with_settings(continue_on_fail());
    let node = node(json!({"ChatDataNode": {
        "operation": "makeApiCall", "url": "/api/v2/chat", "method": "POST", "body": "{oops"
    }}));

    let items = node.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items[0].json, json!({"error": "Body must be a valid JSON object", "statusCode": 500}));
}

#[tokio::test]
async fn make_api_call_passes_text_bodies_through() {
    let transport = ScriptedTransport::always(json!("pong"));
    let ctx = node_context(transport, InMemoryStaticData::new());
    let node = node(json!({"ChatDataNode": {
        "operation": "makeApiCall", "url": "/api/v2/ping", "responseFormat": "string"
    }}));

    let items = node.execute(vec![NodeItem::default()], &ctx).await.unwrap();
    assert_eq!(items[0].json, json!("pong"));
}

#[tokio::test]
async fn chatbot_options_come_from_get_chatbots() {
    let transport = ScriptedTransport::always(json!({
        "chatbots": [{"chatbotId": "cb1", "chatbotName": "Support"}, {"chatbotId": "cb2", "chatbotName": "Sales"}]
    }));
    let ctx = node_context(transport, InMemoryStaticData::new());
    let node = node(json!({"ChatDataTrigger": {"operation": "onNewMessage"}}));

    let options = node.load_options(GET_CHATBOTS, &ctx).await.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!((options[1].name.as_str(), options[1].value.as_str()), ("Sales", "cb2"));
}

#[tokio::test]
async fn chatbot_options_wrap_shape_errors() {
    let transport = ScriptedTransport::always(json!({"items": []}));
    let ctx = node_context(transport, InMemoryStaticData::new());
    let node = node(json!({"ChatDataTrigger": {"operation": "onNewMessage"}}));

    let err = node.load_options(GET_CHATBOTS, &ctx).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to fetch chatbots: Invalid response format. Expected chatbots array."
    );
}

#[tokio::test]
async fn chatbot_options_keep_remote_status() {
    let transport = ScriptedTransport::new(|_| ApiResponse {
        status: 401,
        body: json!({"status": "error", "message": "Unauthorized"}),
    });
    let ctx = node_context(transport, InMemoryStaticData::new());
    let node = node(json!({"ChatDataTrigger": {"operation": "onNewMessage"}}));

    let err = node.load_options(GET_CHATBOTS, &ctx).await.unwrap_err();
    assert!(matches!(err, ChatDataError::Remote { .. }));
    assert_eq!(err.status_code(), 401);
    assert_eq!(err.to_string(), "Failed to fetch chatbots: Unauthorized");
}

fn without_credentials(transport: std::sync::Arc<ScriptedTransport>) -> NodeContext {
    NodeContext::new(
        ConfigManager(MapConfigManager::new()),
        SecretsManager(MapSecretsManager::new()),
        transport,
        InMemoryStaticData::new(),
    )
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let transport = ScriptedTransport::always(json!({}));
    let ctx = without_credentials(transport.clone()).with_settings(continue_on_fail());
    let node = node(json!({"ChatDataNode": {"operation": "getLeads", "chatbot_id": "cb1"}}));

    let err = node.execute(vec![NodeItem::default()], &ctx).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn trigger_manual_run_reports_setup_then_payload() {
    let transport = ScriptedTransport::always(json!({"status": "success", "webhookId": "w1"}));
    let store = InMemoryStaticData::new();
    let ctx = node_context(transport, store).with_webhook_url("https://host.example/hook");
    let trigger = ChatDataTrigger::new(TriggerOperation::OnNewMessage, "cb1");

    let waiting = trigger.execute(vec![], &ctx).await.unwrap();
    assert_eq!(waiting[0].json["status"], "waiting");
    assert_eq!(waiting[0].json["webhookInfo"], json!({"eventType": null, "chatbotId": null, "webhookUrl": null}));

    assert!(matches!(trigger.create(&ctx).await.unwrap(), CreateOutcome::Registered(_)));
    let setup = trigger.execute(vec![], &ctx).await.unwrap();
    assert_eq!(setup[0].json["webhookSetup"]["eventType"], "chat");
    assert_eq!(setup[0].json["webhookSetup"]["response"]["webhookId"], "w1");

    let raw = trigger.execute(vec![NodeItem::new(json!("not json"))], &ctx).await.unwrap();
    assert_eq!(
        raw[0].json,
        json!({"data": "not json", "parseError": "Could not parse incoming data as JSON"})
    );

    let parsed = trigger
        .execute(vec![NodeItem::new(json!("{\"event\":\"chat\"}"))], &ctx)
        .await
        .unwrap();
    assert_eq!(parsed[0].json, json!({"event": "chat"}));
}

#[tokio::test]
async fn trigger_without_webhook_url_cannot_register() {
    let transport = ScriptedTransport::always(json!({}));
    let ctx = node_context(transport, InMemoryStaticData::new());
    let trigger = ChatDataTrigger::new(TriggerOperation::OnLeadSubmission, "cb1");

    assert!(trigger.check_exists(&ctx).await.unwrap_err().is_configuration());
}

#[tokio::test]
async fn trigger_deactivation_needs_no_credentials() {
    let transport = ScriptedTransport::always(json!({}));
    let trigger = ChatDataTrigger::new(TriggerOperation::OnNewMessage, "cb1");

    let ctx = without_credentials(transport.clone())
        .with_webhook_url("https://host.example/hook")
        .with_mode(WorkflowMode::Trigger);
    assert_eq!(trigger.delete(&ctx).await.unwrap(), DeleteOutcome::Kept);

    let mut removed = NodeSettings::named("trigger");
    removed.disabled = true;
    let ctx = ctx.with_settings(removed);
    assert_eq!(trigger.delete(&ctx).await.unwrap(), DeleteOutcome::NotRegistered);

    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn credential_check_reports_rejected_key() {
    let transport = ScriptedTransport::always(json!({"status": "error"}));
    let client = support::client(transport.clone());

    let err = client.current_plan().await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(transport.sent()[0].url, "https://api.test.local/api/v2/current-plan");
}
