mod support;

use std::sync::Arc;

use chatdata::client::ApiResponse;
use chatdata::webhook::{CreateOutcome, DeleteOutcome, EventType, WebhookLifecycle};
use node_plugin::message::{NodeSettings, WorkflowMode};
use node_plugin::static_data::{FileStaticData, InMemoryStaticData, StaticDataStore};
use serde_json::json;
use support::{CountingStore, ScriptedTransport, client};
use tempfile::tempdir;

const HOOK: &str = "https://host.example/webhook/abc";

#[tokio::test]
async fn create_registers_and_persists_record() {
    let transport = ScriptedTransport::always(json!({"status": "success", "webhookId": "w1"}));
    let client = client(transport.clone());
    let store = InMemoryStaticData::new();
    let lifecycle = WebhookLifecycle::new(store.clone(), HOOK);

    let outcome = lifecycle.create(&client, "onLeadSubmission", "cb1").await.unwrap();
    let CreateOutcome::Registered(reg) = outcome else { panic!("expected a registration") };
    assert_eq!(reg.event_type, EventType::LeadSubmission);
    assert!(reg.is_persistent);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].url, "https://api.test.local/api/v2/add-webhook");
    assert_eq!(
        sent[0].body,
        Some(json!({"url": HOOK, "event": "lead-submission", "chatbotId": "cb1"}))
    );

    assert_eq!(store.get("chatbotId").await.unwrap(), Some(json!("cb1")));
    assert_eq!(store.get("eventType").await.unwrap(), Some(json!("lead-submission")));
    assert_eq!(store.get("webhookUrl").await.unwrap(), Some(json!(HOOK)));
    let setup = lifecycle.setup_info().await.unwrap().unwrap();
    assert_eq!(setup["response"]["webhookId"], "w1");

    assert!(lifecycle.check_exists().await.unwrap());
    assert!(lifecycle.check_exists().await.unwrap());
}

#[tokio::test]
async fn create_for_non_webhook_operation_is_not_applicable() {
    let transport = ScriptedTransport::always(json!({}));
    let client = client(transport.clone());
    let lifecycle = WebhookLifecycle::new(InMemoryStaticData::new(), HOOK);

    let outcome = lifecycle.create(&client, "pollChatbots", "cb1").await.unwrap();
    assert_eq!(outcome, CreateOutcome::NotApplicable);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn create_failure_uses_fallback_message_and_stores_nothing() {
    let transport = ScriptedTransport::always(json!({"status": "error"}));
    let client = client(transport);
    let store = InMemoryStaticData::new();
    let lifecycle = WebhookLifecycle::new(store.clone(), HOOK);

    let err = lifecycle.create(&client, "onNewMessage", "cb1").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to register webhook");
    assert!(store.is_empty());
}

#[tokio::test]
async fn stale_url_is_cleared_exactly_once() {
    let transport = ScriptedTransport::always(json!({"status": "success"}));
    let client = client(transport);
    let store = CountingStore::new();

    WebhookLifecycle::new(store.clone(), "https://old.example/hook")
        .create(&client, "onNewMessage", "cb1")
        .await
        .unwrap();

    let moved = WebhookLifecycle::new(store.clone(), HOOK);
    assert!(!moved.check_exists().await.unwrap());
    assert!(!moved.check_exists().await.unwrap());
    assert_eq!(store.deletes_of("webhookUrl"), 1);
    assert_eq!(moved.registration().await.unwrap(), None);
}

#[tokio::test]
async fn deactivation_keeps_the_webhook() {
    let transport = ScriptedTransport::always(json!({"status": "success"}));
    let client = client(transport.clone());
    let store = InMemoryStaticData::new();
    let lifecycle = WebhookLifecycle::new(store.clone(), HOOK);
    lifecycle.create(&client, "onLiveChatEscalation", "cb1").await.unwrap();

    let outcome = lifecycle
        .delete(&client, &NodeSettings::named("trigger"), WorkflowMode::Trigger)
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Kept);
    assert_eq!(transport.sent().len(), 1);
    assert!(lifecycle.check_exists().await.unwrap());
}

#[tokio::test]
async fn workflow_deletion_deregisters_and_clears() {
    let transport = ScriptedTransport::always(json!({"status": "success"}));
    let client = client(transport.clone());
    let store = InMemoryStaticData::new();
    let lifecycle = WebhookLifecycle::new(store.clone(), HOOK);
    lifecycle.create(&client, "onNewMessage", "cb1").await.unwrap();

    let outcome = lifecycle
        .delete(&client, &NodeSettings::named("trigger"), WorkflowMode::Internal)
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Deregistered);

    let sent = transport.sent();
    assert_eq!(sent[1].url, "https://api.test.local/api/v2/delete-webhook");
    assert_eq!(sent[1].body, Some(json!({"url": HOOK, "chatbotId": "cb1"})));
    assert!(store.is_empty());
    assert!(!lifecycle.check_exists().await.unwrap());

    let again = lifecycle
        .delete(&client, &NodeSettings::named("trigger"), WorkflowMode::Internal)
        .await
        .unwrap();
    assert_eq!(again, DeleteOutcome::NotRegistered);
}

#[tokio::test]
async fn removed_node_deregisters_and_failure_keeps_record() {
    let transport = ScriptedTransport::new(|req| {
        if req.url.ends_with("/delete-webhook") {
            ApiResponse::ok(json!({"status": "error", "message": "Webhook not found"}))
        } else {
            ApiResponse::ok(json!({"status": "success"}))
        }
    });
    let client = client(transport);
    let store = InMemoryStaticData::new();
    let lifecycle = WebhookLifecycle::new(store.clone(), HOOK);
    lifecycle.create(&client, "onNewMessage", "cb1").await.unwrap();

    let mut settings = NodeSettings::named("trigger");
    settings.disabled = true;
    let err = lifecycle.delete(&client, &settings, WorkflowMode::Manual).await.unwrap_err();
    assert_eq!(err.to_string(), "Webhook not found");
    assert!(lifecycle.check_exists().await.unwrap());
}

#[tokio::test]
async fn registration_survives_in_file_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trigger.json");
    let transport = ScriptedTransport::always(json!({"status": "success"}));
    let client = client(transport);

    let store: Arc<dyn StaticDataStore> = FileStaticData::new(path.clone());
    WebhookLifecycle::new(store, HOOK)
        .create(&client, "onLeadSubmission", "cb1")
        .await
        .unwrap();

    let reopened = WebhookLifecycle::new(FileStaticData::new(path), HOOK);
    let reg = reopened.registration().await.unwrap().unwrap();
    assert_eq!(reg.chatbot_id, "cb1");
    assert!(reg.created_at.is_some());
    assert!(reopened.check_exists().await.unwrap());
}
