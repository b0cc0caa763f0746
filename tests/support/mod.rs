#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chatdata::client::{ApiRequest, ApiResponse, ChatDataClient, HttpTransport};
use chatdata::config::{BASE_URL_KEY, ConfigManager, MapConfigManager};
use chatdata::credentials::ChatDataCredentials;
use chatdata::error::ChatDataError;
use chatdata::node::NodeContext;
use chatdata::secret::{API_KEY_KEY, MapSecretsManager, SecretsManager};
use node_plugin::static_data::{InMemoryStaticData, StaticDataError, StaticDataStore};
use serde_json::{Value, json};

pub const BASE_URL: &str = "https://api.test.local/";
pub const API_KEY: &str = "sk-test";

type Responder = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

/// Answers every request with `responder` and keeps what was sent.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { responder: Box::new(responder), sent: Mutex::new(Vec::new()) })
    }

    pub fn always(body: Value) -> Arc<Self> {
        Self::new(move |_| ApiResponse::ok(body.clone()))
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ChatDataError> {
        let response = (self.responder)(&request);
        self.sent.lock().unwrap().push(request);
        Ok(response)
    }
}

/// Pages of `total` numbered records under `field`, honouring `start`.
pub fn paged(field: &'static str, total: u64) -> impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static {
    move |req| {
        let start: u64 = req.query_value("start").map(|s| s.parse().unwrap()).unwrap_or(0);
        let size: u64 = req.query_value("size").unwrap().parse().unwrap();
        let end = (start + size).min(total);
        let records: Vec<Value> = (start..end).map(|i| json!({ "id": i })).collect();
        let mut body = serde_json::Map::new();
        body.insert(field.to_string(), Value::Array(records));
        body.insert("total".to_string(), json!(total));
        ApiResponse::ok(Value::Object(body))
    }
}

pub fn client(transport: Arc<ScriptedTransport>) -> ChatDataClient {
    ChatDataClient::new(ChatDataCredentials::new(BASE_URL, API_KEY).unwrap(), transport)
}

pub fn node_context(transport: Arc<ScriptedTransport>, store: Arc<dyn StaticDataStore>) -> NodeContext {
    NodeContext::new(
        ConfigManager(MapConfigManager::with(&[(BASE_URL_KEY, BASE_URL)])),
        SecretsManager(MapSecretsManager::with(&[(API_KEY_KEY, API_KEY)])),
        transport,
        store,
    )
}

/// Counts deletes per key on top of an in-memory store.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStaticData,
    deletes: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deletes_of(&self, key: &str) -> usize {
        self.deletes.lock().unwrap().iter().filter(|k| k.as_str() == key).count()
    }
}

#[async_trait]
impl StaticDataStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StaticDataError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StaticDataError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StaticDataError> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.inner.delete(key).await
    }

    fn name(&self) -> &'static str {
        "CountingStore"
    }
}
