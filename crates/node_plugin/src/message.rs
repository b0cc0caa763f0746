use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

/// One unit of data flowing between nodes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct NodeItem {
    pub json: Value,
    /// Which input item this output was derived from
    #[serde(rename = "pairedItem", default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItem>,
}

impl NodeItem {
    pub fn new(json: Value) -> Self {
        Self { json, paired_item: None }
    }

    pub fn paired(json: Value, item: usize) -> Self {
        Self { json, paired_item: Some(PairedItem { item, input: 0 }) }
    }

    /// Object view of the payload; non-object payloads yield an empty map.
    pub fn json_object(&self) -> Map<String, Value> {
        match &self.json {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct PairedItem {
    pub item: usize,
    #[serde(default)]
    pub input: usize,
}

/// The reason the host is invoking a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkflowMode {
    Cli,
    Error,
    Integrated,
    /// Used by the host when it removes a workflow for good
    Internal,
    #[default]
    Manual,
    Retry,
    Trigger,
    Webhook,
}

impl WorkflowMode {
    pub fn is_workflow_deletion(&self) -> bool {
        matches!(self, WorkflowMode::Internal)
    }
}

/// Per-node settings the host keeps alongside the node's parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeSettings {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub continue_on_fail: bool,
}

impl NodeSettings {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// The `EnvFilter` directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}
