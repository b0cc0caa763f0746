use std::{fs, path::Path};

use anyhow::Error;
use schemars::schema_for;
use tracing::info;

use crate::credentials::ChatDataCredentials;
use crate::node::Node;
use crate::nodes::{ChatDataNode, ChatDataTrigger};

/// Schema files written by [`write_schema`], by file name.
pub const SCHEMA_FILES: [&str; 4] = [
    "node.schema.json",
    "node-chatdata.schema.json",
    "node-chatdatatrigger.schema.json",
    "credential-chatdataapi.schema.json",
];

/// Write the node and credential schemas into `out_dir`.
pub fn write_schema(out_dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(out_dir)?;

    let schemas = [
        serde_json::to_string_pretty(&schema_for!(Node))?,
        serde_json::to_string_pretty(&schema_for!(ChatDataNode))?,
        serde_json::to_string_pretty(&schema_for!(ChatDataTrigger))?,
        serde_json::to_string_pretty(&schema_for!(ChatDataCredentials))?,
    ];
    for (file, schema) in SCHEMA_FILES.iter().zip(schemas) {
        fs::write(out_dir.join(file), schema)?;
        info!("schema written: {}", file);
    }
    Ok(())
}
