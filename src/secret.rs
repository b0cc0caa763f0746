use async_trait::async_trait;
use dashmap::DashMap;
use dotenvy::Error as DotenvError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Bearer token for the Chat Data API.
pub const API_KEY_KEY: &str = "CHATDATA_API_KEY";

#[derive(Debug, Clone, Error)]
pub enum SecretsError {
    #[error("secret store io error: {0}")]
    Io(String),
    #[error("secret not found")]
    NotFound,
}

#[async_trait]
pub trait SecretsManagerType: Send + Sync {
    fn keys(&self) -> Vec<String>;
    async fn reveal(&self, key: &str) -> Result<Option<String>, SecretsError>;
    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError>;
    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError>;
    fn name(&self) -> &'static str;
    fn clone_box(&self) -> Arc<dyn SecretsManagerType>;
}

pub struct SecretsManager(pub Arc<dyn SecretsManagerType>);

impl SecretsManager {
    pub async fn get_secret(&self, key: &str) -> Result<Option<String>, SecretsError> {
        self.0.reveal(key).await
    }

    pub async fn add_secret(&self, key: &str, value: &str) -> Result<(), SecretsError> {
        self.0.add_secret(key, value).await
    }

    pub async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        self.0.delete_secret(key).await
    }
}

impl Clone for SecretsManager {
    fn clone(&self) -> Self {
        SecretsManager(self.0.clone_box())
    }
}

impl std::fmt::Debug for SecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print values
        write!(f, "{} {{ keys: {:?} }}", self.0.name(), self.0.keys())
    }
}

impl Serialize for SecretsManager {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("SecretsManager", 2)?;
        state.serialize_field("name", self.0.name())?;
        state.serialize_field("keys", &self.0.keys())?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for SecretsManager {
    fn deserialize<D>(_deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Err(serde::de::Error::custom(
            "SecretsManager cannot be deserialized dynamically",
        ))
    }
}

/// Secrets from `<dir>/.env`, falling back to the process environment.
/// Writes go back to the same file.
#[derive(Clone)]
pub struct EnvSecretsManager {
    secrets: Arc<DashMap<String, String>>,
    env_path: Option<PathBuf>,
}

impl EnvSecretsManager {
    pub fn new(dotenv_dir: Option<PathBuf>) -> Arc<Self> {
        let env_path = dotenv_dir.map(|dir| dir.join(".env"));
        let mgr = Arc::new(Self {
            secrets: Arc::new(DashMap::new()),
            env_path,
        });
        if let Some(path) = &mgr.env_path {
            mgr.load_dotenv(path);
        }
        mgr
    }

    fn load_dotenv(&self, path: &Path) {
        match dotenvy::from_path_iter(path) {
            Ok(iter) => {
                self.secrets.clear();
                for item in iter {
                    match item {
                        Ok((k, v)) => {
                            self.secrets.insert(k, v);
                        }
                        Err(e) => error!("Malformed line in {}: {}", path.display(), e),
                    }
                }
                info!("secrets loaded from {}", path.display());
            }
            Err(DotenvError::Io(io)) if io.kind() == std::io::ErrorKind::NotFound => {
                info!(".env file {} not found, using process environment", path.display());
            }
            Err(e) => error!("Failed to read {}: {}", path.display(), e),
        }
    }

    fn write_dotenv(&self) -> Result<(), SecretsError> {
        let Some(path) = &self.env_path else { return Ok(()) };

        let mut entries: Vec<(String, String)> = self
            .secrets
            .iter()
            .map(|e| (e.key().clone(), e.value().replace('\n', "\\n")))
            .collect();
        entries.sort();

        let out: String = entries.iter().map(|(k, v)| format!("{k}={v}\n")).collect();
        std::fs::write(path, out).map_err(|e| SecretsError::Io(e.to_string()))?;
        info!(".env file updated at {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl SecretsManagerType for EnvSecretsManager {
    fn keys(&self) -> Vec<String> {
        self.secrets.iter().map(|e| e.key().clone()).collect()
    }

    async fn reveal(&self, key: &str) -> Result<Option<String>, SecretsError> {
        if let Some(v) = self.secrets.get(key) {
            return Ok(Some(v.clone()));
        }
        Ok(std::env::var(key).ok())
    }

    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        self.secrets.insert(key.to_string(), secret.to_string());
        self.write_dotenv()
    }

    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        if self.secrets.remove(key).is_none() {
            return Err(SecretsError::NotFound);
        }
        self.write_dotenv()
    }

    fn name(&self) -> &'static str {
        "EnvSecretsManager"
    }

    fn clone_box(&self) -> Arc<dyn SecretsManagerType> {
        Arc::new(self.clone())
    }
}

/// In-memory secrets, for tests and embedding hosts.
#[derive(Clone, Default)]
pub struct MapSecretsManager {
    secrets: Arc<DashMap<String, String>>,
}

impl MapSecretsManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(entries: &[(&str, &str)]) -> Arc<Self> {
        let mgr = Self::default();
        for (k, v) in entries {
            mgr.secrets.insert(k.to_string(), v.to_string());
        }
        Arc::new(mgr)
    }
}

#[async_trait]
impl SecretsManagerType for MapSecretsManager {
    fn keys(&self) -> Vec<String> {
        self.secrets.iter().map(|e| e.key().clone()).collect()
    }

    async fn reveal(&self, key: &str) -> Result<Option<String>, SecretsError> {
        Ok(self.secrets.get(key).map(|v| v.clone()))
    }

    async fn add_secret(&self, key: &str, secret: &str) -> Result<(), SecretsError> {
        self.secrets.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    async fn delete_secret(&self, key: &str) -> Result<(), SecretsError> {
        self.secrets.remove(key).map(|_| ()).ok_or(SecretsError::NotFound)
    }

    fn name(&self) -> &'static str {
        "MapSecretsManager"
    }

    fn clone_box(&self) -> Arc<dyn SecretsManagerType> {
        Arc::new(self.clone())
    }
}
