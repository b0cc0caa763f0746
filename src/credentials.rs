use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::{BASE_URL_KEY, ConfigManager};
use crate::error::ChatDataError;
use crate::secret::{API_KEY_KEY, SecretsManager};

pub const DEFAULT_BASE_URL: &str = "https://api.chat-data.com";
pub const API_PREFIX: &str = "/api/v2";

/// The `chatDataApi` credential type: where the API lives and how to
/// authenticate against it.
#[derive(Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "Chat Data API")]
pub struct ChatDataCredentials {
    /// The URL to the Chat Data API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// The API Key of your Chat Data account (sk-...)
    #[schemars(extend("writeOnly" = true))]
    pub api_key: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl std::fmt::Debug for ChatDataCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDataCredentials")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .finish()
    }
}

impl ChatDataCredentials {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ChatDataError> {
        let creds = Self { base_url: base_url.to_string(), api_key: api_key.to_string() };
        creds.validate()?;
        Ok(creds)
    }

    /// Resolve from the host's config and secret stores. An unset base URL
    /// falls back to the public API; one set to an empty string is an error.
    pub async fn resolve(
        config: &ConfigManager,
        secrets: &SecretsManager,
    ) -> Result<Self, ChatDataError> {
        let base_url = config.get(BASE_URL_KEY).await.unwrap_or_else(default_base_url);
        let api_key = secrets
            .get_secret(API_KEY_KEY)
            .await
            .map_err(|e| ChatDataError::Configuration(format!("Could not read {API_KEY_KEY}: {e}")))?
            .ok_or_else(|| {
                ChatDataError::Configuration(format!(
                    "API key is missing in credentials. Set the {API_KEY_KEY} secret."
                ))
            })?;
        Self::new(&base_url, &api_key)
    }

    pub fn validate(&self) -> Result<(), ChatDataError> {
        if self.base_url.trim().is_empty() {
            return Err(ChatDataError::Configuration(
                "Base URL is missing in credentials. Please check your credentials configuration."
                    .to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ChatDataError::Configuration(
                "API key is missing in credentials. Please check your credentials configuration."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// `base_url` without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Absolute URL for an endpoint below `/api/v2`, e.g. `/get-chatbots`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base(), API_PREFIX, path)
    }

    /// Absolute URL for a path that already carries the `/api/v2/` prefix.
    pub fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.base(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfigManager;
    use crate::secret::MapSecretsManager;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let creds = ChatDataCredentials::new("https://api.chat-data.com/", "sk-1").unwrap();
        assert_eq!(creds.endpoint("/add-webhook"), "https://api.chat-data.com/api/v2/add-webhook");
        assert_eq!(creds.absolute("/api/v2/chat"), "https://api.chat-data.com/api/v2/chat");
    }

    #[tokio::test]
    async fn resolve_defaults_base_url_when_unset() {
        let config = ConfigManager(MapConfigManager::new());
        let secrets = SecretsManager(MapSecretsManager::with(&[(API_KEY_KEY, "sk-1")]));
        let creds = ChatDataCredentials::resolve(&config, &secrets).await.unwrap();
        assert_eq!(creds.base(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn resolve_rejects_blank_base_url() {
        let config = ConfigManager(MapConfigManager::with(&[(BASE_URL_KEY, "  ")]));
        let secrets = SecretsManager(MapSecretsManager::with(&[(API_KEY_KEY, "sk-1")]));
        let err = ChatDataCredentials::resolve(&config, &secrets).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("Base URL is missing"));
    }

    #[tokio::test]
    async fn resolve_requires_api_key() {
        let config = ConfigManager(MapConfigManager::new());
        let secrets = SecretsManager(MapSecretsManager::new());
        let err = ChatDataCredentials::resolve(&config, &secrets).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn debug_masks_api_key() {
        let creds = ChatDataCredentials::new("http://localhost", "sk-secret").unwrap();
        assert!(!format!("{creds:?}").contains("sk-secret"));
    }
}
