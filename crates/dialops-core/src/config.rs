//! DialOps configuration system.
//!
//! A single TOML file at `~/.dialops/config.toml` with serde defaults for
//! every field, so a partial (or absent) file always yields a usable
//! config. Secrets prefer environment variables over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DialopsError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialopsConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl DialopsConfig {
    /// Load config from the default path (~/.dialops/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DialopsError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DialopsError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DialopsError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dialops")
            .join("config.toml")
    }

    /// Get the DialOps home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dialops")
    }
}

/// Voice provider (conversational-AI) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider. `DIALOPS_PROVIDER_API_KEY` wins over this.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Dashboard metrics endpoint path.
    #[serde(default = "default_dashboard_path")]
    pub dashboard_path: String,
    /// Agent listing endpoint path.
    #[serde(default = "default_agents_path")]
    pub agents_path: String,
    /// Conversation (call history) endpoint path.
    #[serde(default = "default_conversations_path")]
    pub conversations_path: String,
    /// Outbound call initiation endpoint (default language routing).
    #[serde(default)]
    pub call_url: String,
    /// Spanish-specific call initiation endpoint. Empty means "use the
    /// default endpoint for Spanish too".
    #[serde(default)]
    pub call_url_es: String,
}

fn default_provider_base_url() -> String {
    "https://api.elevenlabs.io".into()
}
fn default_dashboard_path() -> String {
    "/v1/convai/settings/dashboard".into()
}
fn default_agents_path() -> String {
    "/v1/convai/agents".into()
}
fn default_conversations_path() -> String {
    "/v1/convai/conversations".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_provider_base_url(),
            dashboard_path: default_dashboard_path(),
            agents_path: default_agents_path(),
            conversations_path: default_conversations_path(),
            call_url: String::new(),
            call_url_es: String::new(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key: env var > config file.
    pub fn resolved_api_key(&self) -> String {
        std::env::var("DIALOPS_PROVIDER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| self.api_key.clone())
    }
}

/// Hosted table backend configuration (PostgREST-style API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Project base URL, e.g. "https://xyz.supabase.co".
    #[serde(default)]
    pub url: String,
    /// Service key. `DIALOPS_STORE_KEY` wins over this.
    #[serde(default)]
    pub api_key: String,
    /// Outreach contacts table name.
    #[serde(default = "default_contacts_table")]
    pub contacts_table: String,
    /// Column used to address "every row" on full-table deletes.
    #[serde(default = "default_delete_column")]
    pub delete_column: String,
}

fn default_contacts_table() -> String {
    "no_show_contacts".into()
}
fn default_delete_column() -> String {
    "encounter_id".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            contacts_table: default_contacts_table(),
            delete_column: default_delete_column(),
        }
    }
}

impl StoreConfig {
    /// Resolve the service key: env var > config file.
    pub fn resolved_api_key(&self) -> String {
        std::env::var("DIALOPS_STORE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| self.api_key.clone())
    }

    /// Whether the backend is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.resolved_api_key().trim().is_empty()
    }
}

/// Gateway (operator HTTP API) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "bool_true")]
    pub require_pairing: bool,
}

fn default_port() -> u16 {
    4100
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn bool_true() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            require_pairing: true,
        }
    }
}

/// Batch scheduler defaults, pre-filled into the operator surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
}

fn default_batch_size() -> u32 {
    10
}
fn default_interval_minutes() -> u32 {
    15
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DialopsConfig::default();
        assert_eq!(config.gateway.port, 4100);
        assert_eq!(config.scheduler.batch_size, 10);
        assert_eq!(config.scheduler.interval_minutes, 15);
        assert_eq!(config.store.contacts_table, "no_show_contacts");
        assert!(config.provider.base_url.starts_with("https://"));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [provider]
            api_key = "xi-test"
            call_url = "https://calls.example.com/start"
            call_url_es = "https://calls.example.com/start-es"

            [store]
            url = "https://demo.supabase.co"
            api_key = "anon-key"
            contacts_table = "weird table"

            [gateway]
            port = 8080
        "#;

        let config: DialopsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.api_key, "xi-test");
        assert_eq!(config.provider.call_url_es, "https://calls.example.com/start-es");
        assert_eq!(config.store.contacts_table, "weird table");
        assert_eq!(config.gateway.port, 8080);
        // Untouched sections fall back to defaults
        assert_eq!(config.scheduler.batch_size, 10);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: DialopsConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert!(config.gateway.require_pairing);
    }

    #[test]
    fn test_store_configured() {
        let mut store = StoreConfig::default();
        assert!(!store.is_configured());
        store.url = "https://demo.supabase.co".into();
        store.api_key = "key".into();
        assert!(store.is_configured());
    }

    #[test]
    fn test_home_dir() {
        let home = DialopsConfig::home_dir();
        assert!(home.to_string_lossy().contains("dialops"));
    }
}
