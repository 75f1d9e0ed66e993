use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;

/// Top-level configuration, loaded from ephemera.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub platform: PlatformSection,
    pub reconciler: ReconcilerSection,
    pub channels: ChannelsSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen_address: String,
    /// Shared secret expected as `Authorization: Bearer <secret>` on ingest routes.
    /// Empty disables the check.
    pub ingest_secret: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".into(),
            ingest_secret: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite:ephemera.db?mode=rwc".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlatformSection {
    pub api_base: String,
    pub token: String,
    pub request_timeout_secs: u64,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".into(),
            token: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl PlatformSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReconcilerSection {
    /// Capacity of the inbound event queue between the ingest surface and the reconciler.
    pub queue_depth: usize,
}

impl Default for ReconcilerSection {
    fn default() -> Self {
        Self { queue_depth: 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelsSection {
    pub creator_name: String,
    /// `{name}` is replaced by the member's display name.
    pub temporary_name_template: String,
}

impl Default for ChannelsSection {
    fn default() -> Self {
        Self {
            creator_name: "Create Voice Channel".into(),
            temporary_name_template: "{name}'s Channel".into(),
        }
    }
}

impl ChannelsSection {
    pub fn temporary_name(&self, display_name: &str) -> String {
        self.temporary_name_template.replace("{name}", display_name)
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
            Self::from_toml(path, &contents)?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_toml(path: &str, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("LISTEN_ADDRESS") {
            self.server.listen_address = v;
        }
        if let Some(v) = var("INGEST_SECRET") {
            self.server.ingest_secret = v;
        }
        if let Some(v) = var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = var("PLATFORM_API_BASE") {
            self.platform.api_base = v;
        }
        if let Some(v) = var("BOT_TOKEN") {
            self.platform.token = v;
        }
        if let Some(v) = var("PLATFORM_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            self.platform.request_timeout_secs = secs;
        }
        if let Some(v) = var("RECONCILER_QUEUE_DEPTH")
            && let Ok(depth) = v.parse()
        {
            self.reconciler.queue_depth = depth;
        }
        if let Some(v) = var("CREATOR_CHANNEL_NAME") {
            self.channels.creator_name = v;
        }
        if let Some(v) = var("TEMPORARY_CHANNEL_TEMPLATE") {
            self.channels.temporary_name_template = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.listen_address, "0.0.0.0:8080");
        assert!(config.server.ingest_secret.is_empty());
        assert_eq!(config.platform.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconciler.queue_depth, 1024);
        assert_eq!(config.channels.creator_name, "Create Voice Channel");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            "test.toml",
            "[platform]\ntoken = \"abc\"\n\n[reconciler]\nqueue_depth = 8\n",
        )
        .unwrap();
        assert_eq!(config.platform.token, "abc");
        assert_eq!(config.platform.api_base, "https://discord.com/api/v10");
        assert_eq!(config.reconciler.queue_depth, 8);
        assert_eq!(config.database.url, "sqlite:ephemera.db?mode=rwc");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = ServerConfig::from_toml("bad.toml", "[platform\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BOT_TOKEN", "secret"),
            ("PLATFORM_TIMEOUT_SECS", "3"),
            ("RECONCILER_QUEUE_DEPTH", "not-a-number"),
            ("INGEST_SECRET", "hunter2"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.platform.token, "secret");
        assert_eq!(config.platform.request_timeout_secs, 3);
        // Unparsable numbers leave the previous value in place
        assert_eq!(config.reconciler.queue_depth, 1024);
        assert_eq!(config.server.ingest_secret, "hunter2");
    }

    #[test]
    fn test_temporary_name_template() {
        let channels = ChannelsSection::default();
        assert_eq!(channels.temporary_name("alice"), "alice's Channel");
    }
}
