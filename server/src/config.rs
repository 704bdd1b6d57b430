//! Server configuration (§3, §6)
//!
//! Loaded at startup from a JSON file. Every field has a sensible default,
//! so the server is runnable without a config file at all — missing file is
//! not an error, it just means "defaults".

use serde::{Deserialize, Serialize};

/// Full server configuration (§3: "Configuration — JSON, not TOML").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port for the control protocol (login, channels, chat).
    pub control_port: u16,
    /// UDP port for the audio relay.
    pub audio_port: u16,
    /// PEM bundle (certificate chain + private key) for TLS. Empty disables
    /// TLS entirely — plain TCP, for local development only.
    pub certificate_path: String,
    /// SQLite file path. Empty opens an ephemeral in-memory database.
    pub database_path: String,
    /// Seeds an `admin`/`admin` administrator account and the default
    /// channels on first start, if the user table is empty.
    pub seed_test_users: bool,
    /// Session token lifetime, in hours.
    pub token_lifetime_hours: i64,
    /// Provisions an account for an unrecognized username on its first
    /// login instead of rejecting it (§3: "admin CLI or first-login
    /// auto-registration, configurable"). Off by default — accounts come
    /// from the `add-user` CLI.
    pub allow_auto_registration: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            control_port: 8443,
            audio_port: 8444,
            certificate_path: String::new(),
            database_path: String::new(),
            seed_test_users: false,
            token_lifetime_hours: 24,
            allow_auto_registration: false,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from a JSON file. Falls back to defaults if
    /// the file does not exist; a file that exists but fails to parse is an
    /// error.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let config: Self = serde_json::from_str(&contents)
                    .map_err(|e| anyhow::anyhow!("config error in '{path}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path, "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("config file '{path}' unreadable: {e}")),
        }
    }

    pub fn control_bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.control_port)
    }

    pub fn audio_bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.audio_port)
    }

    pub fn tls_enabled(&self) -> bool {
        !self.certificate_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.control_port, 8443);
        assert_eq!(cfg.audio_port, 8444);
        assert!(!cfg.tls_enabled());
        assert_eq!(cfg.token_lifetime_hours, 24);
        assert!(!cfg.allow_auto_registration);
    }

    #[test]
    fn bind_addresses() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.control_bind_addr(), "0.0.0.0:8443");
        assert_eq!(cfg.audio_bind_addr(), "0.0.0.0:8444");
    }

    #[test]
    fn config_from_json_string() {
        let json = r#"{ "control_port": 9000, "seed_test_users": true }"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.control_port, 9000);
        assert!(cfg.seed_test_users);
        // Fields absent from the JSON keep their defaults.
        assert_eq!(cfg.audio_port, 8444);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load("/nonexistent/whispr-config-test.json").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }
}
