//! Service settings schema.
//!
//! This module defines the process-level configuration: where to listen,
//! where the rule document lives, how to verify tokens, and observability
//! knobs. All types derive Serde traits for deserialization from a TOML
//! file; every field has a default so a minimal file works.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings for the authorization service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Listener configuration (bind address).
    pub listener: ListenerSettings,

    /// Rule document location and reload behavior.
    pub document: DocumentSettings,

    /// Token verification key.
    pub jwt: JwtSettings,

    /// Observability settings.
    pub observability: ObservabilitySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerSettings {
    /// Bind address (e.g., "0.0.0.0:4180").
    pub bind_address: String,

    /// Per-decision timeout in seconds, enforced at the transport layer.
    pub request_timeout_secs: u64,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4180".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Path to the JSON rule document.
    pub path: PathBuf,

    /// Watch the document for changes and hot-reload.
    pub watch: bool,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("access.json"),
            watch: true,
        }
    }
}

/// Which verification key the identity resolver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// No key configured; requests carrying JWTs cannot authenticate.
    #[default]
    None,
    /// RS256 against a public key stored as a JWK JSON file.
    Rsa,
    /// HS256 with a shared secret.
    Hmac,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct JwtSettings {
    pub mode: KeyMode,

    /// Public key (JWK JSON) for `mode = "rsa"`.
    pub jwk_path: Option<PathBuf>,

    /// Shared secret for `mode = "hmac"`.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.listener.bind_address, "0.0.0.0:4180");
        assert_eq!(settings.jwt.mode, KeyMode::None);
        assert!(settings.document.watch);
    }

    #[test]
    fn test_full_toml() {
        let settings: Settings = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8000"

            [document]
            path = "/etc/authgate/access.json"
            watch = false

            [jwt]
            mode = "hmac"
            secret = "s3cret"

            [observability]
            log_level = "debug"
            metrics_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.listener.bind_address, "127.0.0.1:8000");
        assert_eq!(settings.jwt.mode, KeyMode::Hmac);
        assert_eq!(settings.jwt.secret.as_deref(), Some("s3cret"));
        assert!(!settings.document.watch);
        assert!(settings.observability.metrics_enabled);
    }
}
