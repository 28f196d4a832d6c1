//! Configuration loading from disk.
//!
//! Two inputs, two formats: the service settings (TOML) and the rule
//! document (JSON). Both parse into validated structures here; anything
//! that fails keeps the previous configuration authoritative.

use std::fs;
use std::path::Path;

use josekit::jwk::Jwk;
use thiserror::Error;

use crate::config::document::AccessSystem;
use crate::config::settings::{JwtSettings, KeyMode, Settings};
use crate::config::validation::{validate_document, ValidationError};
use crate::expr::SyntaxError;
use crate::identity::IdentityResolver;

/// Error type for configuration loading and snapshot activation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("rule document parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("rule `{rule}` failed to compile: {source}")]
    Rule {
        rule: String,
        #[source]
        source: SyntaxError,
    },

    #[error("verification key: {0}")]
    Key(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load and parse service settings from a TOML file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load, parse and validate a rule document from a JSON file.
pub fn load_document(path: &Path) -> Result<AccessSystem, ConfigError> {
    let content = fs::read_to_string(path)?;
    let doc: AccessSystem = serde_json::from_str(&content)?;
    validate_document(&doc).map_err(ConfigError::Validation)?;
    Ok(doc)
}

/// Build the identity resolver selected by the settings. `KeyMode::None`
/// yields no resolver; token-table auth still works without one.
pub fn build_resolver(jwt: &JwtSettings) -> Result<Option<IdentityResolver>, ConfigError> {
    match jwt.mode {
        KeyMode::None => Ok(None),
        KeyMode::Rsa => {
            let path = jwt
                .jwk_path
                .as_ref()
                .ok_or_else(|| ConfigError::Key("rsa mode requires jwk_path".to_string()))?;
            let jwk: Jwk = serde_json::from_str(&fs::read_to_string(path)?)?;
            let resolver = IdentityResolver::rsa_from_jwk(&jwk)
                .map_err(|e| ConfigError::Key(e.to_string()))?;
            Ok(Some(resolver))
        }
        KeyMode::Hmac => {
            let secret = jwt
                .secret
                .as_ref()
                .ok_or_else(|| ConfigError::Key("hmac mode requires a secret".to_string()))?;
            let resolver = IdentityResolver::hmac_from_secret(secret.as_bytes())
                .map_err(|e| ConfigError::Key(e.to_string()))?;
            Ok(Some(resolver))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str, suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_document_roundtrip() {
        let file = write_temp(
            r#"{"hostGroups": [{"name": "g", "hosts": ["h"], "checks": []}]}"#,
            ".json",
        );
        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.host_groups.len(), 1);
    }

    #[test]
    fn test_load_document_rejects_bad_json() {
        let file = write_temp("{not json", ".json");
        assert!(matches!(
            load_document(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_document_rejects_invalid_semantics() {
        let file = write_temp(
            r#"{"hostGroups": [{"name": "g", "hosts": [], "checks": []}]}"#,
            ".json",
        );
        assert!(matches!(
            load_document(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            load_document(Path::new("/nonexistent/access.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_build_resolver_none() {
        assert!(build_resolver(&JwtSettings::default()).unwrap().is_none());
    }

    #[test]
    fn test_build_resolver_hmac_requires_secret() {
        let jwt = JwtSettings {
            mode: KeyMode::Hmac,
            ..Default::default()
        };
        assert!(matches!(build_resolver(&jwt), Err(ConfigError::Key(_))));
    }

    #[test]
    fn test_build_resolver_hmac() {
        let jwt = JwtSettings {
            mode: KeyMode::Hmac,
            secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        assert!(build_resolver(&jwt).unwrap().is_some());
    }
}
