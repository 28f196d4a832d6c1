//! Claim structures carried by access tokens.
//!
//! The token payload composes two explicit values: the standard
//! registered claims and the embedded identity. Both are required; there
//! is no field promotion or fallthrough between them.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Context wildcard: the grant applies in every context.
pub const ALL: &str = "ALL";
/// Category wildcard: actions granted under any category.
pub const ANY: &str = "ANY";

/// Standard JWT claims we read back out of a validated token.
#[derive(Debug, Clone, Default)]
pub struct RegisteredClaims {
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub issued_at: Option<SystemTime>,
    pub expires_at: Option<SystemTime>,
}

/// One permission grant: a context plus the actions allowed per category.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Permission {
    #[serde(default)]
    pub context: String,
    #[serde(rename = "categoryActions", default)]
    pub category_actions: HashMap<String, Vec<String>>,
}

/// The identity embedded in a validated token. Resolved fresh for every
/// request and never persisted.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Identity {
    #[serde(rename = "tenantID", default)]
    pub tenant_id: String,
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub superuser: bool,
    #[serde(default)]
    pub classification: String,
    /// Grants are an ordered list; order matters to permission checks.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// A fully validated token: registered claims and identity side by side.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub registered: RegisteredClaims,
    pub identity: Identity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deserializes_document_field_names() {
        let json = serde_json::json!({
            "tenantID": "acme",
            "userID": "u-1",
            "name": "Alice",
            "email": "alice@acme.test",
            "superuser": false,
            "classification": "staff",
            "permissions": [
                {"context": "billing", "categoryActions": {"invoice": ["read", "write"]}}
            ]
        });
        let identity: Identity = serde_json::from_value(json).unwrap();
        assert_eq!(identity.tenant_id, "acme");
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.permissions.len(), 1);
        assert_eq!(identity.permissions[0].context, "billing");
        assert_eq!(
            identity.permissions[0].category_actions["invoice"],
            vec!["read".to_string(), "write".to_string()]
        );
    }

    #[test]
    fn test_identity_tolerates_missing_fields() {
        let identity: Identity = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!identity.superuser);
        assert!(identity.permissions.is_empty());
    }
}
