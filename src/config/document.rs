//! Rule document schema.
//!
//! The access system document is the unit of configuration: produced by a
//! storage collaborator as JSON, loaded at startup, and replaced wholesale
//! on every change notification. All types derive Serde traits and accept
//! the document's camelCase field names.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::routing::Action;

/// Root of the rule document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AccessSystem {
    /// Informational owner tag, carried through for audit logs.
    pub owner: String,

    /// Host groups: hostnames sharing one collection of path checks.
    #[serde(rename = "hostGroups")]
    pub host_groups: Vec<HostGroup>,

    /// Per-host forced decisions, consulted before any routing.
    pub overrides: HashMap<String, Action>,

    /// Bearer token table: opaque value → symbolic name (+ tenant).
    pub tokens: HashMap<String, TokenEntry>,

    /// Blocked user IDs; a truthy entry denies the user outright.
    pub blocks: HashMap<String, bool>,

    /// A bearer equal to this value resolves to the name `ROOT_TOKEN`.
    #[serde(rename = "rootToken")]
    pub root_token: String,
}

/// Symbolic name a root token resolves to.
pub const ROOT_TOKEN_NAME: &str = "ROOT_TOKEN";

impl AccessSystem {
    /// Resolve a request bearer value to its symbolic token name.
    pub fn token_name(&self, bearer: &str) -> Option<&str> {
        if !self.root_token.is_empty() && bearer == self.root_token {
            return Some(ROOT_TOKEN_NAME);
        }
        self.tokens.get(bearer).map(TokenEntry::name)
    }

    pub fn is_blocked(&self, user_id: &str) -> bool {
        self.blocks.get(user_id).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostGroup {
    pub name: String,
    pub default: Action,
    pub hosts: Vec<String>,
    pub checks: Vec<Check>,
}

/// A named collection of path rules rooted at one prefix.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Check {
    pub name: String,
    /// Path prefix this check owns, e.g. `/api/v1`.
    pub base: String,
    pub paths: Vec<PathRules>,
}

/// One path pattern and its per-method rules. A path holds at most one
/// rule per HTTP method.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PathRules {
    pub path: String,
    /// Method name (GET/POST/PUT/DELETE/HEAD) → rule.
    pub rules: HashMap<String, Rule>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Rule {
    pub description: String,
    pub expression: String,
    #[serde(rename = "mustAuth")]
    pub must_auth: bool,
}

/// Token table entries come in two shapes: a bare symbolic name, or a
/// name with a tenant ID attached.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TokenEntry {
    Name(String),
    Full {
        name: String,
        #[serde(rename = "tenantID", default)]
        tenant_id: String,
    },
}

impl TokenEntry {
    pub fn name(&self) -> &str {
        match self {
            TokenEntry::Name(name) => name,
            TokenEntry::Full { name, .. } => name,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TokenEntry::Name(_) => None,
            TokenEntry::Full { tenant_id, .. } => {
                if tenant_id.is_empty() {
                    None
                } else {
                    Some(tenant_id)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let doc: AccessSystem = serde_json::from_str(
            r#"{
                "owner": "platform",
                "hostGroups": [{
                    "name": "api",
                    "default": "deny",
                    "hosts": ["api.example.com"],
                    "checks": [{
                        "name": "institutions",
                        "base": "/api/v1",
                        "paths": [{
                            "path": "/institutions/:epbcID/fees",
                            "rules": {
                                "GET": {
                                    "description": "fee lookup",
                                    "expression": "bearer('T') || root()",
                                    "mustAuth": false
                                }
                            }
                        }]
                    }]
                }],
                "overrides": {"status.example.com": "allow"},
                "tokens": {"abc": "T", "xyz": {"name": "U", "tenantID": "acme"}},
                "blocks": {"u-bad": true},
                "rootToken": "super-secret"
            }"#,
        )
        .unwrap();

        assert_eq!(doc.host_groups.len(), 1);
        let group = &doc.host_groups[0];
        assert_eq!(group.default, Action::Deny);
        assert_eq!(group.checks[0].base, "/api/v1");
        let rule = &group.checks[0].paths[0].rules["GET"];
        assert!(!rule.must_auth);
        assert_eq!(rule.expression, "bearer('T') || root()");

        assert_eq!(doc.overrides["status.example.com"], Action::Allow);
        assert_eq!(doc.tokens["abc"], TokenEntry::Name("T".to_string()));
        assert_eq!(doc.tokens["xyz"].name(), "U");
        assert_eq!(doc.tokens["xyz"].tenant_id(), Some("acme"));
        assert!(doc.is_blocked("u-bad"));
        assert!(!doc.is_blocked("u-good"));
    }

    #[test]
    fn test_token_name_resolution() {
        let doc: AccessSystem = serde_json::from_str(
            r#"{"tokens": {"abc": "T"}, "rootToken": "super-secret"}"#,
        )
        .unwrap();
        assert_eq!(doc.token_name("abc"), Some("T"));
        assert_eq!(doc.token_name("super-secret"), Some(ROOT_TOKEN_NAME));
        assert_eq!(doc.token_name("nope"), None);
    }

    #[test]
    fn test_empty_root_token_never_matches() {
        let doc = AccessSystem::default();
        assert_eq!(doc.token_name(""), None);
    }
}
