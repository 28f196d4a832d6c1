//! Semantic validation of the rule document.
//!
//! Serde handles the syntactic layer; this pass checks what the schema
//! cannot express: method names, prefix shapes, host uniqueness.
//! Validation is a pure function and reports every error it finds, not
//! just the first, so a document author gets one complete round trip.

use thiserror::Error;

use crate::config::document::AccessSystem;

/// Methods a path rule may bind.
pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "HEAD"];

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("host group `{0}` has no hosts")]
    EmptyHostGroup(String),

    #[error("host `{0}` appears in more than one host group")]
    DuplicateHost(String),

    #[error("check `{check}` in group `{group}`: base `{base}` must start with `/`")]
    BadBase {
        group: String,
        check: String,
        base: String,
    },

    #[error("path `{path}`: pattern must start with `/`")]
    BadPath { path: String },

    #[error("path `{path}`: unsupported method `{method}`")]
    BadMethod { path: String, method: String },

    #[error("path `{path}` {method}: empty expression")]
    EmptyExpression { path: String, method: String },
}

/// Validate a parsed document. Returns every problem found.
pub fn validate_document(doc: &AccessSystem) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen_hosts = std::collections::HashSet::new();

    for group in &doc.host_groups {
        if group.hosts.is_empty() {
            errors.push(ValidationError::EmptyHostGroup(group.name.clone()));
        }
        for host in &group.hosts {
            if !seen_hosts.insert(host.to_lowercase()) {
                errors.push(ValidationError::DuplicateHost(host.clone()));
            }
        }
        for check in &group.checks {
            if !check.base.starts_with('/') {
                errors.push(ValidationError::BadBase {
                    group: group.name.clone(),
                    check: check.name.clone(),
                    base: check.base.clone(),
                });
            }
            for path in &check.paths {
                if !path.path.starts_with('/') {
                    errors.push(ValidationError::BadPath {
                        path: path.path.clone(),
                    });
                }
                for (method, rule) in &path.rules {
                    if !SUPPORTED_METHODS.contains(&method.as_str()) {
                        errors.push(ValidationError::BadMethod {
                            path: path.path.clone(),
                            method: method.clone(),
                        });
                    }
                    if rule.expression.trim().is_empty() {
                        errors.push(ValidationError::EmptyExpression {
                            path: path.path.clone(),
                            method: method.clone(),
                        });
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::document::{Check, HostGroup, PathRules, Rule};

    fn valid_doc() -> AccessSystem {
        let mut rules = std::collections::HashMap::new();
        rules.insert(
            "GET".to_string(),
            Rule {
                description: "ping".to_string(),
                expression: "root()".to_string(),
                must_auth: false,
            },
        );
        AccessSystem {
            host_groups: vec![HostGroup {
                name: "api".to_string(),
                hosts: vec!["api.example.com".to_string()],
                checks: vec![Check {
                    name: "main".to_string(),
                    base: "/api".to_string(),
                    paths: vec![PathRules {
                        path: "/ping".to_string(),
                        rules,
                    }],
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_document_passes() {
        assert!(validate_document(&valid_doc()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut doc = valid_doc();
        doc.host_groups[0].checks[0].base = "api".to_string();
        doc.host_groups[0].checks[0].paths[0].path = "ping".to_string();
        let errors = validate_document(&doc).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unsupported_method() {
        let mut doc = valid_doc();
        let rule = doc.host_groups[0].checks[0].paths[0].rules["GET"].clone();
        doc.host_groups[0].checks[0].paths[0]
            .rules
            .insert("PATCH".to_string(), rule);
        let errors = validate_document(&doc).unwrap_err();
        assert!(matches!(errors[0], ValidationError::BadMethod { .. }));
    }

    #[test]
    fn test_duplicate_host_across_groups() {
        let mut doc = valid_doc();
        let mut second = doc.host_groups[0].clone();
        second.name = "api2".to_string();
        doc.host_groups.push(second);
        let errors = validate_document(&doc).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateHost(
            "api.example.com".to_string()
        )));
    }

    #[test]
    fn test_empty_expression() {
        let mut doc = valid_doc();
        if let Some(rule) = doc.host_groups[0].checks[0].paths[0].rules.get_mut("GET") {
            rule.expression = "  ".to_string();
        }
        let errors = validate_document(&doc).unwrap_err();
        assert!(matches!(errors[0], ValidationError::EmptyExpression { .. }));
    }
}
