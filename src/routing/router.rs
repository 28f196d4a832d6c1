//! Two-level request router: host → path-prefix muxer → method-keyed
//! ordered pattern lists.
//!
//! # Design Decisions
//! - Immutable after construction; a reload builds a whole new router
//! - Overlapping prefixes resolve longest-prefix-first, never by map
//!   iteration order
//! - Within one method list, match order is strictly registration order;
//!   the first structural match wins
//! - 404/405 are computed lazily, only once no pattern matched

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};

use crate::routing::pattern::{Captures, Pattern};

/// Per-host fallback when no prefix muxer claims the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

impl Default for Action {
    fn default() -> Self {
        Action::Deny
    }
}

/// Outcome of one authorization check.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: StatusCode,
    pub message: String,
    pub username: Option<String>,
}

impl Decision {
    pub fn allow(username: Option<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: "allowed".to_string(),
            username,
        }
    }

    pub fn deny(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            username: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Request view handed to a bound rule handler.
pub struct RouteRequest<'a> {
    pub method: &'a Method,
    pub raw_path: &'a str,
    pub headers: &'a HeaderMap,
}

pub type RouteHandler = Arc<dyn Fn(&RouteRequest<'_>, Captures) -> Decision + Send + Sync>;

struct RouteEntry {
    pattern: Pattern,
    handler: RouteHandler,
}

#[derive(Default)]
struct PrefixMux {
    methods: HashMap<Method, Vec<RouteEntry>>,
}

impl PrefixMux {
    fn has(&self, method: &Method, raw: &str) -> bool {
        self.methods
            .get(method)
            .map(|entries| entries.iter().any(|e| e.pattern.raw() == raw))
            .unwrap_or(false)
    }

    fn push(&mut self, method: Method, pattern: Pattern, handler: RouteHandler) {
        self.methods
            .entry(method)
            .or_default()
            .push(RouteEntry { pattern, handler });
    }
}

struct HostMux {
    default: Action,
    prefixes: Vec<(String, PrefixMux)>,
}

/// The routing table for one configuration snapshot.
pub struct PatternRouter {
    hosts: HashMap<String, HostMux>,
}

impl std::fmt::Debug for PatternRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRouter")
            .field("hosts", &self.hosts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PatternRouter {
    pub fn new() -> Self {
        Self {
            hosts: HashMap::new(),
        }
    }

    /// Register a host with its fallback action. Hosts are normalized to
    /// lowercase; matching is case-insensitive.
    pub fn register_host(&mut self, host: &str, default: Action) {
        let key = host.to_lowercase();
        self.hosts
            .entry(key)
            .and_modify(|mux| mux.default = default)
            .or_insert(HostMux {
                default,
                prefixes: Vec::new(),
            });
    }

    /// Register a (method, pattern) pair under a host and path prefix.
    /// Re-registering an identical pair is a no-op. `GET` implicitly also
    /// registers `HEAD` unless `HEAD` holds the pattern already.
    pub fn register(
        &mut self,
        host: &str,
        prefix: &str,
        method: Method,
        pattern: &str,
        handler: RouteHandler,
    ) {
        let key = host.to_lowercase();
        let host_mux = self.hosts.entry(key).or_insert(HostMux {
            default: Action::Deny,
            prefixes: Vec::new(),
        });

        let idx = match host_mux.prefixes.iter().position(|(p, _)| p == prefix) {
            Some(idx) => idx,
            None => {
                host_mux
                    .prefixes
                    .push((prefix.to_string(), PrefixMux::default()));
                host_mux.prefixes.len() - 1
            }
        };
        let mux = &mut host_mux.prefixes[idx].1;

        if mux.has(&method, pattern) {
            return;
        }
        let compiled = Pattern::compile(pattern);
        if method == Method::GET && !mux.has(&Method::HEAD, pattern) {
            mux.push(Method::HEAD, compiled.clone(), handler.clone());
        }
        mux.push(method, compiled, handler);
    }

    /// Resolve one request to a decision.
    pub fn check(
        &self,
        host: &str,
        method: &Method,
        raw_path: &str,
        headers: &HeaderMap,
    ) -> Decision {
        let Some(host_mux) = self.hosts.get(&host.to_lowercase()) else {
            return Decision::deny(
                StatusCode::FORBIDDEN,
                format!("no prefix muxer registered for host `{host}`"),
            );
        };

        // Longest registered prefix wins; prefixes are unique per host so
        // there are no ties.
        let mut best: Option<&(String, PrefixMux)> = None;
        for entry in &host_mux.prefixes {
            if raw_path.starts_with(entry.0.as_str())
                && best.map_or(true, |b| entry.0.len() > b.0.len())
            {
                best = Some(entry);
            }
        }

        let Some((prefix, mux)) = best else {
            return match host_mux.default {
                Action::Allow => Decision::allow(None),
                Action::Deny => Decision::deny(
                    StatusCode::FORBIDDEN,
                    format!("no prefix muxer matched `{raw_path}`"),
                ),
            };
        };

        let rest = &raw_path[prefix.len()..];

        if let Some(entries) = mux.methods.get(method) {
            for entry in entries {
                if let Some(captures) = entry.pattern.matches(rest) {
                    let request = RouteRequest {
                        method,
                        raw_path,
                        headers,
                    };
                    return (entry.handler)(&request, captures);
                }
            }
        }

        // No match for this method: 405 if some other method would have
        // taken the path, 404 otherwise. Only computed on this cold path.
        let other_method_matches = mux.methods.iter().any(|(m, entries)| {
            m != method && entries.iter().any(|e| e.pattern.matches(rest).is_some())
        });
        if other_method_matches {
            Decision::deny(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("method {method} not allowed for `{raw_path}`"),
            )
        } else {
            Decision::deny(StatusCode::NOT_FOUND, format!("no rule for `{raw_path}`"))
        }
    }
}

impl Default for PatternRouter {
    fn default() -> Self {
        Self::new()
    }
}
