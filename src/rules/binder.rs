//! Binds rule documents to the router.
//!
//! At configuration load every rule expression is compiled once; a single
//! compile failure aborts the whole snapshot (the previous one stays
//! live). Each compiled rule is wrapped in a handler closure that carries
//! the shared auth context and is registered under every host of its
//! group.

use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};

use crate::config::document::AccessSystem;
use crate::config::loader::ConfigError;
use crate::config::validation::ValidationError;
use crate::expr::{compile, CompiledRule, Registry, RequestFacts};
use crate::identity::{Identity, IdentityResolver};
use crate::routing::{Captures, Decision, PatternRouter, RouteHandler, RouteRequest};

/// Shared per-snapshot state the bound handlers close over: the token
/// table, the block list, the verification key and the predicate
/// registry.
pub struct RuleContext {
    document: AccessSystem,
    resolver: Option<Arc<IdentityResolver>>,
    registry: Arc<Registry>,
}

impl RuleContext {
    fn token_name(&self, bearer: &str) -> Option<&str> {
        self.document.token_name(bearer)
    }

    fn is_blocked(&self, user_id: &str) -> bool {
        self.document.is_blocked(user_id)
    }
}

/// Compile every rule in the document and build the routing table.
pub fn bind(
    doc: &AccessSystem,
    resolver: Option<Arc<IdentityResolver>>,
    registry: Arc<Registry>,
) -> Result<PatternRouter, ConfigError> {
    let ctx = Arc::new(RuleContext {
        document: doc.clone(),
        resolver,
        registry,
    });

    let mut router = PatternRouter::new();

    for group in &doc.host_groups {
        for host in &group.hosts {
            router.register_host(host, group.default);
        }
        for check in &group.checks {
            for path in &check.paths {
                for (method_name, rule) in &path.rules {
                    let method: Method = method_name.parse().map_err(|_| {
                        ConfigError::Validation(vec![ValidationError::BadMethod {
                            path: path.path.clone(),
                            method: method_name.clone(),
                        }])
                    })?;

                    let rule_id = format!(
                        "{}/{}{} {}",
                        group.name, check.name, path.path, method_name
                    );
                    let compiled = compile(&rule.expression, &ctx.registry)
                        .map_err(|source| ConfigError::Rule {
                            rule: rule_id.clone(),
                            source,
                        })?;

                    let handler = bind_rule(
                        ctx.clone(),
                        Arc::new(compiled),
                        rule.must_auth,
                        rule_id.into(),
                    );
                    for host in &group.hosts {
                        router.register(host, &check.base, method.clone(), &path.path, handler.clone());
                    }
                }
            }
        }
    }

    Ok(router)
}

fn bind_rule(
    ctx: Arc<RuleContext>,
    rule: Arc<CompiledRule>,
    must_auth: bool,
    rule_id: Arc<str>,
) -> RouteHandler {
    Arc::new(move |request, captures| {
        decide_rule(&ctx, &rule, must_auth, &rule_id, request, captures)
    })
}

fn decide_rule(
    ctx: &RuleContext,
    rule: &CompiledRule,
    must_auth: bool,
    rule_id: &str,
    request: &RouteRequest<'_>,
    captures: Captures,
) -> Decision {
    let bearer = bearer_token(request.headers);

    // A bearer might be a JWT; validate it whenever we have a key. The
    // outcome only gates the request when the rule demands auth.
    let mut identity: Option<Identity> = None;
    if let (Some(token), Some(resolver)) = (bearer, ctx.resolver.as_deref()) {
        match resolver.validate(token) {
            Ok(claims) => identity = Some(claims.identity),
            Err(err) => {
                if must_auth {
                    tracing::info!(rule = %rule_id, error = %err, "authentication failed");
                    return Decision::deny(StatusCode::UNAUTHORIZED, err.to_string());
                }
            }
        }
    }
    if must_auth && identity.is_none() {
        return Decision::deny(StatusCode::UNAUTHORIZED, "authentication required");
    }

    if let Some(id) = &identity {
        if ctx.is_blocked(&id.user_id) {
            tracing::warn!(rule = %rule_id, user = %id.user_id, "blocked user denied");
            return Decision::deny(StatusCode::FORBIDDEN, "user is blocked");
        }
    }

    let facts = RequestFacts {
        token_name: bearer
            .and_then(|token| ctx.token_name(token))
            .map(str::to_string),
        superuser: identity.as_ref().map(|id| id.superuser).unwrap_or(false),
        params: captures,
    };

    match rule.evaluate(&ctx.registry, &facts) {
        Ok(true) => {
            let username = identity
                .as_ref()
                .filter(|id| !id.name.is_empty())
                .map(|id| id.name.clone())
                .or_else(|| facts.token_name.clone());
            Decision::allow(username)
        }
        Ok(false) => {
            tracing::info!(rule = %rule_id, path = %request.raw_path, "rule denied request");
            Decision::deny(StatusCode::FORBIDDEN, format!("denied by rule `{rule_id}`"))
        }
        Err(err) => {
            // Runtime evaluation problems fold into a denial, never a 500.
            tracing::warn!(rule = %rule_id, error = %err, "rule evaluation failed");
            Decision::deny(
                StatusCode::FORBIDDEN,
                format!("rule `{rule_id}` could not be evaluated"),
            )
        }
    }
}

/// Extract the bearer token from an Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
