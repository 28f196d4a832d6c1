//! Shared utilities for integration testing.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use authgate::config::AccessSystem;
use authgate::expr::Registry;
use authgate::identity::IdentityResolver;
use authgate::rules::{DecisionCoordinator, EngineSnapshot};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use josekit::jws::{JwsHeader, HS256};
use josekit::jwt::{self, JwtPayload};

pub const HMAC_SECRET: &[u8] = b"integration-test-secret";

/// A representative rule document: one guarded prefix, a token table and
/// a root token.
pub fn base_document() -> AccessSystem {
    serde_json::from_value(serde_json::json!({
        "owner": "platform-team",
        "hostGroups": [{
            "name": "api",
            "default": "deny",
            "hosts": ["api.example.com"],
            "checks": [{
                "name": "core",
                "base": "/prefix",
                "paths": [
                    {
                        "path": "/x",
                        "rules": {
                            "GET": {
                                "description": "token or superuser",
                                "expression": "bearer('T') || root()",
                                "mustAuth": false
                            }
                        }
                    },
                    {
                        "path": "/institutions/:epbcID/fees",
                        "rules": {
                            "GET": {
                                "description": "per-institution token",
                                "expression": "bearer(param(':epbcID'))",
                                "mustAuth": false
                            }
                        }
                    },
                    {
                        "path": "/private",
                        "rules": {
                            "GET": {
                                "description": "authenticated superusers only",
                                "expression": "root()",
                                "mustAuth": true
                            }
                        }
                    }
                ]
            }]
        }],
        "overrides": {
            "status.example.com": "allow",
            "dark.example.com": "deny"
        },
        "tokens": {
            "abc": "T",
            "sfu-token": "SFU"
        },
        "blocks": {"u-blocked": true},
        "rootToken": "root-secret"
    }))
    .expect("base document is well-formed")
}

pub fn coordinator_for(doc: &AccessSystem, resolver: Option<IdentityResolver>) -> DecisionCoordinator {
    let snapshot = EngineSnapshot::build(
        doc,
        resolver.map(Arc::new),
        Arc::new(Registry::standard()),
    )
    .expect("document compiles");
    DecisionCoordinator::new(snapshot)
}

pub fn hmac_resolver() -> IdentityResolver {
    IdentityResolver::hmac_from_secret(HMAC_SECRET).expect("hmac resolver")
}

pub fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        format!("Bearer {token}").parse().expect("header value"),
    );
    headers
}

/// Sign an HS256 token whose identity claim carries the given fields.
pub fn hmac_token(identity: serde_json::Value, expires_in_secs: i64) -> String {
    let mut payload = JwtPayload::new();
    payload.set_issuer("authgate-tests");
    let expiry = if expires_in_secs >= 0 {
        SystemTime::now() + Duration::from_secs(expires_in_secs as u64)
    } else {
        SystemTime::now() - Duration::from_secs(expires_in_secs.unsigned_abs())
    };
    payload.set_expires_at(&expiry);
    payload
        .set_claim("identity", Some(identity))
        .expect("identity claim");

    let signer = HS256.signer_from_bytes(HMAC_SECRET).expect("signer");
    let mut header = JwsHeader::new();
    header.set_token_type("JWT");
    jwt::encode_with_signer(&payload, &header, &signer).expect("signed token")
}
