//! Bearer JWT validation.
//!
//! Signature verification (RSA public key or HMAC secret, chosen by
//! service settings) plus expiry checking, then extraction of the
//! embedded identity claim. Validation never hands back a partial
//! identity: any failure is a typed [`AuthError`] and maps to a 401.

use std::time::SystemTime;

use josekit::jwk::Jwk;
use josekit::jws::alg::hmac::HmacJwsVerifier;
use josekit::jws::alg::rsassa::RsassaJwsVerifier;
use josekit::jws::{JwsVerifier, HS256, RS256};
use josekit::jwt;
use josekit::JoseError;
use thiserror::Error;

use crate::identity::claims::{Identity, RegisteredClaims, VerifiedClaims};

/// Name of the payload claim carrying the embedded identity.
const IDENTITY_CLAIM: &str = "identity";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token signature verification failed")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),
}

enum Verifier {
    Rsa(RsassaJwsVerifier),
    Hmac(HmacJwsVerifier),
}

impl Verifier {
    fn as_dyn(&self) -> &dyn JwsVerifier {
        match self {
            Verifier::Rsa(v) => v,
            Verifier::Hmac(v) => v,
        }
    }
}

/// Validates bearer JWTs and produces identities.
pub struct IdentityResolver {
    verifier: Verifier,
}

impl IdentityResolver {
    /// RS256 verification against an RSA public key in JWK form.
    pub fn rsa_from_jwk(jwk: &Jwk) -> Result<Self, JoseError> {
        Ok(Self {
            verifier: Verifier::Rsa(RS256.verifier_from_jwk(jwk)?),
        })
    }

    /// HS256 verification with a shared secret.
    pub fn hmac_from_secret(secret: &[u8]) -> Result<Self, JoseError> {
        Ok(Self {
            verifier: Verifier::Hmac(HS256.verifier_from_bytes(secret)?),
        })
    }

    /// Validate a compact JWT and extract its identity.
    pub fn validate(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let (payload, _header) =
            jwt::decode_with_verifier(token, self.verifier.as_dyn()).map_err(|e| match e {
                JoseError::InvalidSignature(_) => AuthError::BadSignature,
                other => AuthError::Malformed(other.to_string()),
            })?;

        let expires_at = payload
            .expires_at()
            .ok_or_else(|| AuthError::Malformed("token has no expiry".to_string()))?;
        if expires_at <= SystemTime::now() {
            return Err(AuthError::Expired);
        }

        let identity: Identity = match payload.claim(IDENTITY_CLAIM) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| AuthError::Malformed(format!("identity claim: {e}")))?,
            None => {
                return Err(AuthError::Malformed(
                    "token has no identity claim".to_string(),
                ))
            }
        };

        let registered = RegisteredClaims {
            issuer: payload.issuer().map(str::to_string),
            subject: payload.subject().map(str::to_string),
            issued_at: payload.issued_at(),
            expires_at: Some(expires_at),
        };

        Ok(VerifiedClaims {
            registered,
            identity,
        })
    }
}
