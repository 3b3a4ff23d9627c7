//! Bearer credential verification
//!
//! Verifies a JWT against one pinned algorithm and key, checks the issuer
//! and time claims, and maps the payload to an [`AuthContext`].
//!
//! ## Security Design
//!
//! - **Pinned algorithm**: the configured algorithm is the only one accepted;
//!   a token announcing another one fails as a bad signature
//! - **Exclusive expiry**: a token is rejected when `now >= exp`, with no
//!   leeway. `jsonwebtoken`'s own expiry check is disabled because it treats
//!   `exp == now` as valid
//! - **Stateless**: the verifier is immutable after construction and can be
//!   shared by any number of concurrent calls

use crate::claims::{timestamp, ClaimMapping, RawClaims};
use crate::context::AuthContext;
use crate::error::{ConfigError, VerificationError};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Algorithm plus decoding key
#[derive(Clone)]
pub struct VerificationKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

impl VerificationKey {
    /// HMAC-SHA256 with a shared secret
    pub fn hs256(secret: &[u8]) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::InvalidKey("HS256 secret must not be empty".into()));
        }
        Ok(Self {
            algorithm: Algorithm::HS256,
            key: DecodingKey::from_secret(secret),
        })
    }

    /// RSA-SHA256 with a PEM encoded public key
    pub fn rs256_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| ConfigError::InvalidKey(format!("failed to parse RSA public key: {e}")))?;
        Ok(Self {
            algorithm: Algorithm::RS256,
            key,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Validates bearer tokens for one issuer
#[derive(Clone, Debug)]
pub struct CredentialVerifier {
    issuer: String,
    key: VerificationKey,
    claims: ClaimMapping,
    enforce_issued_at: bool,
}

impl CredentialVerifier {
    /// Create a verifier for `issuer`
    ///
    /// ## Errors
    ///
    /// Returns `ConfigError::EmptyIssuer` if `issuer` is empty.
    pub fn new(issuer: impl Into<String>, key: VerificationKey) -> Result<Self, ConfigError> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(ConfigError::EmptyIssuer);
        }

        Ok(Self {
            issuer,
            key,
            claims: ClaimMapping::default(),
            enforce_issued_at: false,
        })
    }

    pub fn with_claim_mapping(mut self, claims: ClaimMapping) -> Self {
        self.claims = claims;
        self
    }

    /// Reject tokens whose `iat` (or `nbf`) lies in the future
    pub fn enforce_issued_at(mut self, enforce: bool) -> Self {
        self.enforce_issued_at = enforce;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `token` against the current wall clock
    pub fn verify(&self, token: &str) -> Result<AuthContext, VerificationError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify `token` as of `now` (Unix seconds)
    ///
    /// Check order: structure, signature, issuer, expiry, not-before, then
    /// claim mapping. The first failure wins.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<AuthContext, VerificationError> {
        if token.split('.').count() != 3 || token.split('.').any(str::is_empty) {
            return Err(VerificationError::Malformed(
                "expected three non-empty dot separated segments".to_string(),
            ));
        }

        let claims = decode::<RawClaims>(token, &self.key.key, &self.validation())
            .map_err(map_jwt_error)?
            .claims;

        match claims.get("iss") {
            Some(Value::String(iss)) if *iss == self.issuer => {}
            other => {
                return Err(VerificationError::IssuerMismatch {
                    expected: self.issuer.clone(),
                    actual: other.map(|v| match v {
                        Value::String(s) => s.clone(),
                        v => v.to_string(),
                    }),
                })
            }
        }

        let expires_at = timestamp(&claims, "exp")?
            .ok_or_else(|| VerificationError::Malformed("missing exp claim".to_string()))?;
        if now >= expires_at {
            return Err(VerificationError::Expired {
                expired_at: expires_at,
                now,
            });
        }

        if self.enforce_issued_at {
            let issued_at = timestamp(&claims, "iat")?;
            let not_before = timestamp(&claims, "nbf")?;
            if let Some(valid_from) = issued_at.into_iter().chain(not_before).max() {
                if now < valid_from {
                    return Err(VerificationError::NotYetValid { valid_from, now });
                }
            }
        }

        self.claims.auth_context(&claims)
    }

    /// Signature-only validation; every claim check is done by hand above
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.key.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;
        validation
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> VerificationError {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::Crypto(_) => VerificationError::SignatureInvalid,
        _ => VerificationError::Malformed(err.to_string()),
    }
}
