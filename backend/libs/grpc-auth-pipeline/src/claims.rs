//! Claim extraction
//!
//! Tokens from different issuers put the display name and roles under
//! different claim names. [`ClaimMapping`] says where to look; the verifier
//! hands the decoded claims object to [`ClaimMapping::auth_context`].

use crate::context::AuthContext;
use crate::error::VerificationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded JWT payload
pub type RawClaims = Map<String, Value>;

/// Which custom claims feed which [`AuthContext`] attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimMapping {
    /// Claim holding the role list (array of strings or space separated string)
    pub roles: String,

    /// Claim holding the display name
    pub name: String,
}

impl Default for ClaimMapping {
    fn default() -> Self {
        Self {
            roles: "roles".to_string(),
            name: "name".to_string(),
        }
    }
}

impl ClaimMapping {
    /// Build the auth context from already verified claims
    ///
    /// ## Errors
    ///
    /// Returns `Malformed` if `sub` is missing, empty or not a string, or if
    /// the roles/name claims have the wrong JSON type.
    pub fn auth_context(&self, claims: &RawClaims) -> Result<AuthContext, VerificationError> {
        let subject = match claims.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => sub.clone(),
            Some(_) => return Err(malformed("sub claim must be a non-empty string")),
            None => return Err(malformed("missing sub claim")),
        };

        let name = match claims.get(&self.name) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(_) => return Err(malformed("name claim must be a string")),
        };

        let roles = match claims.get(&self.roles) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(joined)) => joined.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(role) => Ok(role.clone()),
                    _ => Err(malformed("roles claim must contain only strings")),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(malformed("roles claim must be a string or array")),
        };

        let mut ctx = AuthContext::new(subject).with_roles(roles);
        ctx.name = name;
        Ok(ctx)
    }
}

/// Read an integer timestamp claim (`exp`, `iat`, `nbf`)
///
/// A fractional value is rounded up to the next whole second. Against an
/// integer clock this gives the same answers as comparing the exact value:
/// `now >= exp` and `now < iat` hold exactly when they hold for the ceiling.
pub(crate) fn timestamp(claims: &RawClaims, name: &str) -> Result<Option<i64>, VerificationError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.ceil() as i64))
            .map(Some)
            .ok_or_else(|| malformed("timestamp claim out of range")),
        Some(_) => Err(malformed("timestamp claim must be a number")),
    }
}

fn malformed(reason: &str) -> VerificationError {
    VerificationError::Malformed(reason.to_string())
}
