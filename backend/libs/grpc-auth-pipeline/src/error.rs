//! Error types for the authorization pipeline
//!
//! Internal errors carry enough detail for logs. The conversions to
//! [`tonic::Status`] collapse them to stable codes and messages so nothing
//! about *why* a credential failed leaks to the caller.

use thiserror::Error;
use tonic::Status;

/// Why a bearer credential failed verification
///
/// All variants surface to callers as `Unauthenticated`; the variant is only
/// used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Token could not be split into its parts or its claims could not be read
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// Signature did not verify against the configured key
    #[error("credential signature is invalid")]
    SignatureInvalid,

    /// `iss` claim missing or different from the configured issuer
    #[error("credential issuer mismatch (expected {expected}, got {actual:?})")]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// Current time is at or after `exp`
    #[error("credential expired at {expired_at} (now {now})")]
    Expired { expired_at: i64, now: i64 },

    /// Current time is before `iat` / `nbf`
    #[error("credential not valid before {valid_from} (now {now})")]
    NotYetValid { valid_from: i64, now: i64 },
}

impl VerificationError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationError::Malformed(_) => "malformed",
            VerificationError::SignatureInvalid => "signature_invalid",
            VerificationError::IssuerMismatch { .. } => "issuer_mismatch",
            VerificationError::Expired { .. } => "expired",
            VerificationError::NotYetValid { .. } => "not_yet_valid",
        }
    }
}

/// Terminal failure of the authentication step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthnRejection {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] VerificationError),
}

impl AuthnRejection {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            AuthnRejection::MissingCredential => "missing_credential",
            AuthnRejection::InvalidCredential(err) => err.kind(),
        }
    }
}

impl From<AuthnRejection> for Status {
    fn from(rejection: AuthnRejection) -> Self {
        match rejection {
            AuthnRejection::MissingCredential => Status::unauthenticated("missing credential"),
            AuthnRejection::InvalidCredential(_) => Status::unauthenticated("invalid credential"),
        }
    }
}

/// Why the authorization step denied a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    /// The resolved requirement needs an authenticated caller and there is none
    #[error("authentication required")]
    AuthenticationRequired,

    /// Caller is authenticated but lacks at least one required role
    #[error("insufficient role (missing {missing:?})")]
    InsufficientRole { missing: Vec<String> },

    /// An explicit deny rule matched
    #[error("denied by rule {rule}")]
    RuleDenied { rule: String },

    /// Nothing matched and the default policy is deny
    #[error("denied by default policy")]
    DefaultDeny,
}

impl Denial {
    /// Map to a wire status
    ///
    /// `authenticated` is whether the call carried an AuthContext; it decides
    /// between `Unauthenticated` and `PermissionDenied` for the deny outcomes
    /// that are not role-specific.
    pub fn into_status(self, authenticated: bool) -> Status {
        match self {
            Denial::AuthenticationRequired => Status::unauthenticated("authentication required"),
            Denial::InsufficientRole { .. } => Status::permission_denied("insufficient role"),
            Denial::RuleDenied { .. } | Denial::DefaultDeny => {
                if authenticated {
                    Status::permission_denied("access denied")
                } else {
                    Status::unauthenticated("authentication required")
                }
            }
        }
    }
}

/// Startup-time configuration defect
///
/// Every variant is raised while building the pipeline; none of them can
/// occur per call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid method identity {input:?}: {reason}")]
    InvalidMethod { input: String, reason: &'static str },

    #[error("invalid method pattern {input:?}: {reason}")]
    InvalidPattern { input: String, reason: &'static str },

    #[error("issuer must not be empty")]
    EmptyIssuer,

    #[error("invalid verification key: {0}")]
    InvalidKey(String),

    #[error("policy rule {rule:?}: {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("duplicate descriptor for method {0}")]
    DuplicateMethod(String),

    #[error("duplicate message descriptor {0}")]
    DuplicateMessage(String),

    #[error("method {method} references unknown message {message}")]
    UnknownMessage { method: String, message: String },

    #[error("field {message}.{field} references unknown message {target}")]
    UnknownFieldType {
        message: String,
        field: String,
        target: String,
    },

    #[error("message {message} declares field {field:?} more than once")]
    DuplicateField { message: String, field: String },

    #[error("message {0} declares a field with an empty name")]
    EmptyFieldName(String),

    #[error("duplicate route for method {0}")]
    DuplicateRoute(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_rejections_collapse_to_unauthenticated() {
        let missing: Status = AuthnRejection::MissingCredential.into();
        assert_eq!(missing.code(), Code::Unauthenticated);
        assert_eq!(missing.message(), "missing credential");

        let expired: Status = AuthnRejection::from(VerificationError::Expired {
            expired_at: 10,
            now: 11,
        })
        .into();
        assert_eq!(expired.code(), Code::Unauthenticated);
        assert_eq!(expired.message(), "invalid credential");
    }

    #[test]
    fn test_status_message_hides_verification_detail() {
        let status: Status = AuthnRejection::from(VerificationError::IssuerMismatch {
            expected: "example".into(),
            actual: Some("attacker".into()),
        })
        .into();
        assert!(!status.message().contains("attacker"));
    }

    #[test]
    fn test_denial_status_depends_on_authentication() {
        assert_eq!(
            Denial::DefaultDeny.into_status(false).code(),
            Code::Unauthenticated
        );
        assert_eq!(
            Denial::DefaultDeny.into_status(true).code(),
            Code::PermissionDenied
        );
        assert_eq!(
            Denial::InsufficientRole {
                missing: vec!["admin".into()]
            }
            .into_status(true)
            .code(),
            Code::PermissionDenied
        );
        assert_eq!(
            Denial::AuthenticationRequired.into_status(false).code(),
            Code::Unauthenticated
        );
    }
}
