//! Per-call authentication context
//!
//! The authentication layer stores the verified [`AuthContext`] in the
//! extensions of the call's own `tonic::Request`. Extensions live and die
//! with the request, so the context is scoped to exactly one call and is
//! never visible to another one. Handlers read it through [`AuthContextExt`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tonic::{Request, Status};

/// Verified identity of the caller
///
/// ## Design Notes
///
/// - Fields are public for direct access (no getter boilerplate)
/// - Only the authentication layer inserts one into a request
/// - Roles are a set; duplicates in the token collapse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Subject (`sub` claim)
    pub subject: String,

    /// Display name, from the configured name claim
    pub name: Option<String>,

    /// Roles, from the configured roles claim
    pub roles: BTreeSet<String>,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            name: None,
            roles: BTreeSet::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Roles from `required` this context does not hold, in sorted order
    ///
    /// An empty result means every required role is present.
    pub fn missing_roles<'a>(&self, required: &'a BTreeSet<String>) -> Vec<&'a str> {
        required
            .iter()
            .filter(|role| !self.roles.contains(*role))
            .map(String::as_str)
            .collect()
    }
}

/// Extension trait for reading the auth context from a request
///
/// Implemented for every `Request<T>` so typed handlers can use it directly.
///
/// ## Usage
///
/// ```rust
/// use grpc_auth_pipeline::AuthContextExt;
/// use tonic::{Request, Response, Status};
///
/// async fn whoami(request: Request<()>) -> Result<Response<String>, Status> {
///     let ctx = request.require_auth_context()?;
///     Ok(Response::new(ctx.subject.clone()))
/// }
/// ```
pub trait AuthContextExt {
    /// The call's auth context, if authentication ran and succeeded
    ///
    /// `None` for skip-listed methods and for anonymous calls to public
    /// methods.
    fn auth_context(&self) -> Option<&AuthContext>;

    /// Like [`auth_context`](Self::auth_context) but fails with
    /// `Status::unauthenticated` when there is none
    fn require_auth_context(&self) -> Result<&AuthContext, Status>;

    /// Require that the caller holds `role`
    ///
    /// ## Errors
    ///
    /// - `Status::unauthenticated` if there is no auth context
    /// - `Status::permission_denied` if the role is missing
    fn require_role(&self, role: &str) -> Result<&AuthContext, Status>;
}

impl<T> AuthContextExt for Request<T> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }

    fn require_auth_context(&self) -> Result<&AuthContext, Status> {
        self.auth_context()
            .ok_or_else(|| Status::unauthenticated("authentication required"))
    }

    fn require_role(&self, role: &str) -> Result<&AuthContext, Status> {
        let ctx = self.require_auth_context()?;

        if !ctx.has_role(role) {
            return Err(Status::permission_denied("insufficient role"));
        }

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_auth_context_missing() {
        let request = Request::new(());

        assert!(request.auth_context().is_none());
        let status = request.require_auth_context().unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[test]
    fn test_auth_context_present() {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(AuthContext::new("user-123").with_name("Alice"));

        let ctx = request.require_auth_context().unwrap();
        assert_eq!(ctx.subject, "user-123");
        assert_eq!(ctx.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_require_role() {
        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(AuthContext::new("admin-1").with_roles(["admin"]));

        assert!(request.require_role("admin").is_ok());
        let status = request.require_role("ops").unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
    }

    #[test]
    fn test_missing_roles_is_conjunctive() {
        let ctx = AuthContext::new("u").with_roles(["admin"]);
        assert_eq!(ctx.missing_roles(&roles(&["admin", "ops"])), vec!["ops"]);

        let ctx = AuthContext::new("u").with_roles(["admin", "ops", "extra"]);
        assert!(ctx.missing_roles(&roles(&["admin", "ops"])).is_empty());
        assert!(ctx.missing_roles(&BTreeSet::new()).is_empty());
    }
}
