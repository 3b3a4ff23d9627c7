//! Authentication layer
//!
//! Extracts the bearer credential, verifies it and stores the resulting
//! [`AuthContext`] in the call's request extensions. Per call the outcome is
//! one of [`AuthnOutcome`] or a rejection; a rejected call never reaches the
//! next layer.

use super::LayerFuture;
use crate::authorizer::Authorizer;
use crate::call::{Call, Reply};
use crate::context::AuthContext;
use crate::error::{AuthnRejection, VerificationError};
use crate::method::{MethodIdentity, SkipList};
use crate::verifier::CredentialVerifier;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::metadata::MetadataMap;
use tonic::Status;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Successful end states of the authentication step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthnOutcome {
    /// Skip-listed method; credentials are not looked at
    Skipped,
    /// Public method called without a credential
    Anonymous,
    Authenticated(AuthContext),
}

/// Read the bearer token from `authorization` metadata
///
/// `Ok(None)` when there is no `authorization` entry. The scheme is matched
/// case-insensitively; anything that is not `Bearer <token>` is an invalid
/// credential.
pub fn bearer_token(metadata: &MetadataMap) -> Result<Option<&str>, AuthnRejection> {
    let Some(value) = metadata.get("authorization") else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| malformed("authorization value is not ASCII"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| malformed("expected 'Bearer <token>'"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(malformed("unsupported authorization scheme"));
    }
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(malformed("expected 'Bearer <token>'"));
    }

    Ok(Some(token))
}

fn malformed(reason: &str) -> AuthnRejection {
    AuthnRejection::InvalidCredential(VerificationError::Malformed(reason.to_string()))
}

/// The per-call authentication state machine
#[derive(Debug, Clone)]
pub struct Authenticator {
    verifier: CredentialVerifier,
    skip: Arc<SkipList>,
    authorizer: Arc<Authorizer>,
}

impl Authenticator {
    /// `authorizer` is consulted only to learn whether a method is public
    pub fn new(verifier: CredentialVerifier, skip: Arc<SkipList>, authorizer: Arc<Authorizer>) -> Self {
        Self {
            verifier,
            skip,
            authorizer,
        }
    }

    pub fn authenticate(
        &self,
        method: &MethodIdentity,
        metadata: &MetadataMap,
    ) -> Result<AuthnOutcome, AuthnRejection> {
        if self.skip.contains(method) {
            return Ok(AuthnOutcome::Skipped);
        }

        match bearer_token(metadata)? {
            Some(token) => Ok(AuthnOutcome::Authenticated(self.verifier.verify(token)?)),
            None if self.authorizer.resolve(method).is_public() => Ok(AuthnOutcome::Anonymous),
            None => Err(AuthnRejection::MissingCredential),
        }
    }
}

#[derive(Clone)]
pub struct AuthenticationLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthenticationLayer {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}

impl<S> Layer<S> for AuthenticationLayer {
    type Service = AuthenticationService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AuthenticationService {
            inner: service,
            authenticator: self.authenticator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthenticationService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Call> for AuthenticationService<S>
where
    S: Service<Call, Response = Reply, Error = Status> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Reply;
    type Error = Status;
    type Future = LayerFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: Call) -> Self::Future {
        // Only this layer may produce a context
        call.request.extensions_mut().remove::<AuthContext>();

        match self
            .authenticator
            .authenticate(&call.method, call.request.metadata())
        {
            Ok(AuthnOutcome::Authenticated(ctx)) => {
                debug!(method = %call.method, subject = %ctx.subject, "caller authenticated");
                call.request.extensions_mut().insert(ctx);
            }
            Ok(outcome) => {
                debug!(method = %call.method, outcome = ?outcome, "no credential required");
            }
            Err(rejection) => {
                warn!(
                    method = %call.method,
                    reason = rejection.kind(),
                    error = %rejection,
                    "authentication rejected"
                );
                let status = Status::from(rejection);
                return Box::pin(async move { Err(status) });
            }
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(call).await })
    }
}
