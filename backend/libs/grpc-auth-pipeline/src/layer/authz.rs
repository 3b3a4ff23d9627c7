//! Authorization layer

use super::LayerFuture;
use crate::authorizer::Authorizer;
use crate::call::{Call, Reply};
use crate::method::SkipList;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::Status;
use tower::{Layer, Service};
use tracing::warn;

/// Runs the [`Authorizer`] against the AuthContext left by authentication
///
/// Skip-listed methods pass straight through.
#[derive(Clone)]
pub struct AuthorizationLayer {
    authorizer: Arc<Authorizer>,
    skip: Arc<SkipList>,
}

impl AuthorizationLayer {
    pub fn new(authorizer: Arc<Authorizer>, skip: Arc<SkipList>) -> Self {
        Self { authorizer, skip }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AuthorizationService {
            inner: service,
            authorizer: self.authorizer.clone(),
            skip: self.skip.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationService<S> {
    inner: S,
    authorizer: Arc<Authorizer>,
    skip: Arc<SkipList>,
}

impl<S> Service<Call> for AuthorizationService<S>
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

    fn call(&mut self, call: Call) -> Self::Future {
        if !self.skip.contains(&call.method) {
            let ctx = call.auth_context();
            if let Err(denial) = self.authorizer.authorize(&call.method, ctx) {
                warn!(
                    method = %call.method,
                    subject = ctx.map(|c| c.subject.as_str()),
                    reason = %denial,
                    "call denied"
                );
                let status = denial.into_status(ctx.is_some());
                return Box::pin(async move { Err(status) });
            }
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(call).await })
    }
}
