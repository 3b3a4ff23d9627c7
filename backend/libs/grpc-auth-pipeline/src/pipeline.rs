//! Assembled call chain
//!
//! [`Pipeline::builder`] validates the whole configuration (key material,
//! patterns, rules, descriptors, routes) and composes
//!
//! ```text
//! AuthenticationLayer -> AuthorizationLayer -> RedactionLayer -> Router
//! ```
//!
//! with `tower::ServiceBuilder`. The result is immutable and cheap to clone.

use crate::authorizer::Authorizer;
use crate::call::{Call, Reply};
use crate::config::AuthConfig;
use crate::descriptor::DescriptorRegistry;
use crate::error::ConfigError;
use crate::layer::{AuthenticationLayer, AuthorizationLayer, Authenticator, RedactionLayer};
use crate::router::{Router, ServiceRegistrar};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::Status;
use tower::util::{BoxCloneService, Oneshot};
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{debug, info};

pub struct PipelineBuilder {
    config: AuthConfig,
    descriptors: DescriptorRegistry,
    router: Router,
    registrars: Vec<Box<dyn ServiceRegistrar>>,
}

impl PipelineBuilder {
    pub fn descriptors(mut self, descriptors: DescriptorRegistry) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Add a service; its routes are registered during [`build`](Self::build)
    pub fn service(mut self, registrar: impl ServiceRegistrar + 'static) -> Self {
        self.registrars.push(Box::new(registrar));
        self
    }

    pub fn build(self) -> Result<Pipeline, ConfigError> {
        let verifier = self.config.verifier()?;
        let skip = Arc::new(self.config.skip_list()?);
        let rules = self.config.rule_set()?;

        let mut router = self.router;
        for registrar in &self.registrars {
            router.register(registrar.as_ref())?;
        }

        for method in router.methods() {
            if self.descriptors.method(method).is_none() {
                debug!(method = %method, "route has no descriptor");
            }
        }

        let descriptors = Arc::new(self.descriptors);
        let authorizer = Arc::new(Authorizer::new(rules).with_descriptors(&descriptors));
        let authenticator = Authenticator::new(verifier, skip.clone(), authorizer.clone());

        info!(
            issuer = %self.config.issuer,
            rules = authorizer.rules().rules().len(),
            default_policy = ?self.config.default_policy,
            skip_patterns = self.config.skip.len(),
            routes = router.len(),
            descriptors = descriptors.len(),
            skip_streaming = self.config.redaction.skip_streaming,
            "auth pipeline built"
        );

        let service = ServiceBuilder::new()
            .layer(AuthenticationLayer::new(authenticator))
            .layer(AuthorizationLayer::new(authorizer, skip))
            .layer(RedactionLayer::new(
                descriptors.clone(),
                self.config.redaction.skip_streaming,
            ))
            .service(router);

        Ok(Pipeline {
            service: BoxCloneService::new(service),
            descriptors,
        })
    }
}

/// The runnable chain
#[derive(Clone)]
pub struct Pipeline {
    service: BoxCloneService<Call, Reply, Status>,
    descriptors: Arc<DescriptorRegistry>,
}

impl Pipeline {
    pub fn builder(config: AuthConfig) -> PipelineBuilder {
        PipelineBuilder {
            config,
            descriptors: DescriptorRegistry::default(),
            router: Router::new(),
            registrars: Vec::new(),
        }
    }

    /// Run one call through the chain
    ///
    /// The returned future owns its own handle on the chain and is `Send`.
    pub fn handle(&self, call: Call) -> Oneshot<Pipeline, Call> {
        self.clone().oneshot(call)
    }

    pub fn descriptors(&self) -> &DescriptorRegistry {
        &self.descriptors
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl Service<Call> for Pipeline {
    type Response = Reply;
    type Error = Status;
    type Future = BoxFuture<'static, Result<Reply, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, mut call: Call) -> Self::Future {
        // the descriptor is authoritative; the caller's flag only counts for
        // methods without one
        if let Some(descriptor) = self.descriptors.method(&call.method) {
            call.streaming = descriptor.server_streaming;
        }
        self.service.call(call)
    }
}
