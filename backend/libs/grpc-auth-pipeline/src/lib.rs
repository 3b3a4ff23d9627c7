//! Request authorization pipeline for gRPC services
//!
//! Every inbound call passes through a fixed chain before it reaches its
//! handler:
//!
//! 1. **Authentication**: read `authorization: Bearer <token>`, verify the
//!    JWT against one pinned issuer and key, store an [`AuthContext`] in the
//!    call's request extensions
//! 2. **Authorization**: per-method metadata first, then ordered policy
//!    rules (first match wins), then the default policy
//! 3. **Redaction**: remove fields marked sensitive from responses of methods
//!    that handle sensitive data
//!
//! Skip-listed methods (health checks, reflection) bypass the first two
//! steps entirely.
//!
//! ## Core Components
//!
//! - [`CredentialVerifier`]: JWT verification and claim mapping
//! - [`AuthContextExt`]: handler-side access to the caller identity
//! - [`PolicyRuleSet`] / [`Authorizer`]: access decisions
//! - [`DescriptorRegistry`] / [`Redactor`]: method metadata and field removal
//! - [`Pipeline`]: the assembled `tower` stack
//! - [`BearerInterceptor`]: client side, attaches a credential to outgoing calls
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use grpc_auth_pipeline::{AuthConfig, AuthContextExt, Call, MethodIdentity, Pipeline, Router};
//! use serde_json::{json, Value};
//! use tonic::{Request, Response, Status};
//!
//! async fn get_profile(request: Request<Value>) -> Result<Response<Value>, Status> {
//!     let ctx = request.require_auth_context()?;
//!     Ok(Response::new(json!({ "subject": ctx.subject })))
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! router.unary("example.v1.ProfileService/GetProfile", get_profile)?;
//!
//! let mut config = AuthConfig::hs256("example", "change-me");
//! config.default_policy = grpc_auth_pipeline::DefaultPolicy::Allow;
//!
//! let pipeline = Pipeline::builder(config).router(router).build()?;
//!
//! let call = Call::new(
//!     MethodIdentity::parse("example.v1.ProfileService/GetProfile")?,
//!     json!({}),
//! )
//! .with_bearer("eyJhbGc...")?;
//! let reply = pipeline.handle(call).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Guarantees
//!
//! - One algorithm, one key, one issuer per pipeline
//! - Expiry is exclusive: a token is rejected at `now >= exp`
//! - An AuthContext exists only if this pipeline's authentication step
//!   produced it; anything pre-populated is discarded
//! - Callers only ever see stable status messages, never verification detail

mod authorizer;
mod call;
mod claims;
mod client;
mod config;
mod context;
mod descriptor;
mod error;
mod layer;
mod method;
mod pipeline;
mod policy;
mod redaction;
mod router;
mod verifier;

pub use authorizer::{Authorizer, Resolution};
pub use call::{Call, Reply, ReplyBody};
pub use claims::{ClaimMapping, RawClaims};
pub use client::BearerInterceptor;
pub use config::{AuthConfig, KeyConfig, RedactionConfig};
pub use context::{AuthContext, AuthContextExt};
pub use descriptor::{
    DescriptorRegistry, DescriptorSet, FieldDescriptor, MessageDescriptor, MethodDescriptor,
    MethodRedaction,
};
pub use error::{AuthnRejection, ConfigError, Denial, VerificationError};
pub use layer::{
    bearer_token, AuthenticationLayer, AuthenticationService, Authenticator, AuthnOutcome,
    AuthorizationLayer, AuthorizationService, RedactionLayer, RedactionService,
};
pub use method::{MethodIdentity, MethodPattern, SkipList};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use policy::{
    AccessRequirement, DefaultPolicy, Effect, PolicyRule, PolicyRuleConfig, PolicyRuleSet,
    RuleSource,
};
pub use redaction::Redactor;
pub use router::{Handler, Router, ServiceRegistrar};
pub use verifier::{CredentialVerifier, VerificationKey};

// Re-export tonic Status for convenience
pub use tonic::Status;
