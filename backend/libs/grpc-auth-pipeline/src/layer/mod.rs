//! Tower layers making up the call chain
//!
//! Wrapped in this order around the [`Router`](crate::Router):
//!
//! ```text
//! authentication -> authorization -> redaction -> handler
//! ```
//!
//! Each layer either short-circuits with a `Status` or hands the call to the
//! next one. Handler errors come back through unchanged.

mod authn;
mod authz;
mod redact;

pub use authn::{bearer_token, AuthenticationLayer, AuthenticationService, Authenticator, AuthnOutcome};
pub use authz::{AuthorizationLayer, AuthorizationService};
pub use redact::{RedactionLayer, RedactionService};

use crate::call::Reply;
use std::future::Future;
use std::pin::Pin;
use tonic::Status;

/// Future type shared by every layer
pub type LayerFuture = Pin<Box<dyn Future<Output = Result<Reply, Status>> + Send>>;
