//! Profile Service
//!
//! Example service running behind the gRPC authorization pipeline:
//! `example.v1.ProfileService` handlers, their descriptors, and a JSON HTTP
//! adapter for local use.

pub mod config;
pub mod descriptors;
pub mod error;
pub mod http;
pub mod models;
pub mod service;
pub mod store;

pub use config::Settings;
pub use service::ProfileService;
pub use store::ProfileStore;

use grpc_auth_pipeline::{AuthConfig, ConfigError, Pipeline};
use std::sync::Arc;

/// Build the full chain for this service
pub fn build_pipeline(auth: &AuthConfig, store: Arc<ProfileStore>) -> Result<Pipeline, ConfigError> {
    Pipeline::builder(auth.clone())
        .descriptors(descriptors::registry()?)
        .service(ProfileService::new(store))
        .build()
}
