//! `example.v1.ProfileService` handlers
//!
//! Handlers trust the pipeline: by the time one runs, authentication and
//! authorization have passed. They still read the caller from the request
//! extensions, never from the payload.

use crate::descriptors::{DELETE_PROFILE, GET_PROFILE, LIST_PROFILES, PING, UPDATE_PROFILE};
use crate::models::{
    DeleteProfileRequest, DeleteProfileResponse, GetProfileRequest, ListProfilesRequest,
    PingRequest, PingResponse, Profile, UpdateProfileRequest,
};
use crate::store::ProfileStore;
use futures::stream::{self, BoxStream, StreamExt};
use grpc_auth_pipeline::{AuthContextExt, ConfigError, Router, ServiceRegistrar};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ProfileService {
    store: Arc<ProfileStore>,
}

impl ProfileService {
    pub fn new(store: Arc<ProfileStore>) -> Self {
        Self { store }
    }
}

impl ServiceRegistrar for ProfileService {
    fn register(&self, router: &mut Router) -> Result<(), ConfigError> {
        let store = self.store.clone();
        router.unary(GET_PROFILE, move |request: Request<GetProfileRequest>| {
            get_profile(store.clone(), request)
        })?;

        let store = self.store.clone();
        router.unary(UPDATE_PROFILE, move |request: Request<UpdateProfileRequest>| {
            update_profile(store.clone(), request)
        })?;

        let store = self.store.clone();
        router.unary(DELETE_PROFILE, move |request: Request<DeleteProfileRequest>| {
            delete_profile(store.clone(), request)
        })?;

        let store = self.store.clone();
        router.server_streaming(LIST_PROFILES, move |request: Request<ListProfilesRequest>| {
            list_profiles(store.clone(), request)
        })?;

        router.unary(PING, ping)?;
        Ok(())
    }
}

async fn get_profile(
    store: Arc<ProfileStore>,
    request: Request<GetProfileRequest>,
) -> Result<Response<Profile>, Status> {
    let ctx = request.require_auth_context()?;

    let mut profile = store
        .get(&ctx.subject)
        .unwrap_or_else(|| Profile::new(ctx.subject.clone()));
    if profile.name.is_none() {
        profile.name = ctx.name.clone();
    }

    Ok(Response::new(profile))
}

async fn update_profile(
    store: Arc<ProfileStore>,
    request: Request<UpdateProfileRequest>,
) -> Result<Response<Profile>, Status> {
    let subject = request.require_auth_context()?.subject.clone();
    let profile = store.update(&subject, request.into_inner())?;

    info!(subject = %subject, "profile updated");
    Ok(Response::new(profile))
}

async fn delete_profile(
    store: Arc<ProfileStore>,
    request: Request<DeleteProfileRequest>,
) -> Result<Response<DeleteProfileResponse>, Status> {
    let actor = request.require_role("admin")?.subject.clone();
    let subject = request.into_inner().subject;
    let deleted = store.remove(&subject);

    info!(actor = %actor, subject = %subject, deleted, "profile delete requested");
    Ok(Response::new(DeleteProfileResponse { subject, deleted }))
}

async fn list_profiles(
    store: Arc<ProfileStore>,
    request: Request<ListProfilesRequest>,
) -> Result<Response<BoxStream<'static, Result<Profile, Status>>>, Status> {
    let profiles = store.list(request.get_ref().limit);
    Ok(Response::new(stream::iter(profiles.into_iter().map(Ok)).boxed()))
}

async fn ping(_request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
    Ok(Response::new(PingResponse { status: "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grpc_auth_pipeline::AuthContext;

    fn request<T>(message: T, ctx: Option<AuthContext>) -> Request<T> {
        let mut request = Request::new(message);
        if let Some(ctx) = ctx {
            request.extensions_mut().insert(ctx);
        }
        request
    }

    #[tokio::test]
    async fn test_get_profile_falls_back_to_token_name() {
        let store = Arc::new(ProfileStore::new());
        let ctx = AuthContext::new("user-123").with_name("Alice");

        let profile = get_profile(store, request(GetProfileRequest {}, Some(ctx)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(profile.subject, "user-123");
        assert_eq!(profile.name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_handlers_require_context() {
        let store = Arc::new(ProfileStore::new());
        let status = get_profile(store, request(GetProfileRequest {}, None))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_delete_requires_admin() {
        let store = Arc::new(ProfileStore::new());
        store.insert(Profile::new("user-123"));

        let status = delete_profile(
            store.clone(),
            request(
                DeleteProfileRequest {
                    subject: "user-123".into(),
                },
                Some(AuthContext::new("user-123")),
            ),
        )
        .await
        .unwrap_err();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let response = delete_profile(
            store,
            request(
                DeleteProfileRequest {
                    subject: "user-123".into(),
                },
                Some(AuthContext::new("admin-1").with_roles(["admin"])),
            ),
        )
        .await
        .unwrap()
        .into_inner();
        assert!(response.deleted);
    }
}
