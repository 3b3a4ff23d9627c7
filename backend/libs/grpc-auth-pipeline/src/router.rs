//! Route table at the end of the chain
//!
//! Maps a [`MethodIdentity`] to a handler. The typed helpers let a handler
//! take a `tonic::Request<Req>` and return a `tonic::Response<Resp>` with
//! serde doing the conversion, so handler code reads like a generated tonic
//! service.

use crate::call::{Call, Reply, ReplyBody};
use crate::error::ConfigError;
use crate::method::MethodIdentity;
use futures::future::BoxFuture;
use futures::stream::{Stream, StreamExt};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::{Request, Response, Status};
use tower::Service;

/// Type-erased handler over a whole [`Call`]
pub type Handler = Arc<dyn Fn(Call) -> BoxFuture<'static, Result<Reply, Status>> + Send + Sync>;

/// Something that contributes routes, usually one gRPC service
pub trait ServiceRegistrar: Send + Sync {
    fn register(&self, router: &mut Router) -> Result<(), ConfigError>;
}

#[derive(Clone, Default)]
pub struct Router {
    routes: Arc<HashMap<MethodIdentity, Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler
    ///
    /// ## Errors
    ///
    /// `ConfigError::DuplicateRoute` if `method` already has a handler.
    pub fn route(&mut self, method: MethodIdentity, handler: Handler) -> Result<&mut Self, ConfigError> {
        let routes = Arc::make_mut(&mut self.routes);
        if routes.contains_key(&method) {
            return Err(ConfigError::DuplicateRoute(method.to_string()));
        }
        routes.insert(method, handler);
        Ok(self)
    }

    /// Register a unary handler working on typed messages
    pub fn unary<Req, Resp, F, Fut>(&mut self, method: &str, handler: F) -> Result<&mut Self, ConfigError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Request<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Resp>, Status>> + Send + 'static,
    {
        let method = MethodIdentity::parse(method)?;
        let handler = Arc::new(handler);

        self.route(
            method,
            Arc::new(move |call: Call| {
                let handler = handler.clone();
                async move {
                    let request = decode_request::<Req>(call.request)?;
                    let response = (*handler)(request).await?;
                    let (metadata, message, extensions) = response.into_parts();
                    let body = ReplyBody::Message(encode_message(message)?);
                    Ok(Response::from_parts(metadata, body, extensions))
                }
                .boxed()
            }),
        )
    }

    /// Register a server-streaming handler working on typed messages
    pub fn server_streaming<Req, Resp, S, F, Fut>(
        &mut self,
        method: &str,
        handler: F,
    ) -> Result<&mut Self, ConfigError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
        F: Fn(Request<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<S>, Status>> + Send + 'static,
    {
        let method = MethodIdentity::parse(method)?;
        let handler = Arc::new(handler);

        self.route(
            method,
            Arc::new(move |call: Call| {
                let handler = handler.clone();
                async move {
                    let request = decode_request::<Req>(call.request)?;
                    let response = (*handler)(request).await?;
                    let (metadata, stream, extensions) = response.into_parts();
                    let stream = stream
                        .map(|item| item.and_then(encode_message))
                        .boxed();
                    Ok(Response::from_parts(metadata, ReplyBody::Stream(stream), extensions))
                }
                .boxed()
            }),
        )
    }

    pub fn register(&mut self, registrar: &dyn ServiceRegistrar) -> Result<&mut Self, ConfigError> {
        registrar.register(self)?;
        Ok(self)
    }

    pub fn contains(&self, method: &MethodIdentity) -> bool {
        self.routes.contains_key(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodIdentity> {
        self.routes.keys()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Service<Call> for Router {
    type Response = Reply;
    type Error = Status;
    type Future = BoxFuture<'static, Result<Reply, Status>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call) -> Self::Future {
        match self.routes.get(&call.method) {
            Some(handler) => handler(call),
            None => {
                let status = Status::unimplemented(format!("method {} is not implemented", call.method));
                futures::future::ready(Err(status)).boxed()
            }
        }
    }
}

fn decode_request<Req: DeserializeOwned>(request: Request<Value>) -> Result<Request<Req>, Status> {
    let (metadata, extensions, payload) = request.into_parts();
    let message = serde_json::from_value(payload)
        .map_err(|e| Status::invalid_argument(format!("invalid request payload: {e}")))?;
    Ok(Request::from_parts(metadata, extensions, message))
}

fn encode_message<Resp: Serialize>(message: Resp) -> Result<Value, Status> {
    serde_json::to_value(message).map_err(|e| {
        tracing::error!(error = %e, "failed to encode response message");
        Status::internal("failed to encode response")
    })
}
