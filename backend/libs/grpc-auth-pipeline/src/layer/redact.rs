//! Redaction layer
//!
//! Strips sensitive fields from responses (and, where the method asks for
//! it, from the request before the handler sees it). Only methods marked
//! `uses_sensitive_data` in their descriptor are touched.

use super::LayerFuture;
use crate::call::{Call, Reply, ReplyBody};
use crate::descriptor::DescriptorRegistry;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::{Response, Status};
use tower::{Layer, Service};
use tracing::trace;

#[derive(Clone)]
pub struct RedactionLayer {
    descriptors: Arc<DescriptorRegistry>,
    skip_streaming: bool,
}

impl RedactionLayer {
    /// With `skip_streaming`, server-streaming calls are passed through as is;
    /// otherwise every streamed element is redacted
    pub fn new(descriptors: Arc<DescriptorRegistry>, skip_streaming: bool) -> Self {
        Self {
            descriptors,
            skip_streaming,
        }
    }
}

impl<S> Layer<S> for RedactionLayer {
    type Service = RedactionService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RedactionService {
            inner: service,
            descriptors: self.descriptors.clone(),
            skip_streaming: self.skip_streaming,
        }
    }
}

#[derive(Clone)]
pub struct RedactionService<S> {
    inner: S,
    descriptors: Arc<DescriptorRegistry>,
    skip_streaming: bool,
}

impl<S> Service<Call> for RedactionService<S>
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
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(plan) = self.descriptors.redaction(&call.method).cloned() else {
            return Box::pin(async move { inner.call(call).await });
        };

        let redactor = self.descriptors.redactor().clone();
        if let Some(message) = &plan.request {
            if !(self.skip_streaming && call.streaming) {
                trace!(method = %call.method, message = %message, "redacting request");
                redactor.redact(message, call.request.get_mut());
            }
        }

        let skip_streaming = self.skip_streaming;
        Box::pin(async move {
            let reply = inner.call(call).await?;

            let Some(message) = plan.response else {
                return Ok(reply);
            };

            let (metadata, body, extensions) = reply.into_parts();
            // a single message is always redacted, whatever the call claimed
            let body = match body {
                ReplyBody::Stream(stream) if skip_streaming => ReplyBody::Stream(stream),
                body => body.map(move |value| redactor.redacted(&message, value)),
            };
            Ok(Response::from_parts(metadata, body, extensions))
        })
    }
}
