//! The unit of work flowing through the pipeline
//!
//! Payloads are carried as `serde_json::Value` so redaction can operate on
//! field names without generated code. Metadata and extensions stay in the
//! `tonic::Request`/`tonic::Response` wrappers, exactly where a generated
//! service would see them.

use crate::context::{AuthContext, AuthContextExt};
use crate::method::MethodIdentity;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::fmt;
use tonic::metadata::AsciiMetadataValue;
use tonic::{Request, Response, Status};

/// One inbound RPC
#[derive(Debug)]
pub struct Call {
    pub method: MethodIdentity,

    /// Server-streaming call; also set by the pipeline from descriptors
    pub streaming: bool,

    pub request: Request<Value>,
}

impl Call {
    pub fn new(method: MethodIdentity, payload: Value) -> Self {
        Self {
            method,
            streaming: false,
            request: Request::new(payload),
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Attach `authorization: Bearer <token>`
    ///
    /// ## Errors
    ///
    /// `Status::invalid_argument` if the token is not valid ASCII metadata.
    pub fn with_bearer(mut self, token: &str) -> Result<Self, Status> {
        let value = AsciiMetadataValue::try_from(format!("Bearer {token}"))
            .map_err(|_| Status::invalid_argument("credential is not valid metadata"))?;
        self.request.metadata_mut().insert("authorization", value);
        Ok(self)
    }

    pub fn auth_context(&self) -> Option<&AuthContext> {
        self.request.auth_context()
    }

    pub fn payload(&self) -> &Value {
        self.request.get_ref()
    }
}

/// Response body of a call
pub enum ReplyBody {
    Message(Value),
    Stream(BoxStream<'static, Result<Value, Status>>),
}

impl ReplyBody {
    pub fn is_stream(&self) -> bool {
        matches!(self, ReplyBody::Stream(_))
    }

    /// The single message of a unary reply
    ///
    /// ## Errors
    ///
    /// `Status::internal` if the body is a stream.
    pub fn into_message(self) -> Result<Value, Status> {
        match self {
            ReplyBody::Message(value) => Ok(value),
            ReplyBody::Stream(_) => Err(Status::internal("expected a unary reply")),
        }
    }

    /// Drain the body; a unary reply yields one element
    pub async fn collect(self) -> Result<Vec<Value>, Status> {
        match self {
            ReplyBody::Message(value) => Ok(vec![value]),
            ReplyBody::Stream(stream) => stream.try_collect().await,
        }
    }

    /// Apply `f` to the message, or to every element of a stream
    pub fn map<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + 'static,
    {
        match self {
            ReplyBody::Message(value) => ReplyBody::Message(f(value)),
            ReplyBody::Stream(stream) => ReplyBody::Stream(stream.map_ok(f).boxed()),
        }
    }
}

impl fmt::Debug for ReplyBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyBody::Message(value) => f.debug_tuple("Message").field(value).finish(),
            ReplyBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

pub type Reply = Response<ReplyBody>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn id(s: &str) -> MethodIdentity {
        MethodIdentity::parse(s).unwrap()
    }

    #[test]
    fn test_call_with_bearer() {
        let call = Call::new(id("test.v1.Svc/Get"), json!({}))
            .with_bearer("abc.def.ghi")
            .unwrap();
        let auth = call.request.metadata().get("authorization").unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer abc.def.ghi");
        assert!(call.auth_context().is_none());
        assert!(!call.streaming);
    }

    #[tokio::test]
    async fn test_reply_body_map_and_collect() {
        let unary = ReplyBody::Message(json!(1)).map(|v| json!(v.as_i64().unwrap() + 1));
        assert_eq!(unary.collect().await.unwrap(), vec![json!(2)]);

        let streamed = ReplyBody::Stream(stream::iter(vec![Ok(json!(1)), Ok(json!(2))]).boxed())
            .map(|v| json!(v.as_i64().unwrap() * 10));
        assert!(streamed.is_stream());
        assert_eq!(streamed.collect().await.unwrap(), vec![json!(10), json!(20)]);
    }

    #[test]
    fn test_into_message_rejects_stream() {
        let body = ReplyBody::Stream(futures::stream::empty().boxed());
        assert_eq!(body.into_message().unwrap_err().code(), tonic::Code::Internal);
    }
}
