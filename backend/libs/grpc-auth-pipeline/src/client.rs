//! Client-side bearer interceptor
//!
//! Attaches `authorization: Bearer <token>` to every outgoing request. Used
//! when a service calls another one on behalf of its caller.

use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Injects a bearer credential into gRPC metadata
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_auth_pipeline::BearerInterceptor;
/// use tonic::transport::Channel;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let interceptor = BearerInterceptor::new("eyJhbGc...")?;
///
/// let channel = Channel::from_static("http://[::1]:50051")
///     .connect()
///     .await?;
///
/// // let mut client = SomeServiceClient::with_interceptor(channel, interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct BearerInterceptor {
    /// Pre-formatted `Bearer <token>`, parsed once
    auth_header: AsciiMetadataValue,
}

impl BearerInterceptor {
    /// ## Errors
    ///
    /// `Status::invalid_argument` if the token is not valid ASCII metadata.
    pub fn new(token: impl AsRef<str>) -> Result<Self, Status> {
        let auth_header = AsciiMetadataValue::try_from(format!("Bearer {}", token.as_ref()))
            .map_err(|_| Status::invalid_argument("credential is not valid metadata"))?;

        Ok(Self { auth_header })
    }

    /// Reuse an already parsed header value
    pub fn from_header(auth_header: AsciiMetadataValue) -> Self {
        Self { auth_header }
    }

    /// Forward the caller's credential from an incoming request
    ///
    /// Returns `None` when the incoming call carried no `authorization` value.
    pub fn forward(metadata: &MetadataMap) -> Option<Self> {
        metadata.get("authorization").cloned().map(Self::from_header)
    }
}

impl Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert("authorization", self.auth_header.clone());

        Ok(request)
    }
}
