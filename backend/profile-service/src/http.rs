//! JSON-over-HTTP adapter
//!
//! `POST /<package>.<service>/<method>` with a JSON body becomes one pipeline
//! call. The `authorization` header is passed through as call metadata.
//! Unary replies are JSON; server-streaming replies are newline-delimited
//! JSON. Failures are `{"code": "...", "message": "..."}` with an HTTP status
//! derived from the gRPC code.

use actix_web::http::header::AUTHORIZATION;
use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use futures::StreamExt;
use grpc_auth_pipeline::{Call, MethodIdentity, Pipeline, ReplyBody};
use serde_json::{json, Value};
use tonic::metadata::AsciiMetadataValue;
use tonic::{Code, Status};
use tracing::debug;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/{service}/{method}", web::post().to(invoke));
}

async fn invoke(
    pipeline: web::Data<Pipeline>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
    body: Bytes,
) -> HttpResponse {
    let (service, method) = path.into_inner();
    match into_call(&service, &method, &req, &body) {
        Ok(call) => respond(pipeline.handle(call).await),
        Err(status) => error_response(&status),
    }
}

fn into_call(service: &str, method: &str, req: &HttpRequest, body: &[u8]) -> Result<Call, Status> {
    let method = MethodIdentity::parse(&format!("{service}/{method}"))
        .map_err(|_| Status::unimplemented("unknown method"))?;

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        serde_json::from_slice::<Value>(body)
            .map_err(|e| Status::invalid_argument(format!("invalid JSON body: {e}")))?
    };

    let mut call = Call::new(method, payload);
    if let Some(value) = req.headers().get(AUTHORIZATION) {
        let value = AsciiMetadataValue::try_from(value.as_bytes())
            .map_err(|_| Status::unauthenticated("invalid credential"))?;
        call.request.metadata_mut().insert("authorization", value);
    }

    debug!(method = %call.method, "dispatching call");
    Ok(call)
}

fn respond(result: Result<grpc_auth_pipeline::Reply, Status>) -> HttpResponse {
    let body = match result {
        Ok(reply) => reply.into_inner(),
        Err(status) => return error_response(&status),
    };

    match body {
        ReplyBody::Message(value) => HttpResponse::Ok().json(value),
        ReplyBody::Stream(stream) => {
            let lines = stream.map(|item| {
                let line = match item {
                    Ok(value) => value,
                    Err(status) => json!({ "error": error_body(&status) }),
                };
                Ok::<_, std::convert::Infallible>(Bytes::from(format!("{line}\n")))
            });
            HttpResponse::Ok()
                .content_type("application/x-ndjson")
                .streaming(lines)
        }
    }
}

/// HTTP status for a gRPC code
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unimplemented | Code::NotFound => StatusCode::NOT_FOUND,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// snake_case name of a gRPC code
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "cancelled",
        Code::Unknown => "unknown",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
    }
}

fn error_body(status: &Status) -> Value {
    json!({
        "code": code_name(status.code()),
        "message": status.message(),
    })
}

fn error_response(status: &Status) -> HttpResponse {
    HttpResponse::build(http_status(status.code())).json(error_body(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(http_status(Code::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(http_status(Code::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(http_status(Code::Unimplemented), StatusCode::NOT_FOUND);
        assert_eq!(http_status(Code::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(http_status(Code::Unavailable), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_body() {
        let body = error_body(&Status::permission_denied("insufficient role"));
        assert_eq!(
            body,
            json!({ "code": "permission_denied", "message": "insufficient role" })
        );
    }
}
