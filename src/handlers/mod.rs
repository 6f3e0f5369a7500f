pub mod dispatch;
pub mod manifest;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::{ServerConfig, DEFAULT_MAX_BODY_BYTES};
use crate::procedures::ProcedureTable;
use crate::protocol::payload;
use crate::protocol::{ErrorKind, HttpRequest, HttpResponse, Method, ProcedureError, StatusCode};

/// Request handler backed by a procedure table.
///
/// Mountable on any server that can hand it an [`HttpRequest`]; the bundled
/// listener in [`crate::server`] is one such server, the in-process client
/// transport is another.
#[derive(Debug, Clone)]
pub struct RpcHandler {
    table: Arc<ProcedureTable>,
    call_timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl RpcHandler {
    /// Handler with no call timeout and the default body limit.
    pub fn new(table: Arc<ProcedureTable>) -> Self {
        Self {
            table,
            call_timeout: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(table: Arc<ProcedureTable>, config: &ServerConfig) -> Self {
        Self {
            table,
            call_timeout: Some(config.call_timeout),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn table(&self) -> &ProcedureTable {
        &self.table
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Answer one request.
    ///
    /// `POST` runs a call, `GET` describes the table, anything else is
    /// rejected. Failures become a JSON error body with a non-200 status.
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        if request.method == Method::GET {
            return manifest::handle(&self.table);
        }
        if request.method != Method::POST {
            let err = ProcedureError::invalid_payload(
                format!("Unsupported method {}; calls must use POST", request.method),
                Value::Null,
            );
            return error_response(StatusCode::METHOD_NOT_ALLOWED, &err);
        }

        if request.body.len() > self.max_body_bytes {
            return self.reject_oversized(request.body.len());
        }

        match self.call(&request).await {
            Ok(value) => HttpResponse::json(StatusCode::OK, &value),
            Err(err) => error_response(status_for(err.kind()), &err),
        }
    }

    /// Decode and dispatch a `POST` body, returning the raw result.
    pub async fn call(&self, request: &HttpRequest) -> Result<Value, ProcedureError> {
        let name = payload::name_from_url(&request.url);
        let call = payload::decode_bytes(&request.body, name.as_deref())?;
        tracing::debug!(
            procedure = %call.procedure_name,
            args = call.args.len(),
            "dispatching call"
        );
        dispatch::dispatch(&self.table, call, self.call_timeout).await
    }

    /// Response for a body larger than the configured limit.
    pub fn reject_oversized(&self, length: usize) -> HttpResponse {
        let err = ProcedureError::invalid_payload(
            format!(
                "Request body of {length} bytes exceeds the limit of {} bytes",
                self.max_body_bytes
            ),
            serde_json::json!({ "bytes": length, "limit": self.max_body_bytes }),
        );
        error_response(StatusCode::PAYLOAD_TOO_LARGE, &err)
    }
}

/// HTTP status for a server-side error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidPayload => StatusCode::BAD_REQUEST,
        ErrorKind::ProcedureNotFound => StatusCode::NOT_FOUND,
        ErrorKind::ExceptionThrown => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::ServerError | ErrorKind::ClientException => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serialize a classified error as a response.
pub fn error_response(status: StatusCode, err: &ProcedureError) -> HttpResponse {
    tracing::warn!(kind = %err.kind(), status = status.as_u16(), "{}", err.message());
    let body = serde_json::to_value(err.to_body()).unwrap_or_else(|_| {
        serde_json::json!({ "message": err.message(), "type": err.kind().as_str() })
    });
    HttpResponse::json(status, &body)
}
