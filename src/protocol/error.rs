use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::CallPayload;

/// Boxed cause carried by a [`ProcedureError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Closed set of failure kinds.
///
/// The first three are produced by the serving side, the last two by the
/// calling side. The wire name of each kind is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or unparsable request body.
    #[serde(rename = "invalid_saurpc_payload")]
    InvalidPayload,
    /// Named procedure absent from the table.
    ProcedureNotFound,
    /// The target procedure itself failed.
    ExceptionThrown,
    /// Non-200 response carrying a server-classified failure.
    ServerError,
    /// Transport failure, malformed response, or any other client-side fault.
    ClientException,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "invalid_saurpc_payload",
            Self::ProcedureNotFound => "procedure_not_found",
            Self::ExceptionThrown => "exception_thrown",
            Self::ServerError => "server_error",
            Self::ClientException => "client_exception",
        }
    }

    /// Whether this kind is only ever produced by the calling side.
    pub fn is_client_side(&self) -> bool {
        matches!(self, Self::ServerError | Self::ClientException)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Wire error record
// ---------------------------------------------------------------------------

/// Error body sent with every non-200 response.
///
/// Older peers report the kind under `errorType`; both spellings decode, and
/// `type` wins when a record carries both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireErrorBody")]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Deserialize)]
struct WireErrorBody {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "errorType")]
    legacy_kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl TryFrom<WireErrorBody> for ErrorBody {
    type Error = String;

    fn try_from(wire: WireErrorBody) -> Result<Self, Self::Error> {
        let kind = wire
            .kind
            .or(wire.legacy_kind)
            .ok_or_else(|| "error record has neither `type` nor `errorType`".to_string())?;
        Ok(Self {
            message: wire.message,
            kind,
            data: wire.data,
        })
    }
}

// ---------------------------------------------------------------------------
// Failure raised by a procedure implementation
// ---------------------------------------------------------------------------

/// Failure returned by a procedure body or by its argument adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ProcedureFailure {
    message: String,
    data: Option<Value>,
}

impl ProcedureFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured context that is forwarded in the error body.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

impl From<String> for ProcedureFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProcedureFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for ProcedureFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("JSON error: {err}"))
    }
}

// ---------------------------------------------------------------------------
// Classified error
// ---------------------------------------------------------------------------

/// A classified RPC failure.
///
/// Built once at the point of failure through one of the kind-specific
/// constructors and never restructured afterwards.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProcedureError {
    kind: ErrorKind,
    message: String,
    data: Option<Value>,
    server_kind: Option<String>,
    #[source]
    cause: Option<BoxError>,
}

impl ProcedureError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            server_kind: None,
            cause: None,
        }
    }

    /// The body could not be decoded into a call. `raw` is the offending body.
    pub fn invalid_payload(message: impl Into<String>, raw: Value) -> Self {
        Self {
            data: Some(raw),
            ..Self::new(ErrorKind::InvalidPayload, message)
        }
    }

    pub fn procedure_not_found(payload: &CallPayload) -> Self {
        Self {
            data: Some(payload.to_value()),
            ..Self::new(
                ErrorKind::ProcedureNotFound,
                format!("No RPC with procedureName '{}'", payload.procedure_name),
            )
        }
    }

    /// The procedure failed. `context` identifies the call that was running.
    pub fn exception_thrown(
        message: impl Into<String>,
        context: Value,
        cause: Option<BoxError>,
    ) -> Self {
        Self {
            data: Some(context),
            cause,
            ..Self::new(ErrorKind::ExceptionThrown, message)
        }
    }

    /// Rebuild a server-reported failure from its wire record.
    pub fn server_error(status: u16, body: ErrorBody) -> Self {
        let message = if body.message.is_empty() {
            body.kind.clone()
        } else {
            body.message.clone()
        };
        let data = serde_json::json!({
            "status": status,
            "error": {
                "message": body.message,
                "type": body.kind,
                "data": body.data,
            },
        });
        Self {
            data: Some(data),
            server_kind: Some(body.kind),
            ..Self::new(ErrorKind::ServerError, message)
        }
    }

    pub fn client_exception(
        message: impl Into<String>,
        response: Option<Value>,
        cause: Option<BoxError>,
    ) -> Self {
        Self {
            data: response,
            cause,
            ..Self::new(ErrorKind::ClientException, message)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Kind reported by the server, for [`ErrorKind::ServerError`] only.
    pub fn server_kind(&self) -> Option<&str> {
        self.server_kind.as_deref()
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Classify for a caller.
    ///
    /// Client-side kinds pass through untouched; anything else is wrapped
    /// into a single [`ErrorKind::ClientException`]. Applying this twice is
    /// the same as applying it once.
    pub fn into_client_error(self) -> Self {
        if self.kind.is_client_side() {
            return self;
        }
        let message = format!("Unexpected {} outside a response: {}", self.kind, self.message);
        Self::client_exception(message, None, Some(Box::new(self)))
    }

    /// Wire record for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.message.clone(),
            kind: self.kind.as_str().to_string(),
            data: self.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_wire_names_are_stable() {
        for kind in [
            ErrorKind::InvalidPayload,
            ErrorKind::ProcedureNotFound,
            ErrorKind::ExceptionThrown,
            ErrorKind::ServerError,
            ErrorKind::ClientException,
        ] {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, json!(kind.as_str()));
        }
    }

    #[test]
    fn not_found_carries_payload() {
        let payload = CallPayload::new("notReal", vec![json!("x")]);
        let err = ProcedureError::procedure_not_found(&payload);
        assert_eq!(err.kind(), ErrorKind::ProcedureNotFound);
        assert_eq!(err.message(), "No RPC with procedureName 'notReal'");
        assert_eq!(err.data().unwrap()["procedureName"], "notReal");
    }

    #[test]
    fn server_error_falls_back_to_kind_for_empty_message() {
        let err = ProcedureError::server_error(
            500,
            ErrorBody {
                message: String::new(),
                kind: "exception_thrown".into(),
                data: None,
            },
        );
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert_eq!(err.message(), "exception_thrown");
        assert_eq!(err.server_kind(), Some("exception_thrown"));
        assert_eq!(err.data().unwrap()["status"], 500);
    }

    #[test]
    fn server_error_is_not_rewrapped() {
        let body = ErrorBody {
            message: "No RPC with procedureName 'x'".into(),
            kind: "procedure_not_found".into(),
            data: None,
        };
        let err = ProcedureError::server_error(404, body).into_client_error();
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.cause().is_none());
    }

    #[test]
    fn server_side_kinds_are_wrapped_exactly_once() {
        let err = ProcedureError::exception_thrown("boom", json!({}), None);
        let once = err.into_client_error();
        assert_eq!(once.kind(), ErrorKind::ClientException);

        let twice = once.into_client_error();
        assert_eq!(twice.kind(), ErrorKind::ClientException);
        let inner = twice.cause().unwrap().downcast_ref::<ProcedureError>().unwrap();
        assert_eq!(inner.kind(), ErrorKind::ExceptionThrown);
    }

    #[test]
    fn body_accepts_legacy_error_type_field() {
        let body: ErrorBody =
            serde_json::from_value(json!({"message": "m", "errorType": "server_error"})).unwrap();
        assert_eq!(body.kind, "server_error");
        assert!(body.data.is_none());
    }

    #[test]
    fn body_with_both_kind_fields_prefers_type() {
        let body: ErrorBody = serde_json::from_value(json!({
            "message": "m",
            "type": "exception_thrown",
            "errorType": "server_error",
        }))
        .unwrap();
        assert_eq!(body.kind, "exception_thrown");

        let missing = serde_json::from_value::<ErrorBody>(json!({"message": "m"}));
        assert!(missing.is_err());
    }

    #[test]
    fn display_prefixes_kind() {
        let err = ProcedureError::invalid_payload("bad body", Value::Null);
        assert_eq!(err.to_string(), "invalid_saurpc_payload: bad body");
    }
}
