//! Calling side: request building, response interpretation, call surfaces.

pub mod request;
pub mod response;
pub mod surface;

use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::handlers::RpcHandler;
use crate::procedures::ProcedureTable;
use crate::protocol::{HeaderMap, IntoArgs, ProcedureError, ARGS_QUERY_KEY, ENVELOPE_QUERY_KEY};
use crate::transport::{HttpTransport, LocalTransport, Transport, TransportError};

pub use surface::{BoundCall, CallSite};

/// Endpoint used by in-process clients.
pub const LOCAL_ENDPOINT: &str = "http://localhost/";

/// Body layout of outgoing calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadShape {
    /// `{"procedureName", "args"}`, name mirrored as `_saurpc`.
    #[default]
    Envelope,
    /// Bare argument array, name carried only as `rpc`.
    BareArgs,
}

impl PayloadShape {
    pub fn query_key(self) -> &'static str {
        match self {
            Self::Envelope => ENVELOPE_QUERY_KEY,
            Self::BareArgs => ARGS_QUERY_KEY,
        }
    }
}

/// Per-client transport options applied to every call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Extra headers; `content-type` is always forced to JSON.
    pub headers: HeaderMap,
    pub shape: PayloadShape,
    /// Upper bound for one exchange. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Client bound to one endpoint and transport.
///
/// Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct Client {
    endpoint: Arc<str>,
    options: Arc<CallOptions>,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(endpoint: &str, transport: impl Transport) -> Self {
        Self {
            endpoint: Arc::from(endpoint),
            options: Arc::new(CallOptions::default()),
            transport: Arc::new(transport),
        }
    }

    /// Client that calls a host over HTTP.
    pub fn remote(endpoint: &str) -> Self {
        Self::new(endpoint, HttpTransport::new())
    }

    /// Client that calls `table` in-process.
    pub fn local(table: Arc<ProcedureTable>) -> Self {
        Self::local_with(RpcHandler::new(table))
    }

    /// Client that calls an existing handler in-process.
    pub fn local_with(handler: RpcHandler) -> Self {
        Self::new(LOCAL_ENDPOINT, LocalTransport::new(handler))
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Call `procedure_name` with positional JSON arguments.
    pub async fn call(
        &self,
        procedure_name: &str,
        args: Vec<Value>,
    ) -> Result<Value, ProcedureError> {
        self.exchange(procedure_name, &args)
            .await
            .map_err(ProcedureError::into_client_error)
    }

    /// Call with typed arguments and decode the result into `R`.
    ///
    /// A result that does not decode as `R` is a `client_exception` whose data
    /// is the raw result.
    pub async fn call_typed<A, R>(
        &self,
        procedure_name: &str,
        args: A,
    ) -> Result<R, ProcedureError>
    where
        A: IntoArgs,
        R: DeserializeOwned,
    {
        let args = args.into_args().map_err(|e| {
            ProcedureError::client_exception(
                format!("Arguments for '{procedure_name}' are not representable as JSON: {e}"),
                None,
                Some(Box::new(e)),
            )
        })?;
        let value = self.call(procedure_name, args).await?;
        serde_json::from_value(value.clone()).map_err(|e| {
            ProcedureError::client_exception(
                format!("Result of '{procedure_name}' does not match the declared type: {e}"),
                Some(value),
                Some(Box::new(e)),
            )
        })
    }

    async fn exchange(
        &self,
        procedure_name: &str,
        args: &[Value],
    ) -> Result<Value, ProcedureError> {
        let request = request::build(&self.endpoint, procedure_name, args, &self.options)?;
        tracing::debug!(procedure = procedure_name, url = %request.url, "sending call");

        let sent = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                .await
                .unwrap_or(Err(TransportError::Timeout(limit))),
            None => self.transport.send(request).await,
        };
        let response = sent.map_err(|e| {
            ProcedureError::client_exception(
                format!("Transport failed: {e}"),
                None,
                Some(Box::new(e)),
            )
        })?;

        response::interpret(&response)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
