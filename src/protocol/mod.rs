pub mod args;
pub mod error;
pub mod exchange;
pub mod payload;

pub use args::{FromArgs, IntoArgs};
pub use error::{BoxError, ErrorBody, ErrorKind, ProcedureError, ProcedureFailure};
pub use exchange::{HttpRequest, HttpResponse};
pub use http::{HeaderMap, Method, StatusCode};
pub use payload::{CallPayload, ARGS_QUERY_KEY, ENVELOPE_QUERY_KEY};
