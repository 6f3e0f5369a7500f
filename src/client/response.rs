use serde_json::Value;

use crate::protocol::{ErrorBody, HttpResponse, ProcedureError};
use crate::schema;

/// Turn a response into the call's result or a classified error.
///
/// - 200: the parsed body is the result, unmodified
/// - other statuses: the body must be a wire error record and becomes a
///   `server_error`; a body of any other shape is a `client_exception`
/// - an unparsable body is a `client_exception` carrying the raw response
pub fn interpret(response: &HttpResponse) -> Result<Value, ProcedureError> {
    let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
        ProcedureError::client_exception(
            format!("Could not parse response body as JSON: {e}"),
            Some(raw_response(response)),
            Some(Box::new(e)),
        )
    })?;

    if response.is_success() {
        return Ok(body);
    }

    if let Err(e) = schema::validate_error_body(&body) {
        return Err(ProcedureError::client_exception(
            format!(
                "Status {} with a body that is not an error record",
                response.status.as_u16()
            ),
            Some(raw_response(response)),
            Some(Box::new(e)),
        ));
    }

    let record: ErrorBody = serde_json::from_value(body).map_err(|e| {
        ProcedureError::client_exception(
            format!("Could not decode error record: {e}"),
            Some(raw_response(response)),
            Some(Box::new(e)),
        )
    })?;
    Err(ProcedureError::server_error(response.status.as_u16(), record))
}

/// Diagnostic snapshot of a response for error data.
pub fn raw_response(response: &HttpResponse) -> Value {
    let headers: serde_json::Map<String, Value> = response
        .headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    serde_json::json!({
        "status": response.status.as_u16(),
        "headers": headers,
        "body": String::from_utf8_lossy(&response.body),
    })
}
