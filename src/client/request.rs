use http::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use url::{Position, Url};

use super::{CallOptions, PayloadShape};
use crate::protocol::payload;
use crate::protocol::{HttpRequest, Method, ProcedureError};

/// Base used to place relative endpoints such as `/rpc`.
const RELATIVE_BASE: &str = "http://localhost/";

/// Build the transport request for one call.
///
/// The body is the `{procedureName, args}` envelope (or the bare argument
/// array for [`PayloadShape::BareArgs`]); the procedure name is mirrored into
/// the URL query. `options` is left untouched. A caller-supplied
/// `content-type` is replaced.
pub fn build(
    endpoint: &str,
    procedure_name: &str,
    args: &[Value],
    options: &CallOptions,
) -> Result<HttpRequest, ProcedureError> {
    let url = with_query(endpoint, options.shape.query_key(), procedure_name).map_err(|e| {
        ProcedureError::client_exception(
            format!("Invalid endpoint '{endpoint}': {e}"),
            None,
            Some(Box::new(e)),
        )
    })?;

    let body = match options.shape {
        PayloadShape::Envelope => payload::encode(procedure_name, args),
        PayloadShape::BareArgs => Value::Array(args.to_vec()),
    };

    let mut headers = options.headers.clone();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Ok(HttpRequest {
        method: Method::POST,
        url,
        headers,
        body: body.to_string().into_bytes(),
    })
}

/// Set `key=value` in the query of `endpoint`, replacing earlier values.
///
/// Relative endpoints stay relative.
fn with_query(endpoint: &str, key: &str, value: &str) -> Result<String, url::ParseError> {
    let (mut url, relative) = match Url::parse(endpoint) {
        Ok(url) => (url, false),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            (Url::parse(RELATIVE_BASE)?.join(endpoint)?, true)
        }
        Err(e) => return Err(e),
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);

    if relative {
        Ok(url[Position::BeforePath..].to_string())
    } else {
        Ok(url.into())
    }
}
