use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::error::ProcedureError;

/// Query parameter mirroring the procedure name of an envelope body.
pub const ENVELOPE_QUERY_KEY: &str = "_saurpc";

/// Query parameter naming the procedure of a bare-array body.
pub const ARGS_QUERY_KEY: &str = "rpc";

/// Base used to resolve origin-form request targets such as `/?rpc=add`.
const RELATIVE_BASE: &str = "http://localhost/";

/// Decoded call: which procedure to run and with what arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPayload {
    #[serde(rename = "procedureName")]
    pub procedure_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallPayload {
    pub fn new(procedure_name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            procedure_name: procedure_name.into(),
            args,
        }
    }

    pub fn to_value(&self) -> Value {
        encode(&self.procedure_name, &self.args)
    }
}

/// Encode a call as the `{procedureName, args}` envelope.
pub fn encode(procedure_name: &str, args: &[Value]) -> Value {
    serde_json::json!({
        "procedureName": procedure_name,
        "args": args,
    })
}

/// Decode a JSON body into a call.
///
/// Two shapes are accepted: the `{procedureName, args}` envelope, and a bare
/// array of arguments whose procedure name arrives out-of-band (a query
/// parameter). An envelope without `procedureName` also falls back to the
/// out-of-band name.
pub fn decode(body: Value, out_of_band_name: Option<&str>) -> Result<CallPayload, ProcedureError> {
    let fallback = out_of_band_name.filter(|name| !name.is_empty());

    match body {
        Value::Array(args) => match fallback {
            Some(name) => Ok(CallPayload::new(name, args)),
            None => Err(ProcedureError::invalid_payload(
                format!("Missing '{ARGS_QUERY_KEY}' query parameter for an array body"),
                Value::Array(args),
            )),
        },
        Value::Object(map) => {
            let procedure_name = match (map.get("procedureName"), fallback) {
                (Some(Value::String(name)), _) if !name.is_empty() => name.clone(),
                (None, Some(name)) => name.to_string(),
                _ => {
                    return Err(ProcedureError::invalid_payload(
                        "Could not parse procedureName string from JSON body of type 'object'",
                        Value::Object(map),
                    ));
                }
            };

            let args = match map.get("args") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(args)) => args.clone(),
                Some(_) => {
                    return Err(ProcedureError::invalid_payload(
                        "Could not parse args array from JSON body of type 'object'",
                        Value::Object(map),
                    ));
                }
            };

            Ok(CallPayload {
                procedure_name,
                args,
            })
        }
        other => Err(ProcedureError::invalid_payload(
            "JSON body was neither an object nor an array",
            other,
        )),
    }
}

/// Decode raw body bytes. Bytes that are not JSON are an invalid payload.
pub fn decode_bytes(
    body: &[u8],
    out_of_band_name: Option<&str>,
) -> Result<CallPayload, ProcedureError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ProcedureError::invalid_payload(
            format!("Could not parse request body as JSON: {e}"),
            Value::String(String::from_utf8_lossy(body).into_owned()),
        )
    })?;
    decode(value, out_of_band_name)
}

/// Procedure name mirrored into a request URL, if any.
///
/// Accepts absolute URLs and origin-form targets. `rpc` wins over `_saurpc`
/// when both are present; empty values are ignored.
pub fn name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(url)))
        .ok()?;

    let mut envelope_name = None;
    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        if key == ARGS_QUERY_KEY {
            return Some(value.into_owned());
        }
        if key == ENVELOPE_QUERY_KEY && envelope_name.is_none() {
            envelope_name = Some(value.into_owned());
        }
    }
    envelope_name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;
    use serde_json::json;

    #[test]
    fn decodes_envelope() {
        let payload = decode(json!({"procedureName": "add", "args": [3, 4]}), None).unwrap();
        assert_eq!(payload, CallPayload::new("add", vec![json!(3), json!(4)]));
    }

    #[test]
    fn envelope_without_args_is_empty_call() {
        let payload = decode(json!({"procedureName": "ping"}), None).unwrap();
        assert!(payload.args.is_empty());
    }

    #[test]
    fn bare_array_uses_out_of_band_name() {
        let payload = decode(json!(["World"]), Some("sayHelloTo")).unwrap();
        assert_eq!(payload.procedure_name, "sayHelloTo");
        assert_eq!(payload.args, vec![json!("World")]);
    }

    #[test]
    fn bare_array_without_name_is_invalid() {
        let err = decode(json!([1, 2]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
        assert_eq!(err.data(), Some(&json!([1, 2])));

        let err = decode(json!([1, 2]), Some("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
    }

    #[test]
    fn rejects_structural_mismatches() {
        for body in [
            json!({"procedureName": 42, "args": []}),
            json!({"procedureName": "", "args": []}),
            json!({"procedureName": "add", "args": {"a": 1}}),
            json!({"args": [1]}),
            json!("add"),
            json!(17),
            json!(null),
        ] {
            let err = decode(body.clone(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPayload, "body: {body}");
            assert_eq!(err.data(), Some(&body));
        }
    }

    #[test]
    fn object_without_name_falls_back_to_query() {
        let payload = decode(json!({"args": [1]}), Some("echo")).unwrap();
        assert_eq!(payload.procedure_name, "echo");
    }

    #[test]
    fn non_json_bytes_are_invalid() {
        let err = decode_bytes(b"not json {", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
        assert_eq!(err.data(), Some(&json!("not json {")));
    }

    #[test]
    fn encode_matches_wire_shape() {
        let encoded = encode("add", &[json!(3), json!(4)]);
        assert_eq!(encoded, json!({"procedureName": "add", "args": [3, 4]}));
        let decoded = decode(encoded, None).unwrap();
        assert_eq!(decoded.to_value(), json!({"procedureName": "add", "args": [3, 4]}));
    }

    #[test]
    fn reads_name_from_query() {
        assert_eq!(name_from_url("http://h:1/?_saurpc=add").as_deref(), Some("add"));
        assert_eq!(name_from_url("/rpc?rpc=ping").as_deref(), Some("ping"));
        assert_eq!(
            name_from_url("/?_saurpc=a&rpc=b").as_deref(),
            Some("b"),
            "rpc wins over _saurpc"
        );
        assert_eq!(name_from_url("/?x=1"), None);
        assert_eq!(name_from_url("/?rpc=say%20hi").as_deref(), Some("say hi"));
    }

    #[test]
    fn empty_query_value_does_not_hide_the_other_key() {
        assert_eq!(name_from_url("/?rpc=&_saurpc=add").as_deref(), Some("add"));
        assert_eq!(name_from_url("/?_saurpc=&rpc=ping").as_deref(), Some("ping"));
        assert_eq!(name_from_url("/?rpc=&_saurpc="), None);

        let payload = decode_bytes(b"[3, 4]", name_from_url("/?rpc=&_saurpc=add").as_deref());
        assert_eq!(payload.unwrap().procedure_name, "add");
    }
}
