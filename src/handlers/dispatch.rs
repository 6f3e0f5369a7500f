use std::any::Any;
use std::time::Duration;

use serde_json::Value;

use crate::procedures::ProcedureTable;
use crate::protocol::{CallPayload, ProcedureError};

/// Run a decoded call against a table.
///
/// The procedure runs on its own task, so a panic inside it is reported as
/// `exception_thrown` instead of unwinding into the caller. The result is
/// returned as-is; no shape checks are applied here.
pub async fn dispatch(
    table: &ProcedureTable,
    payload: CallPayload,
    timeout: Option<Duration>,
) -> Result<Value, ProcedureError> {
    let Some(procedure) = table.get(&payload.procedure_name) else {
        return Err(ProcedureError::procedure_not_found(&payload));
    };

    let request = payload.to_value();
    let args = payload.args;
    let mut task = tokio::spawn(async move { procedure.call(args).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(ProcedureError::exception_thrown(
                    format!("Procedure timed out after {} ms", limit.as_millis()),
                    serde_json::json!({ "request": request }),
                    None,
                ));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => {
            let mut context = serde_json::json!({
                "request": request,
                "error": failure.message(),
            });
            if let Some(data) = failure.data() {
                context["data"] = data.clone();
            }
            Err(ProcedureError::exception_thrown(
                failure.message().to_string(),
                context,
                Some(Box::new(failure)),
            ))
        }
        Err(join_err) => {
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "Procedure task was cancelled".to_string()
            };
            Err(ProcedureError::exception_thrown(
                message.clone(),
                serde_json::json!({ "request": request, "error": message }),
                None,
            ))
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Procedure panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Procedure panicked: {s}")
    } else {
        "Procedure panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorKind, ProcedureFailure};
    use serde_json::json;

    fn table() -> ProcedureTable {
        let mut table = ProcedureTable::new();
        table
            .register("add", |a: i64, b: i64| a + b)
            .try_register("fail", || -> Result<(), ProcedureFailure> {
                Err(ProcedureFailure::new("nope").with_data(json!({"code": 7})))
            })
            .register("boom", || -> i64 { panic!("kaboom") })
            .register_async("sleepy", |ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, ProcedureFailure>(ms)
            });
        table
    }

    #[tokio::test]
    async fn returns_raw_result() {
        let value = dispatch(&table(), CallPayload::new("add", vec![json!(3), json!(4)]), None)
            .await
            .unwrap();
        assert_eq!(value, json!(7));
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let err = dispatch(&table(), CallPayload::new("notReal", vec![json!("x")]), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcedureNotFound);
        assert_eq!(err.data().unwrap()["args"], json!(["x"]));
    }

    #[tokio::test]
    async fn failure_becomes_exception_thrown_with_cause() {
        let err = dispatch(&table(), CallPayload::new("fail", vec![]), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceptionThrown);
        assert_eq!(err.message(), "nope");
        let data = err.data().unwrap();
        assert_eq!(data["request"]["procedureName"], "fail");
        assert_eq!(data["data"], json!({"code": 7}));
        let cause = err.cause().unwrap().downcast_ref::<ProcedureFailure>().unwrap();
        assert_eq!(cause.message(), "nope");
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let err = dispatch(&table(), CallPayload::new("boom", vec![]), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceptionThrown);
        assert_eq!(err.message(), "Procedure panicked: kaboom");
    }

    #[tokio::test]
    async fn timeout_is_exception_thrown() {
        let err = dispatch(
            &table(),
            CallPayload::new("sleepy", vec![json!(5_000)]),
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceptionThrown);
        assert!(err.message().contains("timed out"));
    }

    #[tokio::test]
    async fn arity_mismatch_fails_naturally() {
        let err = dispatch(&table(), CallPayload::new("add", vec![json!(1)]), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceptionThrown);

        let err = dispatch(
            &table(),
            CallPayload::new("add", vec![json!(1), json!(2), json!(3)]),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExceptionThrown);
    }
}
