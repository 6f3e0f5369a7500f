//! Shared fixture table and typed surface for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use saurpc::{ProcedureFailure, ProcedureTable};

saurpc::call_surface! {
    /// Typed client for [`fixture_table`].
    pub struct FixtureCalls {
        "ping" => fn ping() -> String;
        "sayHelloTo" => fn say_hello_to(name: String) -> String;
        "add" => fn add(a: i64, b: i64) -> i64;
        "report" => fn report(score: i64, goal: i64, message: Option<String>) -> String;
        "slowDouble" => fn slow_double(n: i64) -> i64;
        "fail" => fn fail(reason: String) -> ();
        "notReal" => fn not_real(x: String) -> String;
    }
}

pub fn fixture_table() -> ProcedureTable {
    let mut table = ProcedureTable::new();
    table
        .register("ping", || "pong")
        .register("sayHelloTo", |name: String| format!("Hello, {name}"))
        .register("add", |a: i64, b: i64| a + b)
        .register("report", |score: i64, goal: i64, message: Option<String>| {
            let message = message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Thank you!".to_string());
            format!("Your score: {score} of {goal} -- {message}")
        })
        .register_async("slowDouble", |n: i64| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ProcedureFailure>(n * 2)
        })
        .try_register("fail", |reason: String| -> Result<(), ProcedureFailure> {
            Err(ProcedureFailure::new(reason))
        })
        .register("panics", || -> i64 { panic!("procedure exploded") })
        .register("echoArgs", |a: Option<serde_json::Value>, b: Option<serde_json::Value>| {
            serde_json::json!([a, b])
        });
    table
}
