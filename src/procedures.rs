//! Procedure table: the serving side's registry of named procedures.
//!
//! Each entry is a boxed [`Procedure`] whose argument and return shapes are
//! fixed at compile time by the closure it was registered from.
//!
//! ```ignore
//! let mut table = ProcedureTable::new();
//! table
//!     .register("add", |a: i64, b: i64| a + b)
//!     .register("sayHelloTo", |name: String| format!("Hello, {name}"));
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::protocol::{FromArgs, ProcedureFailure};

/// Boxed future returned by procedures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one procedure invocation.
pub type ProcedureResult = Result<Value, ProcedureFailure>;

/// A callable taking positional JSON arguments.
pub trait Procedure: Send + Sync + 'static {
    /// Declared parameter count.
    fn arity(&self) -> usize;

    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, ProcedureResult>;
}

/// A function callable with a tuple of its parameters.
pub trait Handler<Args, Out>: Send + Sync + 'static {
    fn invoke(&self, args: Args) -> Out;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<Func, Out, $($ty,)*> Handler<($($ty,)*), Out> for Func
        where
            Func: Fn($($ty),*) -> Out + Send + Sync + 'static,
        {
            #[allow(non_snake_case)]
            fn invoke(&self, ($($ty,)*): ($($ty,)*)) -> Out {
                (self)($($ty),*)
            }
        }
    };
}

impl_handler!();
impl_handler!(A);
impl_handler!(A, B);
impl_handler!(A, B, C);
impl_handler!(A, B, C, D);
impl_handler!(A, B, C, D, E);
impl_handler!(A, B, C, D, E, F);

// ---------------------------------------------------------------------------
// Adapters from typed functions to `Procedure`
// ---------------------------------------------------------------------------

struct Infallible<Func, A, R> {
    func: Func,
    _marker: PhantomData<fn(A) -> R>,
}

impl<Func, A, R> Procedure for Infallible<Func, A, R>
where
    Func: Handler<A, R>,
    A: FromArgs + 'static,
    R: Serialize + 'static,
{
    fn arity(&self) -> usize {
        A::ARITY
    }

    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, ProcedureResult> {
        let outcome = A::from_args(args)
            .and_then(|args| Ok(serde_json::to_value(self.func.invoke(args))?));
        Box::pin(std::future::ready(outcome))
    }
}

struct Fallible<Func, A, R, E> {
    func: Func,
    _marker: PhantomData<fn(A) -> Result<R, E>>,
}

impl<Func, A, R, E> Procedure for Fallible<Func, A, R, E>
where
    Func: Handler<A, Result<R, E>>,
    A: FromArgs + 'static,
    R: Serialize + 'static,
    E: Into<ProcedureFailure> + 'static,
{
    fn arity(&self) -> usize {
        A::ARITY
    }

    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, ProcedureResult> {
        let outcome = A::from_args(args).and_then(|args| {
            let value = self.func.invoke(args).map_err(Into::<ProcedureFailure>::into)?;
            Ok(serde_json::to_value(value)?)
        });
        Box::pin(std::future::ready(outcome))
    }
}

struct Deferred<Func, A, Fut, R, E> {
    func: Func,
    _marker: PhantomData<fn(A) -> (Fut, R, E)>,
}

impl<Func, A, Fut, R, E> Procedure for Deferred<Func, A, Fut, R, E>
where
    Func: Handler<A, Fut>,
    A: FromArgs + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<ProcedureFailure> + Send + 'static,
{
    fn arity(&self) -> usize {
        A::ARITY
    }

    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, ProcedureResult> {
        let fut = match A::from_args(args) {
            Ok(args) => self.func.invoke(args),
            Err(failure) => return Box::pin(std::future::ready(Err(failure))),
        };
        Box::pin(async move {
            let value = fut.await.map_err(Into::<ProcedureFailure>::into)?;
            serde_json::to_value(value).map_err(ProcedureFailure::from)
        })
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Registry mapping procedure names to procedures.
///
/// Built once at setup, then shared read-only (usually behind an `Arc`).
#[derive(Default, Clone)]
pub struct ProcedureTable {
    procedures: BTreeMap<String, Arc<dyn Procedure>>,
}

impl ProcedureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous procedure that cannot fail.
    pub fn register<Func, A, R>(&mut self, name: &str, func: Func) -> &mut Self
    where
        Func: Handler<A, R>,
        A: FromArgs + 'static,
        R: Serialize + 'static,
    {
        self.insert(
            name,
            Infallible {
                func,
                _marker: PhantomData,
            },
        )
    }

    /// Register a synchronous procedure returning `Result`.
    pub fn try_register<Func, A, R, E>(&mut self, name: &str, func: Func) -> &mut Self
    where
        Func: Handler<A, Result<R, E>>,
        A: FromArgs + 'static,
        R: Serialize + 'static,
        E: Into<ProcedureFailure> + 'static,
    {
        self.insert(
            name,
            Fallible {
                func,
                _marker: PhantomData,
            },
        )
    }

    /// Register an asynchronous procedure.
    pub fn register_async<Func, A, Fut, R, E>(&mut self, name: &str, func: Func) -> &mut Self
    where
        Func: Handler<A, Fut>,
        A: FromArgs + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<ProcedureFailure> + Send + 'static,
    {
        self.insert(
            name,
            Deferred {
                func,
                _marker: PhantomData,
            },
        )
    }

    /// Register a hand-written [`Procedure`]. Replaces any previous entry.
    pub fn insert(&mut self, name: &str, procedure: impl Procedure) -> &mut Self {
        self.procedures.insert(name.to_string(), Arc::new(procedure));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Procedure>> {
        self.procedures.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Describe the table: `{"procedures": [{"name", "arity"}, ...]}`, sorted by name.
    pub fn manifest(&self) -> Value {
        let procedures: Vec<Value> = self
            .procedures
            .iter()
            .map(|(name, procedure)| {
                serde_json::json!({
                    "name": name,
                    "arity": procedure.arity(),
                })
            })
            .collect();
        serde_json::json!({ "procedures": procedures })
    }
}

impl std::fmt::Debug for ProcedureTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureTable")
            .field("procedures", &self.procedures.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_table() -> ProcedureTable {
        let mut table = ProcedureTable::new();
        table
            .register("ping", || "pong")
            .register("add", |a: i64, b: i64| a + b)
            .try_register("divide", |a: i64, b: i64| {
                if b == 0 {
                    Err("division by zero")
                } else {
                    Ok(a / b)
                }
            })
            .register_async("shout", |text: String| async move {
                Ok::<_, ProcedureFailure>(text.to_uppercase())
            });
        table
    }

    #[tokio::test]
    async fn infallible_procedure_returns_json() {
        let table = sample_table();
        let add = table.get("add").unwrap();
        assert_eq!(add.call(vec![json!(3), json!(4)]).await.unwrap(), json!(7));
        assert_eq!(add.arity(), 2);
    }

    #[tokio::test]
    async fn fallible_procedure_surfaces_failure() {
        let table = sample_table();
        let divide = table.get("divide").unwrap();
        assert_eq!(divide.call(vec![json!(8), json!(2)]).await.unwrap(), json!(4));
        let err = divide.call(vec![json!(8), json!(0)]).await.unwrap_err();
        assert_eq!(err.message(), "division by zero");
    }

    #[tokio::test]
    async fn async_procedure_is_awaited() {
        let table = sample_table();
        let shout = table.get("shout").unwrap();
        assert_eq!(shout.call(vec![json!("hi")]).await.unwrap(), json!("HI"));
    }

    #[tokio::test]
    async fn argument_mismatch_fails_inside_procedure() {
        let table = sample_table();
        let ping = table.get("ping").unwrap();
        assert!(ping.call(vec![json!(1)]).await.is_err());
        let shout = table.get("shout").unwrap();
        assert!(shout.call(vec![json!(5)]).await.is_err());
    }

    #[test]
    fn manifest_is_sorted() {
        let table = sample_table();
        assert_eq!(
            table.manifest(),
            json!({
                "procedures": [
                    {"name": "add", "arity": 2},
                    {"name": "divide", "arity": 2},
                    {"name": "ping", "arity": 0},
                    {"name": "shout", "arity": 1},
                ]
            })
        );
        assert_eq!(table.names().collect::<Vec<_>>(), ["add", "divide", "ping", "shout"]);
        assert!(table.contains("ping"));
        assert!(!table.contains("notReal"));
    }
}
