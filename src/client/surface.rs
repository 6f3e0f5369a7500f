//! Call surfaces: one awaitable callable per procedure name.
//!
//! Two flavours:
//!
//! - [`CallSite`]: built at runtime from a list of names, arguments are
//!   positional JSON
//! - [`call_surface!`](crate::call_surface): a struct with one typed async
//!   method per procedure, checked by the compiler at every call site
//!
//! Both are bound to a [`Client`], so the same surface works remotely or
//! in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Client;
use crate::procedures::ProcedureTable;
use crate::protocol::{IntoArgs, ProcedureError};

/// A callable closed over one procedure name and a client.
#[derive(Debug, Clone)]
pub struct BoundCall {
    name: Arc<str>,
    client: Client,
}

impl BoundCall {
    pub fn new(name: &str, client: Client) -> Self {
        Self {
            name: Arc::from(name),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, args: Vec<Value>) -> Result<Value, ProcedureError> {
        self.client.call(&self.name, args).await
    }

    pub async fn call_typed<A, R>(&self, args: A) -> Result<R, ProcedureError>
    where
        A: IntoArgs,
        R: DeserializeOwned,
    {
        self.client.call_typed(&self.name, args).await
    }
}

/// Mapping from procedure name to its [`BoundCall`].
#[derive(Debug, Clone, Default)]
pub struct CallSite {
    calls: BTreeMap<String, BoundCall>,
}

impl CallSite {
    /// Bind every name in `names` to `client`.
    pub fn generate<I, S>(names: I, client: &Client) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let calls = names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), BoundCall::new(name, client.clone()))
            })
            .collect();
        Self { calls }
    }

    /// In-process surface covering every procedure in `table`.
    pub fn local(table: Arc<ProcedureTable>) -> Self {
        let client = Client::local(Arc::clone(&table));
        Self::generate(table.names(), &client)
    }

    pub fn get(&self, name: &str) -> Option<&BoundCall> {
        self.calls.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.calls.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Declare a typed call surface.
///
/// Each entry maps a wire name to a method with fixed parameter and return
/// types. The generated struct wraps a [`Client`] and exposes
/// `PROCEDURES` plus `missing_from(&ProcedureTable)` for checking a table
/// against the declaration.
///
/// ```ignore
/// saurpc::call_surface! {
///     pub struct GreeterCalls {
///         "sayHelloTo" => fn say_hello_to(name: String) -> String;
///         "add" => fn add(a: i64, b: i64) -> i64;
///     }
/// }
///
/// let calls = GreeterCalls::remote("http://127.0.0.1:24515");
/// assert_eq!(calls.add(3, 4).await?, 7);
/// ```
#[macro_export]
macro_rules! call_surface {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $rpc:literal => fn $method:ident ( $($arg:ident : $argty:ty),* $(,)? ) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            client: $crate::client::Client,
        }

        #[allow(dead_code)]
        impl $name {
            /// Wire names of every declared procedure.
            pub const PROCEDURES: &'static [&'static str] = &[$($rpc),*];

            pub fn new(client: $crate::client::Client) -> Self {
                Self { client }
            }

            pub fn remote(endpoint: &str) -> Self {
                Self::new($crate::client::Client::remote(endpoint))
            }

            pub fn local(table: ::std::sync::Arc<$crate::procedures::ProcedureTable>) -> Self {
                Self::new($crate::client::Client::local(table))
            }

            pub fn client(&self) -> &$crate::client::Client {
                &self.client
            }

            /// Declared names that `table` does not serve.
            pub fn missing_from(
                table: &$crate::procedures::ProcedureTable,
            ) -> ::std::vec::Vec<&'static str> {
                Self::PROCEDURES
                    .iter()
                    .copied()
                    .filter(|name| !table.contains(name))
                    .collect()
            }

            $(
                $(#[$fmeta])*
                pub async fn $method(
                    &self,
                    $($arg: $argty),*
                ) -> ::std::result::Result<$ret, $crate::protocol::ProcedureError> {
                    self.client.call_typed::<_, $ret>($rpc, ($($arg,)*)).await
                }
            )*
        }
    };
}
