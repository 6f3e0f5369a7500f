//! Minimal typed RPC over HTTP.
//!
//! A host registers named procedures in a [`ProcedureTable`] and serves it
//! through an [`RpcHandler`], mounted on an axum [`router`]. A caller sends
//! `{"procedureName", "args"}` as a `POST` body and gets back the raw JSON
//! result (status 200) or a classified error record (any other status).
//!
//! Calls can go over the network ([`Client::remote`]) or stay in-process
//! ([`Client::local`]); both paths produce the same observable results.
//! [`call_surface!`] generates a typed client struct from a list of
//! procedure signatures.

pub mod client;
pub mod config;
pub mod handlers;
pub mod procedures;
pub mod protocol;
pub mod server;
pub mod transport;

pub mod schema;

pub use client::{CallOptions, CallSite, Client, PayloadShape};
pub use handlers::RpcHandler;
pub use procedures::{Procedure, ProcedureTable};
pub use protocol::{ErrorKind, ProcedureError, ProcedureFailure};
pub use server::{router, serve, serve_with_grace, Listener, RpcServer};
