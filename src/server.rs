use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ServerConfig, DEFAULT_SHUTDOWN_GRACE};
use crate::handlers::{self, RpcHandler};
use crate::procedures::ProcedureTable;
use crate::protocol::{HttpRequest, HttpResponse, ProcedureError, StatusCode};

/// RPC host: serves one procedure table over HTTP.
pub struct RpcServer {
    config: ServerConfig,
    handler: RpcHandler,
}

impl RpcServer {
    pub fn new(config: ServerConfig, table: ProcedureTable) -> Self {
        let handler = RpcHandler::from_config(Arc::new(table), &config);
        Self { config, handler }
    }

    pub fn handler(&self) -> &RpcHandler {
        &self.handler
    }

    /// Bind the configured address and start accepting in the background.
    pub async fn bind<S>(self, shutdown: S) -> std::io::Result<Listener>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        serve_with_grace(
            self.config.bind_addr,
            self.handler,
            shutdown,
            self.config.shutdown_grace,
        )
        .await
    }

    /// Serve until `shutdown` resolves and in-flight calls have finished.
    pub async fn run<S>(self, shutdown: S) -> Result<(), Box<dyn std::error::Error>>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        self.bind(shutdown).await?.join().await?;
        Ok(())
    }
}

/// A running listener.
pub struct Listener {
    local_addr: SocketAddr,
    task: JoinHandle<std::io::Result<()>>,
}

impl Listener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL for clients of this listener.
    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Wait for the listener to stop and its connections to drain.
    pub async fn join(self) -> std::io::Result<()> {
        self.task.await.map_err(std::io::Error::other)?
    }
}

/// Router that sends every path and method on it to `handler`.
///
/// Hosts with their own axum app can `nest` or `merge` it.
pub fn router(handler: RpcHandler) -> Router {
    Router::new()
        .fallback(endpoint)
        .layer(DefaultBodyLimit::disable())
        .with_state(handler)
}

/// Bind `addr` and serve `handler` until `shutdown` resolves.
///
/// Drains for at most [`DEFAULT_SHUTDOWN_GRACE`] after shutdown.
pub async fn serve<A, S>(addr: A, handler: RpcHandler, shutdown: S) -> std::io::Result<Listener>
where
    A: ToSocketAddrs,
    S: Future<Output = ()> + Send + 'static,
{
    serve_with_grace(addr, handler, shutdown, DEFAULT_SHUTDOWN_GRACE).await
}

/// Bind `addr` and serve `handler` until `shutdown` resolves.
///
/// After shutdown no new connections are accepted and open ones get `grace`
/// to finish. Connections still open after that are abandoned, so an idle or
/// stalled peer cannot hold the listener open.
pub async fn serve_with_grace<A, S>(
    addr: A,
    handler: RpcHandler,
    shutdown: S,
    grace: Duration,
) -> std::io::Result<Listener>
where
    A: ToSocketAddrs,
    S: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(%local_addr, procedures = handler.table().len(), "listening");

    let (fired_tx, fired_rx) = oneshot::channel::<()>();
    let app = router(handler);
    let task = tokio::spawn(async move {
        let serving = async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown.await;
                    tracing::info!("shutdown requested, draining connections");
                    let _ = fired_tx.send(());
                })
                .await
        };
        tokio::pin!(serving);

        tokio::select! {
            served = &mut serving => served,
            _ = drain_deadline(fired_rx, grace) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "connections still open after shutdown grace, abandoning them"
                );
                Ok(())
            }
        }
    });

    Ok(Listener { local_addr, task })
}

async fn drain_deadline(fired: oneshot::Receiver<()>, grace: Duration) {
    if fired.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn endpoint(State(handler): State<RpcHandler>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match read_body(body, handler.max_body_bytes()).await {
        Ok(Collected::Complete(body)) => body,
        Ok(Collected::Oversized(length)) => return handler.reject_oversized(length).into_response(),
        Err(e) => {
            let err = ProcedureError::invalid_payload(
                format!("Could not read request body: {e}"),
                Value::Null,
            );
            return handlers::error_response(StatusCode::BAD_REQUEST, &err).into_response();
        }
    };

    let request = HttpRequest {
        method: parts.method,
        url: parts.uri.to_string(),
        headers: parts.headers,
        body,
    };
    handler.handle(request).await.into_response()
}

enum Collected {
    Complete(Vec<u8>),
    Oversized(usize),
}

/// Read the whole body, keeping at most `limit` bytes.
///
/// An oversized body is still drained to the end so the peer sees the
/// rejection instead of a reset connection.
async fn read_body(body: Body, limit: usize) -> Result<Collected, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut kept = Vec::new();
    let mut total = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        total = total.saturating_add(chunk.len());
        if total <= limit {
            kept.extend_from_slice(&chunk);
        }
    }
    if total > limit {
        Ok(Collected::Oversized(total))
    } else {
        Ok(Collected::Complete(kept))
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn body_within_limit_is_kept() {
        match read_body(Body::from("[1,2]"), 5).await.unwrap() {
            Collected::Complete(body) => assert_eq!(body, b"[1,2]"),
            Collected::Oversized(_) => panic!("body fits the limit"),
        }
    }

    #[tokio::test]
    async fn oversized_body_reports_full_length() {
        match read_body(Body::from(vec![b' '; 40]), 8).await.unwrap() {
            Collected::Oversized(length) => assert_eq!(length, 40),
            Collected::Complete(_) => panic!("body exceeds the limit"),
        }
    }

    #[tokio::test]
    async fn response_keeps_status_and_json_content_type() {
        let response = HttpResponse::json(StatusCode::NOT_FOUND, &serde_json::json!({"a": 1}));
        let converted = response.into_response();
        assert_eq!(converted.status(), StatusCode::NOT_FOUND);
        assert_eq!(converted.headers()["content-type"], "application/json");
    }
}
