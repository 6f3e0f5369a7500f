use url::Url;

use super::{Result, Transport, TransportError};
use crate::protocol::{HttpRequest, HttpResponse};

/// Largest response body accepted from a host (16 MiB).
pub const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Plain-HTTP transport over a shared `reqwest` client.
///
/// Connections are pooled by the client; each call is one request/response
/// exchange.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, connect timeouts, pool sizing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", request.url)))?;
        if url.scheme() != "http" {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                request.url
            )));
        }

        let mut response = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let limit = self.max_response_bytes;
        if let Some(length) = response.content_length() {
            let length = usize::try_from(length).unwrap_or(usize::MAX);
            if length > limit {
                return Err(TransportError::BodyTooLarge { length, limit });
            }
        }

        let status = response.status();
        let headers = std::mem::take(response.headers_mut());
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let length = body.len() + chunk.len();
            if length > limit {
                return Err(TransportError::BodyTooLarge { length, limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Method;

    fn request(url: &str) -> HttpRequest {
        HttpRequest::new(Method::POST, url, b"[]".to_vec())
    }

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = HttpTransport::new()
            .send(request("file:///dev/null"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn rejects_unparsable_url() {
        let err = HttpTransport::new().send(request("/relative")).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_http_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpTransport::new()
            .send(request(&format!("http://{addr}/")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }
}
