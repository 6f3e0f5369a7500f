use super::{Result, Transport};
use crate::handlers::RpcHandler;
use crate::protocol::{HttpRequest, HttpResponse};

/// In-process transport: the request goes straight to a handler, no sockets.
///
/// The request and response still travel as serialized bytes, so callers
/// observe exactly what they would over the network.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    handler: RpcHandler,
}

impl LocalTransport {
    pub fn new(handler: RpcHandler) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &RpcHandler {
        &self.handler
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.handler.handle(request).await)
    }
}
