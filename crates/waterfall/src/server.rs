use std::future::Future;
use std::net::SocketAddr;

use spanview_core::error::{Result, SpanviewError};

use crate::otlp::http::{self, HttpState};

pub async fn serve<F>(addr: SocketAddr, state: HttpState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SpanviewError::Io(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(addr = %addr, "waterfall HTTP server listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| SpanviewError::Internal(format!("HTTP server failed: {e}")))
}
