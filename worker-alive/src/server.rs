use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

/// Serve the probe router on `listener` until the `shutdown` future
/// resolves, then drain gracefully.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("probe listening on {:?}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
