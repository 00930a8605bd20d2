//! Serving with a bounded graceful-shutdown drain.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve `app` until `signal` resolves, then give open connections at most
/// `drain_timeout` to finish before returning.
pub async fn serve_with_drain<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    drain_timeout: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = draining_tx.send(());
        })
        .into_future();

    let deadline = async move {
        match draining_rx.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            // Server stopped without a shutdown signal.
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => result,
        () = deadline => {
            tracing::warn!(
                timeout_secs = drain_timeout.as_secs(),
                "Connections still open after shutdown timeout, closing"
            );
            Ok(())
        }
    }
}
