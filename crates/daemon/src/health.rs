// Liveness endpoint: `GET /` answers 200 while the process is up

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use pricewatch_core::application::worker::panic_message;
use pricewatch_core::application::{
    shutdown_channel, CloseStack, Closer, FatalErrors, ShutdownSender,
};
use pricewatch_core::{AppError, Result};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Background HTTP server answering liveness checks
///
/// Bind and serve failures are reported on the fatal-error channel. Closing
/// stops accepting connections and waits for in-flight requests.
pub struct HealthServer {
    stop: ShutdownSender,
    bound: watch::Receiver<Option<SocketAddr>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthServer {
    /// Spawn the server on `addr` and register it for ordered teardown
    pub fn start(addr: SocketAddr, closers: &CloseStack, fatal: FatalErrors) -> Arc<Self> {
        let (stop, stop_token) = shutdown_channel();
        let (bound_tx, bound) = watch::channel(None);

        let task = tokio::spawn(async move {
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    fatal.report(AppError::Internal(format!(
                        "health server cannot bind {}: {}",
                        addr, e
                    )));
                    return;
                }
            };
            let local = listener.local_addr().unwrap_or(addr);
            bound_tx.send_replace(Some(local));
            info!(addr = %local, "Health server listening");

            let served = axum::serve(listener, router())
                .with_graceful_shutdown(async move { stop_token.cancelled().await })
                .await;
            if let Err(e) = served {
                fatal.report(AppError::Internal(format!("health server failed: {}", e)));
            }
        });

        let server = Arc::new(Self {
            stop,
            bound,
            task: Mutex::new(Some(task)),
        });
        closers.push("health server", server.clone());
        server
    }

    /// Address the server listens on, once bound
    ///
    /// `None` when binding failed.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let mut bound = self.bound.clone();
        let addr = match bound.wait_for(Option::is_some).await {
            Ok(addr) => *addr,
            Err(_) => None,
        };
        addr
    }

    pub async fn close(&self) -> Result<()> {
        self.stop.shutdown();

        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_mut() {
            let joined = handle.await;
            *task = None;
            joined.map_err(|e| AppError::Internal(format!("health server task failed: {}", e)))?;
            debug!("Health server closed");
        }
        Ok(())
    }
}

#[async_trait]
impl Closer for HealthServer {
    async fn close(&self) -> Result<()> {
        HealthServer::close(self).await
    }
}

fn router() -> Router {
    with_middleware(Router::new().route("/", get(|| async { StatusCode::OK })))
}

/// Request tracing and panic recovery: a panicking handler answers 500
fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(recover))
        .layer(TraceLayer::new_for_http())
}

fn recover(payload: Box<dyn Any + Send + 'static>) -> Response {
    error!(panic_msg = %panic_message(payload.as_ref()), "Recovered from panic in request handler");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
