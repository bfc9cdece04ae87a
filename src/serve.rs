//! HTTP serving of a [`ModelWrapper`].
//!
//! Routes: `POST /predict`, `GET /ping`, `GET /metadata`, `GET /prototype`.
//! Handlers share one immutable [`ServeContext`]; request failures become
//! JSON error responses and never stop the server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::model::{ModelDescription, ModelWrapper};

mod error;
mod handlers;

pub use error::ApiError;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Serving,
    Stopped,
    Failed,
}

impl ServerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ServerState::Stopped | ServerState::Failed)
    }
}

/// Read-only state handed to every request handler.
#[derive(Debug)]
pub struct ServeContext {
    wrapper: ModelWrapper,
    description: ModelDescription,
}

impl ServeContext {
    pub fn new(wrapper: ModelWrapper) -> Self {
        let description = wrapper.description();
        Self {
            wrapper,
            description,
        }
    }

    pub fn wrapper(&self) -> &ModelWrapper {
        &self.wrapper
    }

    pub fn description(&self) -> &ModelDescription {
        &self.description
    }
}

/// Build the router with tracing and panic isolation.
pub fn build_router(context: Arc<ServeContext>) -> Router {
    with_layers(handlers::routes().with_state(context))
}

fn with_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
}

pub struct Server {
    context: Arc<ServeContext>,
    state: watch::Sender<ServerState>,
}

impl Server {
    pub fn new(wrapper: ModelWrapper) -> Self {
        let (state, _) = watch::channel(ServerState::Starting);
        Self {
            context: Arc::new(ServeContext::new(wrapper)),
            state,
        }
    }

    pub fn context(&self) -> Arc<ServeContext> {
        Arc::clone(&self.context)
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind the listening socket. A failure is terminal.
    pub async fn bind(&self, addr: &str) -> Result<TcpListener, ServeError> {
        match TcpListener::bind(addr).await {
            Ok(listener) => Ok(listener),
            Err(source) => {
                self.state.send_replace(ServerState::Failed);
                tracing::error!(addr, error = %source, "Failed to bind");
                Err(ServeError::Bind {
                    addr: addr.to_string(),
                    source,
                })
            }
        }
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        let router = build_router(self.context());
        self.state.send_replace(ServerState::Serving);
        tracing::info!(
            addr = ?local,
            model = self.context.wrapper().name(),
            "Serving predictions"
        );
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await;
        match result {
            Ok(()) => {
                self.state.send_replace(ServerState::Stopped);
                tracing::info!("Server stopped");
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(ServerState::Failed);
                Err(err.into())
            }
        }
    }

    pub async fn run<F>(self, addr: &str, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind(addr).await?;
        self.serve(listener, shutdown).await
    }
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
