//! Live-reload transport
//!
//! A WebSocket endpoint that tells browser clients to reload when the build
//! backend finishes an incremental rebuild of the watched bundle. With
//! `http_server` enabled the bundle output directory is served as well.

mod hmr;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::bundler::DevOptions;

pub use hmr::HmrMessage;

/// Path of the live-reload WebSocket
pub const HMR_PATH: &str = "/__fuse_hmr";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind live-reload server on {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared server state
struct ServerState {
    /// Live-reload broadcast channel
    hmr_tx: broadcast::Sender<HmrMessage>,
}

/// Live-reload server, not yet listening
pub struct DevServer {
    options: DevOptions,

    /// Directory served when `http_server` is enabled
    output_dir: PathBuf,
}

impl DevServer {
    pub fn new(options: DevOptions, output_dir: PathBuf) -> Self {
        Self { options, output_dir }
    }

    /// Bind the listener and serve in the background
    pub async fn start(self) -> Result<LiveReload, ServerError> {
        let (hmr_tx, _) = broadcast::channel::<HmrMessage>(100);

        let state = Arc::new(ServerState {
            hmr_tx: hmr_tx.clone(),
        });

        let mut app = Router::new()
            .route(HMR_PATH, get(hmr::hmr_websocket))
            .with_state(state);

        if self.options.http_server {
            app = app.fallback_service(ServeDir::new(&self.output_dir));
        }

        let app = app.layer(CorsLayer::permissive());

        let listener = tokio::net::TcpListener::bind((self.options.host.as_str(), self.options.port))
            .await
            .map_err(|source| ServerError::Bind {
                host: self.options.host.clone(),
                port: self.options.port,
                source,
            })?;
        let addr = listener.local_addr()?;

        info!("Live reload listening on ws://{}{}", addr, HMR_PATH);

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Live-reload server stopped: {}", e);
            }
        });

        Ok(LiveReload { hmr_tx, addr, task })
    }
}

/// Handle to a running live-reload server
pub struct LiveReload {
    hmr_tx: broadcast::Sender<HmrMessage>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl LiveReload {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sender for pushing messages from other tasks
    pub fn sender(&self) -> broadcast::Sender<HmrMessage> {
        self.hmr_tx.clone()
    }
}

impl Drop for LiveReload {
    fn drop(&mut self) {
        self.task.abort();
    }
}
