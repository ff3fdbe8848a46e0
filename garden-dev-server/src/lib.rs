//! Development server for a generated garden.
//!
//! Serves the output directory with caching disabled and keeps a websocket
//! open to every page. Whoever rebuilds the site calls [`Reloader::reload`]
//! once the new files are on disk, and connected browsers refresh.

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{HeaderName, HeaderValue, header},
    response::Response,
    routing::get,
};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{debug, info, warn};

pub const LIVERELOAD_PATH: &str = "/__livereload";

const RELOAD_MESSAGE: &str = "reload";

#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    pub host: String,
    pub port: u16,
    /// Output directory of the build
    pub root: PathBuf,
    /// Open the site in a browser once listening
    pub open: bool,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("./out"),
            open: false,
        }
    }
}

/// Tells connected browsers that a rebuild finished.
#[derive(Debug, Clone)]
pub struct Reloader {
    tx: broadcast::Sender<()>,
}

impl Default for Reloader {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }
}

impl Reloader {
    /// Returns the number of browsers notified.
    pub fn reload(&self) -> usize {
        let notified = self.tx.send(()).unwrap_or(0);
        debug!("Reload sent to {} browser(s)", notified);
        notified
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

pub struct LiveServer {
    config: LiveServerConfig,
    reloader: Reloader,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        Self {
            config,
            reloader: Reloader::default(),
        }
    }

    /// Handle to trigger reloads while the server runs.
    pub fn reloader(&self) -> Reloader {
        self.reloader.clone()
    }

    /// Serve until the process is stopped.
    pub async fn run(self) -> Result<()> {
        if !self.config.root.is_dir() {
            anyhow::bail!("Output directory does not exist: {}", self.config.root.display());
        }

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| format!("Invalid address {}:{}", self.config.host, self.config.port))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        let url = format!("http://{}", addr);
        info!("Serving {} at {}", self.config.root.display(), url);

        if self.config.open {
            if let Err(e) = open::that(&url) {
                warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, router(&self.config.root, self.reloader)).await?;
        Ok(())
    }
}

fn router(root: &Path, reloader: Reloader) -> Router {
    let no_cache = |name: HeaderName, value: &'static str| {
        SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
    };

    Router::new()
        .route(LIVERELOAD_PATH, get(livereload))
        .fallback_service(ServeDir::new(root))
        .layer(no_cache(
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate",
        ))
        .layer(no_cache(header::PRAGMA, "no-cache"))
        .layer(no_cache(header::EXPIRES, "0"))
        .with_state(reloader)
}

async fn livereload(ws: WebSocketUpgrade, State(reloader): State<Reloader>) -> Response {
    let reloads = reloader.subscribe();
    ws.on_upgrade(move |socket| forward_reloads(socket, reloads))
}

async fn forward_reloads(mut socket: WebSocket, mut reloads: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            signal = reloads.recv() => match signal {
                // Missed signals still mean the page is stale
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    let message = Message::Text(RELOAD_MESSAGE.to_string().into());
                    if socket.send(message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => {
                if !matches!(incoming, Some(Ok(_))) {
                    break;
                }
            }
        }
    }
}

/// Client snippet injected into every page while serving.
pub fn livereload_script(host: &str, port: u16) -> String {
    format!(
        r#"<script>
new WebSocket("ws://{host}:{port}{path}").onmessage = (event) => {{
    if (event.data === "{message}") location.reload();
}};
</script>
"#,
        path = LIVERELOAD_PATH,
        message = RELOAD_MESSAGE,
    )
}
