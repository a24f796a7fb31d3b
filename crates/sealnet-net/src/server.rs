//! HTTPS server for protocol messages and fragments
//!
//! Routes:
//! - `PUT /message/`: postcard `Message`, handed to the [`Router`]
//! - `GET /{key}`: fragment bytes from the [`FragmentStore`]
//! - `PUT /{key}/`: store fragment bytes whose BLAKE3 hash is `key`
//!
//! Connections beyond the worker ceiling wait in the listen backlog.

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use bytes::Bytes;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio_rustls::TlsAcceptor;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::fragment::{FragmentKey, FragmentStore, DEFAULT_MAX_FRAGMENT_SIZE};
use crate::message::{Message, DEFAULT_MAX_MESSAGE_SIZE};
use crate::router::Router;
use crate::tls::{ServerTls, TlsError};

/// Path for protocol messages
pub const MESSAGE_PATH: &str = "/message/";

/// Server errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("Bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid server settings: {0}")]
    InvalidSettings(String),
    #[error("Server shutdown")]
    Shutdown,
}

/// Server tuning
#[derive(Clone, Debug)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    /// Concurrent connections served
    pub workers: usize,
    /// Pending connections queued by the kernel
    pub backlog: u32,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
    pub max_message_size: usize,
    pub max_fragment_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8443)),
            workers: 100,
            backlog: 100,
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
        }
    }
}

impl ServerSettings {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.workers == 0 {
            return Err(ServerError::InvalidSettings("workers must be non-zero".into()));
        }
        if self.backlog == 0 {
            return Err(ServerError::InvalidSettings("backlog must be non-zero".into()));
        }
        if self.max_message_size == 0 || self.max_fragment_size == 0 {
            return Err(ServerError::InvalidSettings("size limits must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    router: Arc<dyn Router>,
    store: Arc<dyn FragmentStore>,
    max_message_size: usize,
}

/// Entry point for starting a server
pub struct Server;

impl Server {
    /// Load TLS, build the HTTP app and bind the listener.
    ///
    /// Must be called from within a tokio runtime. Nothing is accepted
    /// until [`BoundServer::run`].
    pub fn bind(
        settings: ServerSettings,
        tls: &ServerTls,
        router: Arc<dyn Router>,
        store: Arc<dyn FragmentStore>,
    ) -> Result<BoundServer, ServerError> {
        settings.validate()?;
        let acceptor = TlsAcceptor::from(tls.server_config()?);

        let addr = settings.listen;
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .map_err(|source| ServerError::Bind { addr, source })?;
        let listener = socket
            .listen(settings.backlog)
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let state = AppState {
            router,
            store,
            max_message_size: settings.max_message_size,
        };

        Ok(BoundServer {
            listener,
            local_addr,
            acceptor,
            app: app(state, &settings),
            workers: Arc::new(Semaphore::new(settings.workers)),
            settings,
        })
    }
}

fn app(state: AppState, settings: &ServerSettings) -> axum::Router {
    axum::Router::new()
        .route(
            MESSAGE_PATH,
            put(put_message).layer(DefaultBodyLimit::max(settings.max_message_size)),
        )
        .route("/:key", get(get_fragment))
        .route(
            "/:key/",
            put(put_fragment).layer(DefaultBodyLimit::max(settings.max_fragment_size)),
        )
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            settings.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

/// A listening server
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    acceptor: TlsAcceptor,
    app: axum::Router,
    workers: Arc<Semaphore>,
    settings: ServerSettings,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr,
            workers = self.settings.workers,
            "Server listening"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.recv() => break,
                permit = self.workers.clone().acquire_owned() => {
                    permit.map_err(|_| ServerError::Shutdown)?
                }
            };

            let (stream, peer) = tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("Accept error: {}", e);
                        continue;
                    }
                }
            };

            debug!(%peer, "Accepted connection");
            tokio::spawn(serve_connection(
                stream,
                peer,
                self.acceptor.clone(),
                self.app.clone(),
                self.settings.handshake_timeout,
                permit,
            ));
        }

        info!(addr = %self.local_addr, "Server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: axum::Router,
    handshake_timeout: Duration,
    _permit: OwnedSemaphorePermit,
) {
    let tls_stream = match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            debug!(%peer, error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            debug!(%peer, "TLS handshake timed out");
            return;
        }
    };

    let service = TowerToHyperService::new(app);
    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
    {
        debug!(%peer, error = %e, "Connection closed with error");
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn put_message(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let message = match Message::decode(&body, state.max_message_size) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "Rejected message");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(kind = message.name(), target = %message.target, "Message received");
    match state.router.receive(message).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Router failed to accept message");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn get_fragment(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let Some(key) = FragmentKey::from_hex(&key) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.store.get(&key).await {
        Ok(Some(bytes)) => (StatusCode::OK, bytes).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(%key, error = %e, "Fragment read failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn put_fragment(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(key) = FragmentKey::from_hex(&key) else {
        return StatusCode::BAD_REQUEST;
    };
    if !key.matches(&body) {
        debug!(%key, "Fragment content does not match key");
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    match state.store.put(&key, body.to_vec()).await {
        Ok(()) => {
            debug!(%key, len = body.len(), "Fragment stored");
            StatusCode::CREATED
        }
        Err(e) => {
            warn!(%key, error = %e, "Fragment write failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
