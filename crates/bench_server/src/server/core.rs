//! The benchmark server core: listeners, serve loops and shutdown.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[cfg(unix)]
use std::os::fd::AsRawFd;

use super::router::router;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handlers::Handlers;

const LISTEN_BACKLOG: i32 = 65535;

/// Serves the workload routes over HTTP/1.1, one task per connection.
///
/// With `use_reuse_port` the server opens one `SO_REUSEPORT` listener per
/// CPU core on the same address and lets the kernel spread connections
/// across them.
pub struct BenchServer {
    config: ServerConfig,
    handlers: Arc<Handlers>,
    shutdown_sender: broadcast::Sender<()>,
}

impl BenchServer {
    pub fn new(config: ServerConfig, handlers: Arc<Handlers>) -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            config,
            handlers,
            shutdown_sender,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handlers(&self) -> &Arc<Handlers> {
        &self.handlers
    }

    /// Binds the configured address and serves until [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<(), ServerError> {
        let listeners = self.bind_listeners()?;
        self.serve(listeners).await
    }

    /// Opens the listening sockets. Must be called inside a Tokio runtime.
    pub fn bind_listeners(&self) -> Result<Vec<TcpListener>, ServerError> {
        let core_count = num_cpus::get();
        let num_acceptors = if self.config.use_reuse_port {
            core_count
        } else {
            1
        };
        info!(
            "🧠 Detected {} CPU cores, using {} acceptor(s)",
            core_count, num_acceptors
        );

        let mut listeners = Vec::with_capacity(num_acceptors);
        for i in 0..num_acceptors {
            let listener = self.bind_one()?;
            info!(
                "✅ Listener {} bound on {}",
                i,
                listener
                    .local_addr()
                    .map_err(|e| ServerError::Network(format!("Local address lookup failed: {e}")))?
            );
            listeners.push(listener);
        }
        Ok(listeners)
    }

    fn bind_one(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        if self.config.use_reuse_port {
            enable_reuse_port(&socket);
        }

        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
    }

    /// Runs one axum server per listener until shutdown is requested or a
    /// listener fails. Shutdown stops accepting, closes idle connections and
    /// waits for in-flight requests.
    pub async fn serve(&self, listeners: Vec<TcpListener>) -> Result<(), ServerError> {
        if listeners.is_empty() {
            return Err(ServerError::Internal("No listeners to serve".to_string()));
        }

        info!("🚀 Serving benchmark endpoints on {}", self.config.bind_address);

        let app = router(Arc::clone(&self.handlers));
        let mut servers = listeners
            .into_iter()
            .map(|listener| {
                let app = app.clone();
                let mut shutdown = self.shutdown_sender.subscribe();
                async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown.recv().await;
                        })
                        .await
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut result = Ok(());
        while let Some(finished) = servers.next().await {
            if let Err(e) = finished {
                error!("Listener stopped: {}", e);
                if result.is_ok() {
                    result = Err(ServerError::Network(format!("Serve loop stopped: {e}")));
                }
                // Takes the remaining listeners down with it.
                let _ = self.shutdown_sender.send(());
            }
        }

        info!("Server stopped");
        result
    }

    /// Stops the accept loops and asks open connections to close.
    pub fn shutdown(&self) {
        if self.shutdown_sender.send(()).is_err() {
            warn!("Shutdown requested but the server is not running");
        }
    }
}

#[cfg(unix)]
fn enable_reuse_port(socket: &Socket) {
    let sockfd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: `sockfd` is a live socket owned by `socket` and `optval`
    // outlives the call.
    let ret = unsafe {
        libc::setsockopt(
            sockfd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of_val(&optval) as libc::socklen_t,
        )
    };
    if ret != 0 {
        warn!("Failed to set SO_REUSEPORT: {}", std::io::Error::last_os_error());
    } else {
        debug!("SO_REUSEPORT enabled for load balancing across acceptors");
    }
}

#[cfg(not(unix))]
fn enable_reuse_port(_socket: &Socket) {
    warn!("SO_REUSEPORT is not supported on this platform. Using SO_REUSEADDR only.");
}
