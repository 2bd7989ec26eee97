//! # HTTP Server
//!
//! HTTP/1 server built on Hyper and Tokio, dispatching through a
//! [`Router`]. Implements graceful shutdown on Ctrl-C.
//!
//! ## Key Features
//!
//! - Body size limit enforced before dispatch
//! - `x-request-id` on every response
//! - Cookie-backed sessions (and with them CSRF tokens)
//! - Connection draining with a shutdown timeout

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::session::{session_id_from_cookie, SessionStore};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Idle lifetime of a session (default: 2 hours)
    pub session_lifetime: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
            session_lifetime: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// HTTP server owning the router and the session store
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    sessions: SessionStore,
}

impl Server {
    /// Server with the default configuration
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    /// Server with an explicit configuration
    #[must_use]
    pub fn with_config(router: Router, config: ServerConfig) -> Self {
        Self {
            sessions: SessionStore::new(config.session_lifetime),
            config,
            router: Arc::new(router),
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Router requests are dispatched through
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Live sessions
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Accept connections until Ctrl-C, then drain
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound, or an IO
    /// error if accepting fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let listener = bind(addr).map_err(|source| Error::BindError {
            address: addr.to_string(),
            source,
        })?;

        info!("Server listening on http://{}", addr);

        let active = Arc::new(AtomicUsize::new(0));
        let keep_alive = self.config.keep_alive;
        let mut sweep = tokio::time::interval(self.sessions.max_age().max(Duration::from_secs(60)));

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let router = self.router.clone();
                    let sessions = self.sessions.clone();
                    let max_body_size = self.config.max_body_size;
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                            let router = router.clone();
                            let sessions = sessions.clone();
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = format!("{:?}", req.version());

                                let response = match Request::from_hyper_with_limit(req, max_body_size).await {
                                    Ok(mut request) => {
                                        request.set_header("x-client-ip", &remote_addr.ip().to_string());
                                        process(&router, &sessions, request).await
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "Rejected request");
                                        Response::text(e.reason()).with_status(e.status_code())
                                    }
                                };

                                info!("    {} - \"{} {} {}\" {}",
                                    remote_addr,
                                    method,
                                    path,
                                    version,
                                    response.status
                                );
                                Ok::<_, Infallible>(response.into_hyper())
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                _ = sweep.tick() => {
                    self.sessions.cleanup();
                }
                () = shutdown_signal() => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                open = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with open connections"
            );
        }
        Ok(())
    }

    /// Run a request through sessions and dispatch without the network stack
    pub async fn process(&self, req: Request) -> Response {
        process(&self.router, &self.sessions, req).await
    }
}

fn bind(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(not(windows))]
    {
        socket.set_reuseport(true)?;
    }
    socket.bind(addr)?;
    socket.listen(1024)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Attach request id and session, dispatch, then stamp the response
async fn process(router: &Router, sessions: &SessionStore, mut req: Request) -> Response {
    let request_id = req
        .header(REQUEST_ID_HEADER)
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
    req.set_header(REQUEST_ID_HEADER, &request_id);

    let cookie_id = session_id_from_cookie(req.header("cookie"));
    let (session, created) = sessions.ensure(cookie_id.as_deref());
    let cookie = created.then(|| sessions.cookie(&session));

    let mut response = router.dispatch(req.with_session(session)).await;

    response.set_header(REQUEST_ID_HEADER, &request_id);
    if let Some(cookie) = cookie {
        response.set_header("set-cookie", &cookie);
    }
    response
}
