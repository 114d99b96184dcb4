//! Async TCP server using Tokio.
//!
//! [`RouterServer`] owns the listening socket and one task per connection.
//! Each connection reads a request head, builds a [`Request`] whose body is
//! streamed in while the router runs, and writes exactly one response per
//! request. HTTP/1.1 keep-alive is honoured when the request body was fully
//! consumed.

mod listener;

pub use listener::{NOT_FOUND_BODY, REDACTED_INTERNAL_MESSAGE, RequestListener};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::http::body::ChunkSender;
use crate::http::{Body, EncodedResponse, Request, RequestError, StatusCode};
use crate::router::Router;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("already listening")]
    AlreadyListening,

    #[error("already stopped")]
    AlreadyStopped,

    #[error("accept loop failed: {0}")]
    Join(#[from] JoinError),
}

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Body chunks buffered between the socket and an endpoint reading the body.
const BODY_CHANNEL_CAPACITY: usize = 16;

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// An HTTP server that feeds every request through a [`RequestListener`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use verso::{Request, Response, RouterServer, ServerConfig};
/// use verso::router::RouteResult;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = RouterServer::new(
///         |req: Arc<Request>| async move {
///             RouteResult::Ok(Some(Response::ok(json!({ "path": req.path() }))))
///         },
///         ServerConfig::from_env()?,
///     );
///     server.listen(8080).await?;
///     tokio::signal::ctrl_c().await?;
///     server.close().await?;
///     Ok(())
/// }
/// ```
pub struct RouterServer<R> {
    listener: Arc<RequestListener<R>>,
    running: Mutex<Option<Running>>,
}

impl<R: Router> RouterServer<R> {
    pub fn new(router: R, config: ServerConfig) -> Self {
        Self {
            listener: Arc::new(RequestListener::new(router, config)),
            running: Mutex::new(None),
        }
    }

    /// The request listener every connection dispatches through.
    pub fn listener(&self) -> &RequestListener<R> {
        &self.listener
    }

    /// Starts accepting connections on `0.0.0.0:port`.
    ///
    /// Returns the bound address; pass port `0` to let the OS pick one.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyListening`] — `listen` was already called and
    ///   the server has not been closed since.
    /// - [`ServerError::Bind`] — the address cannot be bound.
    pub async fn listen(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(ServerError::AlreadyListening);
        }

        info!(port, "starting server");
        let addr = format!("0.0.0.0:{port}");
        let tcp = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind { addr, source: e })?;
        let local_addr = tcp.local_addr()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(tcp, Arc::clone(&self.listener), shutdown_rx));
        info!(address = %local_addr, "server running");

        *running = Some(Running {
            local_addr,
            shutdown,
            accept_task,
        });
        Ok(local_addr)
    }

    /// The bound address while listening.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Stops accepting connections and waits until every open connection has
    /// finished its current request.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyStopped`] — the server is not listening.
    /// - [`ServerError::Join`] — the accept loop panicked.
    pub async fn close(&self) -> Result<(), ServerError> {
        let running = self
            .running
            .lock()
            .await
            .take()
            .ok_or(ServerError::AlreadyStopped)?;

        info!(address = %running.local_addr, "stopping server");
        let _ = running.shutdown.send(true);
        running.accept_task.await?;
        info!("server stopped");
        Ok(())
    }
}

async fn accept_loop<R: Router>(
    tcp: TcpListener,
    listener: Arc<RequestListener<R>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = tcp.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                debug!(peer = %peer, "connection accepted");
                let listener = Arc::clone(&listener);
                let shutdown = shutdown.clone();
                connections.spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, listener, shutdown).await {
                        warn!(peer = %peer, error = %e, "connection closed with error");
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(tcp);
    debug!(open = connections.len(), "draining connections");
    while let Some(joined) = connections.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "connection task failed");
        }
    }
}

/// Handles a single TCP connection over its lifetime.
async fn handle_connection<R: Router>(
    mut stream: TcpStream,
    peer: SocketAddr,
    listener: Arc<RequestListener<R>>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let config = listener.config();
    let (mut reader, mut writer) = stream.split();
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Buffer until a complete request head is available.
        let (head, body_offset) = loop {
            match Request::parse(&buf) {
                Ok(pair) => break pair,
                Err(RequestError::Incomplete) => {}
                Err(e) => {
                    warn!(peer = %peer, error = %e, "malformed request");
                    return reject(&mut writer, StatusCode::BadRequest).await;
                }
            }

            if buf.len() > config.max_head_bytes {
                warn!(peer = %peer, "request head too large");
                return reject(&mut writer, StatusCode::PayloadTooLarge).await;
            }

            // A head that has not fully arrived is abandoned on shutdown.
            if *shutdown.borrow() {
                debug!(peer = %peer, pending = buf.len(), "connection closed for shutdown");
                return Ok(());
            }
            let read = tokio::select! {
                read = reader.read_buf(&mut buf) => read?,
                _ = shutdown.changed() => {
                    debug!(peer = %peer, "connection closed for shutdown");
                    return Ok(());
                }
            };

            if read == 0 {
                debug!(peer = %peer, "connection closed by peer");
                return Ok(());
            }
        };

        let content_length = match head.content_length() {
            Ok(n) => n,
            Err(e) => {
                warn!(peer = %peer, error = %e, "malformed request");
                return reject(&mut writer, StatusCode::BadRequest).await;
            }
        };
        if content_length > config.max_body_bytes {
            warn!(peer = %peer, content_length, "request body too large");
            return reject(&mut writer, StatusCode::PayloadTooLarge).await;
        }

        let wants_keep_alive = head.is_keep_alive();
        let _ = buf.split_to(body_offset);

        let (chunks, body) = Body::channel(BODY_CHANNEL_CAPACITY);
        let request = Arc::new(Request::from_transport(
            head,
            peer,
            body,
            config.default_version,
        ));

        // The body is pumped into the request while the router runs; whoever
        // awaits the body drives the socket reads.
        let (response, body_consumed) = {
            let dispatch = listener.handle(request);
            let pump = pump_body(&mut reader, &mut buf, content_length, chunks);
            tokio::pin!(dispatch);
            tokio::pin!(pump);

            let mut pumping = true;
            let mut body_consumed = false;
            let response = loop {
                tokio::select! {
                    response = &mut dispatch => break response,
                    pumped = &mut pump, if pumping => {
                        pumping = false;
                        match pumped {
                            Ok(()) => body_consumed = true,
                            Err(e) => debug!(peer = %peer, error = %e, "request body stream failed"),
                        }
                    }
                }
            };
            (response, body_consumed)
        };

        // Connections finish their current request, then close once shutdown starts.
        let keep_alive = wants_keep_alive && body_consumed && !*shutdown.borrow();
        let response = response.keep_alive(keep_alive);
        debug!(peer = %peer, status = response.status().as_u16(), "writing response");
        writer.write_all(&response.into_bytes()).await?;
        writer.flush().await?;

        if !keep_alive {
            debug!(peer = %peer, "closing connection");
            return Ok(());
        }
    }
}

/// Moves `remaining` body bytes from the buffer and the socket into `chunks`.
///
/// Stops early with an error if the socket fails or closes; the same failure
/// is delivered to the body reader.
async fn pump_body(
    reader: &mut ReadHalf<'_>,
    buf: &mut BytesMut,
    mut remaining: usize,
    chunks: ChunkSender,
) -> io::Result<()> {
    while remaining > 0 {
        if buf.is_empty() {
            let read = match reader.read_buf(buf).await {
                Ok(0) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before the request body was complete",
                )),
                other => other,
            };
            if let Err(e) = read {
                let _ = chunks.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
                return Err(e);
            }
        }

        let take = remaining.min(buf.len());
        let chunk = buf.split_to(take).freeze();
        remaining -= take;
        // A dropped body still has to be drained off the socket.
        let _ = chunks.send(Ok(chunk)).await;
    }
    Ok(())
}

/// Answers an untrustworthy request with a bare status and closes.
async fn reject(writer: &mut WriteHalf<'_>, status: StatusCode) -> io::Result<()> {
    let response = EncodedResponse::new(status).keep_alive(false);
    writer.write_all(&response.into_bytes()).await?;
    writer.flush().await
}
