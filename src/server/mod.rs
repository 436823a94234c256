//! Control Socket Server
//!
//! Exposes the broker's control surface on a Unix domain socket.
//!
//! ```text
//! ControlServer
//!   └─> accept loop (tokio)
//!         └─> per connection
//!               ├─> reader: JSON line → Request
//!               │     └─> spawn_blocking: with_calling_identity(peer) → dispatcher
//!               ├─> ConnectionCallback (subscriber, weakly held by the service)
//!               └─> writer task: responses + event frames, one per line
//! ```
//!
//! # Caller identity
//!
//! The peer's socket credentials (uid, pid) become the ambient caller
//! identity for the blocking task that runs the request. The dispatcher
//! clears it before any controller code runs.

pub mod protocol;

pub use protocol::{ErrorKind, EventFrame, Request, Response};

use std::future::Future;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::service::identity::with_calling_identity;
use crate::service::{ActionCallback, BuiltInService, CallbackError, CallerIdentity, ServiceEvent};

/// Outbound lines buffered per connection before events are dropped
const OUTBOUND_QUEUE: usize = 64;

/// Longest accepted request line, excluding the newline
pub const MAX_REQUEST_LINE: usize = 64 * 1024;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Socket could not be bound
    #[error("Failed to bind control socket {path}: {source}")]
    Bind {
        /// Socket path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Connection I/O failed
    #[error("Control socket I/O error: {0}")]
    Io(#[from] io::Error),

    /// Frame could not be encoded
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// Controllers have not been started yet
    #[error("Refusing to open control socket: controllers not started")]
    NotStarted,
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Unix socket front end for [`BuiltInService`]
pub struct ControlServer {
    service: Arc<BuiltInService>,
    socket_path: PathBuf,
}

impl ControlServer {
    /// Create a server for `service` at `socket_path`
    pub fn new(service: Arc<BuiltInService>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            socket_path: socket_path.into(),
        }
    }

    /// Socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one left by a previous run
    ///
    /// Fails with [`ServerError::NotStarted`] until the service has started
    /// its controllers. An existing path is only removed when it is a socket
    /// nobody is listening on; a live socket or any other file is left alone.
    pub fn bind(&self) -> Result<UnixListener> {
        if !self.service.dispatcher().is_started() {
            return Err(ServerError::NotStarted);
        }

        let path = &self.socket_path;
        let bind_err = |source| ServerError::Bind {
            path: path.clone(),
            source,
        };

        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => {
                match std::os::unix::net::UnixStream::connect(path) {
                    Ok(_) => {
                        return Err(bind_err(io::Error::new(
                            io::ErrorKind::AddrInUse,
                            "another broker is listening on this socket",
                        )));
                    }
                    Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                        debug!(path = %path.display(), "Removing stale control socket");
                        std::fs::remove_file(path).map_err(bind_err)?;
                    }
                    Err(e) => return Err(bind_err(e)),
                }
            }
            Ok(_) => {
                return Err(bind_err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "path exists and is not a socket",
                )));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(bind_err(e)),
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(path).map_err(bind_err)?;
        info!(path = %path.display(), "Control socket listening");
        Ok(listener)
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Removes the socket file on return.
    pub async fn serve(
        self,
        listener: UnixListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let service = self.service;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Control socket shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, service).await {
                                warn!("Control connection ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Control socket accept failed: {}", e),
                },
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!(path = %self.socket_path.display(), "Socket cleanup skipped: {}", e);
        }
        Ok(())
    }

    /// [`bind`](Self::bind) then [`serve`](Self::serve)
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener, shutdown).await
    }
}

/// One inbound request line
enum Inbound {
    Line(String),
    Oversized,
    Closed,
}

/// Read one newline-terminated line of at most [`MAX_REQUEST_LINE`] bytes
///
/// The remainder of an oversized line is read and discarded in bounded
/// chunks so the connection stays usable.
async fn read_request_line<R>(reader: &mut R) -> io::Result<Inbound>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_REQUEST_LINE as u64 + 1;
    let mut buf = Vec::new();

    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(Inbound::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.len() <= MAX_REQUEST_LINE {
        return Ok(Inbound::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            return Ok(Inbound::Oversized);
        }
    }
}

/// Subscriber forwarding service events to one connection
struct ConnectionCallback {
    tx: mpsc::Sender<String>,
}

impl ActionCallback for ConnectionCallback {
    fn on_event(&self, event: &ServiceEvent) -> std::result::Result<(), CallbackError> {
        let frame = EventFrame { event: *event };
        let line =
            serde_json::to_string(&frame).map_err(|e| CallbackError::Rejected(e.to_string()))?;
        self.tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                CallbackError::Rejected("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => CallbackError::Disconnected,
        })
    }
}

fn peer_identity(stream: &UnixStream) -> CallerIdentity {
    match stream.peer_cred() {
        Ok(cred) => CallerIdentity::Peer {
            uid: cred.uid(),
            pid: cred.pid(),
        },
        Err(e) => {
            warn!("Peer credentials unavailable: {}", e);
            CallerIdentity::Peer {
                uid: u32::MAX,
                pid: None,
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, service: Arc<BuiltInService>) -> Result<()> {
    let identity = peer_identity(&stream);
    info!(%identity, "Control client connected");

    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.shutdown().await
    });

    let callback: Arc<dyn ActionCallback> = Arc::new(ConnectionCallback { tx: tx.clone() });
    let mut reader = BufReader::new(reader);

    let outcome = async {
        loop {
            let response = match read_request_line(&mut reader).await? {
                Inbound::Closed => break,
                Inbound::Oversized => {
                    debug!(%identity, "Request line too long");
                    Response::error(
                        ErrorKind::BadRequest,
                        format!("request line exceeds {} bytes", MAX_REQUEST_LINE),
                    )
                }
                Inbound::Line(line) if line.trim().is_empty() => continue,
                Inbound::Line(line) => handle_request(&line, identity, &service, &callback).await,
            };
            let encoded = serde_json::to_string(&response)?;
            if tx.send(encoded).await.is_err() {
                debug!(%identity, "Writer closed, dropping connection");
                break;
            }
        }
        Ok::<_, ServerError>(())
    }
    .await;

    service.dispatcher().remove_callback(&callback);
    drop(callback);
    drop(tx);

    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%identity, "Writer stopped: {}", e),
        Err(e) => warn!(%identity, "Writer task failed: {}", e),
    }
    info!(%identity, "Control client disconnected");
    outcome
}

async fn handle_request(
    line: &str,
    identity: CallerIdentity,
    service: &Arc<BuiltInService>,
    callback: &Arc<dyn ActionCallback>,
) -> Response {
    let request = match serde_json::from_str::<Request>(line) {
        Ok(request) => request,
        Err(e) => {
            debug!(%identity, "Malformed request: {}", e);
            return Response::error(ErrorKind::BadRequest, e.to_string());
        }
    };

    match request {
        Request::PerformAction {
            controller,
            action,
            args,
        } => {
            let service = Arc::clone(service);
            let task = tokio::task::spawn_blocking(move || {
                with_calling_identity(identity, || {
                    service.perform_action(&controller, &action, &args)
                })
            });
            match task.await {
                Ok(Ok(result)) => Response::result(result),
                Ok(Err(e)) => {
                    debug!(%identity, "Action refused: {}", e);
                    e.into()
                }
                Err(e) => {
                    error!(%identity, "Action task failed: {}", e);
                    Response::error(ErrorKind::Internal, e.to_string())
                }
            }
        }
        Request::AddCallback => {
            service.dispatcher().add_callback(callback);
            Response::ok()
        }
        Request::RemoveCallback => {
            service.dispatcher().remove_callback(callback);
            Response::ok()
        }
    }
}
