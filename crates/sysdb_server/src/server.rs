//! Main coordinator server.
//!
//! Requests arrive as newline-delimited JSON frames:
//!
//! ```text
//! {"method": "GetTenant", "request": {"id": "t1"}, "admin_token": null}
//! ```
//!
//! and each is answered with exactly one line, either `{"ok": <response>}`
//! or `{"error": {"code": "NOT_FOUND", "message": "..."}}`. Frames on one
//! connection are answered in order.

use crate::auth::AdminAuth;
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ServerError, ServerResult, StatusCode};
use crate::handler::{CallContext, RequestHandler};
use crate::messages::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sysdb_core::SysDb;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// RPC name.
    pub method: String,
    /// RPC request body.
    #[serde(default)]
    pub request: Value,
    /// Hex admin token for privileged methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

/// Error half of a response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Status code.
    pub code: StatusCode,
    /// Human-readable message.
    pub message: String,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseFrame {
    /// Successful response.
    Ok {
        /// RPC response body.
        ok: Value,
    },
    /// Failed request.
    Error {
        /// What went wrong.
        error: ErrorBody,
    },
}

impl ResponseFrame {
    fn from_result(result: ServerResult<Value>) -> Self {
        match result {
            Ok(ok) => Self::Ok { ok },
            Err(e) => Self::Error {
                error: ErrorBody {
                    code: e.status(),
                    message: e.to_string(),
                },
            },
        }
    }
}

/// The coordinator server.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use std::sync::Arc;
/// use sysdb_core::{SysDb, SysDbConfig};
/// use sysdb_server::{CoordinatorServer, ServerConfig};
///
/// let db = Arc::new(SysDb::open_in_memory(SysDbConfig::default()).unwrap());
/// let server = CoordinatorServer::new(db, ServerConfig::default());
///
/// let response = server
///     .handle_request("CreateTenant", json!({"id": "t1"}), None)
///     .unwrap();
/// assert_eq!(response["tenant"]["id"], "t1");
/// ```
pub struct CoordinatorServer {
    handler: RequestHandler,
    dispatcher: Dispatcher,
    auth: Option<AdminAuth>,
    config: ServerConfig,
}

impl CoordinatorServer {
    /// Creates a new server over `db`.
    pub fn new(db: Arc<SysDb>, config: ServerConfig) -> Self {
        let auth = config.auth.clone().map(AdminAuth::new);
        Self {
            handler: RequestHandler::new(db, config.clone()),
            dispatcher: Dispatcher::coordinator(),
            auth,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the coordinator.
    pub fn db(&self) -> &Arc<SysDb> {
        self.handler.db()
    }

    /// Handles one decoded request.
    pub fn handle_request(
        &self,
        method: &str,
        request: Value,
        admin_token: Option<&str>,
    ) -> ServerResult<Value> {
        let ctx = self.authorize(method, admin_token)?;
        self.dispatcher.dispatch(&self.handler, method, request, &ctx)
    }

    /// Handles one request line.
    pub fn handle_frame(&self, line: &str) -> ResponseFrame {
        let result = serde_json::from_str::<RequestFrame>(line)
            .map_err(ServerError::from)
            .and_then(|frame| {
                let result =
                    self.handle_request(&frame.method, frame.request, frame.admin_token.as_deref());
                match &result {
                    Ok(_) => debug!(method = %frame.method, "request ok"),
                    Err(e) if e.is_client_error() => {
                        debug!(method = %frame.method, status = %e.status(), error = %e, "request rejected");
                    }
                    Err(e) => warn!(method = %frame.method, status = %e.status(), error = %e, "request failed"),
                }
                result
            });
        ResponseFrame::from_result(result)
    }

    fn authorize(&self, method: &str, token: Option<&str>) -> ServerResult<CallContext> {
        let privileged = method.parse::<Method>().is_ok_and(Method::requires_admin);
        let Some(token) = token else {
            return Ok(CallContext::anonymous());
        };
        let Some(auth) = &self.auth else {
            if privileged {
                return Err(ServerError::NotAuthorized(
                    "admin tokens are not enabled on this server".into(),
                ));
            }
            return Ok(CallContext::anonymous());
        };
        match auth.verify(token) {
            Ok(cap) => Ok(CallContext::admin(cap)),
            Err(e) if privileged => {
                warn!(%method, error = %e, "rejected admin token");
                Err(e)
            }
            Err(_) => Ok(CallContext::anonymous()),
        }
    }

    /// Serves connections from `listener` until the task is dropped.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> ServerResult<()> {
        self.serve_until(listener, std::future::pending()).await
    }

    /// Serves connections from `listener` until `shutdown` completes.
    ///
    /// Connections above `max_connections` receive a single
    /// `RESOURCE_EXHAUSTED` frame and are closed. Failed accepts are logged
    /// and never end the loop.
    pub async fn serve_until(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        info!(addr = ?listener.local_addr().ok(), max_connections = self.config.max_connections, "coordinator listening");
        let listener = &listener;
        self.accept_loop(move || listener.accept(), shutdown).await
    }

    async fn accept_loop<A, F>(
        self: Arc<Self>,
        mut accept: A,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()>
    where
        A: FnMut() -> F,
        F: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
    {
        let permits = Arc::new(Semaphore::new(self.config.max_connections));
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                () = &mut shutdown => {
                    info!("coordinator shutting down");
                    return Ok(());
                }
                accepted = accept() => accepted,
            };
            let (mut stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    let pause = accept_backoff(&e);
                    warn!(error = %e, ?pause, "accept failed");
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    continue;
                }
            };

            let Ok(permit) = permits.clone().try_acquire_owned() else {
                warn!(%peer, "connection limit reached");
                let frame = ResponseFrame::from_result(Err(ServerError::Overloaded(
                    self.config.max_connections,
                )));
                let _ = write_frame(&mut stream, &frame).await;
                continue;
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer).await {
                    debug!(%peer, error = %e, "connection closed with error");
                }
                drop(permit);
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) -> ServerResult<()> {
        debug!(%peer, "connection opened");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut buf = Vec::new();
        let limit = self.config.max_frame_bytes;

        loop {
            let line = match read_frame(&mut reader, &mut buf, limit).await? {
                FrameRead::Eof => {
                    debug!(%peer, "connection closed");
                    return Ok(());
                }
                FrameRead::TooLong => {
                    warn!(%peer, limit, "oversized frame");
                    let frame = ResponseFrame::from_result(Err(ServerError::InvalidRequest(
                        format!("frame exceeds limit of {limit} bytes"),
                    )));
                    write_frame(&mut write_half, &frame).await?;
                    continue;
                }
                FrameRead::Line => match std::str::from_utf8(&buf) {
                    Ok(line) => line,
                    Err(e) => {
                        let frame = ResponseFrame::from_result(Err(ServerError::InvalidRequest(
                            format!("frame is not UTF-8: {e}"),
                        )));
                        write_frame(&mut write_half, &frame).await?;
                        continue;
                    }
                },
            };
            if line.trim().is_empty() {
                continue;
            }

            let server = Arc::clone(&self);
            let request = line.to_string();
            let timeout = self.config.request_timeout;
            let work = tokio::task::spawn_blocking(move || server.handle_frame(&request));
            let frame = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(join)) => ResponseFrame::from_result(Err(ServerError::Internal(
                    format!("request task failed: {join}"),
                ))),
                Err(_) => ResponseFrame::from_result(Err(ServerError::Timeout(timeout))),
            };
            write_frame(&mut write_half, &frame).await?;
        }
    }
}

impl std::fmt::Debug for CoordinatorServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorServer")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// How long to stop accepting after a failure that is not specific to one
/// connection, such as running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

fn accept_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => ACCEPT_BACKOFF,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum FrameRead {
    Eof,
    Line,
    TooLong,
}

/// Reads one newline-terminated frame into `buf`, buffering at most
/// `limit + 1` bytes. The rest of an oversized frame is discarded.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<FrameRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let n = (&mut *reader).take(cap).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(FrameRead::Eof);
    }
    if n <= limit {
        return Ok(FrameRead::Line);
    }
    if buf.last() != Some(&b'\n') {
        skip_line(reader).await?;
    }
    buf.clear();
    Ok(FrameRead::TooLong)
}

async fn skip_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &ResponseFrame) -> ServerResult<()>
where
    W: AsyncWriteExt + Unpin,
{
    let mut bytes = serde_json::to_vec(frame)
        .map_err(|e| ServerError::Internal(format!("encoding frame: {e}")))?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
