//! Provisioning HTTP server.
//!
//! A minimal request router: one spawned task per accepted connection, no
//! connection reuse. Any unmatched GET degrades into the root handler so
//! every captive-portal probe path lands on the provisioning page.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use provlink_protocol::http::{
    parse_form, parse_header_line, parse_request_line, text_response, Method, Request,
};

/// Bound on request bodies; a provisioning form is tiny.
const MAX_BODY_LEN: usize = 8 * 1024;

/// An async route handler returning a full raw HTTP response.
pub type RouteHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Vec<u8>> + Send + Sync>;

/// Minimal HTTP server with a `(path, method) -> handler` route table.
///
/// Routes are registered before `start`; keys are unique and insertion
/// order is irrelevant. `stop` is idempotent and safe when never started.
pub struct ProvisioningServer {
    routes: HashMap<(String, Method), RouteHandler>,
    local_addr: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl ProvisioningServer {
    /// Create a stopped server with an empty route table.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            local_addr: None,
            task: None,
        }
    }

    /// Register a handler for a path and method.
    pub fn add_route(&mut self, path: &str, method: Method, handler: RouteHandler) {
        self.routes.insert((path.to_string(), method), handler);
    }

    /// Bind the listener and start serving connections.
    ///
    /// Starting an already-running server is a no-op.
    pub async fn start(&mut self, addr: SocketAddr) -> io::Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!("provisioning server listening on {}", local_addr);

        let routes = Arc::new(self.routes.clone());
        self.task = Some(tokio::spawn(async move {
            accept_loop(listener, routes).await;
        }));
        Ok(())
    }

    /// Stop the server. Idempotent; a no-op if never started.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.local_addr = None;
            info!("provisioning server stopped");
        }
    }

    /// Whether the server task is running.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Bound address while running (tests bind port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Default for ProvisioningServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProvisioningServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(listener: TcpListener, routes: Arc<HashMap<(String, Method), RouteHandler>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let routes = routes.clone();
                tokio::spawn(async move {
                    // Per-connection errors never affect other connections.
                    if let Err(err) = handle_connection(stream, routes).await {
                        debug!("connection from {} dropped: {}", peer, err);
                    }
                });
            }
            Err(err) => {
                error!("accept failed: {}", err);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

/// Read, parse, route, respond, close.
async fn handle_connection(
    stream: TcpStream,
    routes: Arc<HashMap<(String, Method), RouteHandler>>,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    // Empty or malformed request line: abort the connection silently.
    let Ok((method, path)) = parse_request_line(&request_line) else {
        return Ok(());
    };

    let mut headers = HashMap::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 || line == "\r\n" || line == "\n" {
            break;
        }
        if let Some((key, value)) = parse_header_line(&line) {
            if key == "content-length" {
                content_length = value.parse().unwrap_or(0);
            }
            headers.insert(key, value);
        }
    }

    let mut body = String::new();
    if method == Method::Post && content_length > 0 {
        if content_length > MAX_BODY_LEN {
            return Ok(());
        }
        let mut buf = vec![0u8; content_length];
        reader.read_exact(&mut buf).await?;
        body = String::from_utf8_lossy(&buf).into_owned();
    }

    let params = if body.is_empty() {
        HashMap::new()
    } else {
        parse_form(&body)
    };

    let request = Request {
        method: method.clone(),
        path: path.clone(),
        headers,
        body,
        params,
    };

    // Captive-portal fallback: any unknown GET resolves to the root page.
    let handler = routes.get(&(path, method.clone())).or_else(|| {
        if method == Method::Get {
            routes.get(&("/".to_string(), Method::Get))
        } else {
            None
        }
    });

    let response = match handler {
        Some(handler) => handler(request).await,
        None => text_response(404, "Not Found", "Not Found"),
    };

    write_half.write_all(&response).await?;
    write_half.flush().await?;
    write_half.shutdown().await.ok();
    Ok(())
}
