//! JSON-RPC over a minimal HTTP/1.1 listener.
//!
//! One request per connection: read the headers and a `Content-Length` body,
//! dispatch, write the response and close.

use super::handler::RpcHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

pub struct RpcServer {
    listener: TcpListener,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub async fn bind(addr: &str, handler: Arc<RpcHandler>) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, handler })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        info!("✅ RPC server listening on {}", self.listener.local_addr()?);

        loop {
            let (socket, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("🛑 RPC server stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("RPC accept failed: {}", e);
                        continue;
                    }
                },
            };

            let handler = self.handler.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, handler).await {
                    debug!("RPC connection from {} failed: {}", peer, e);
                }
            });
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    handler: Arc<RpcHandler>,
) -> Result<(), std::io::Error> {
    let body = match read_http_body(&mut socket).await? {
        Some(body) => body,
        None => return Ok(()),
    };

    let response = if body.trim().is_empty() {
        RpcResponse::failure(
            Value::Null,
            RpcError {
                code: -32700,
                message: "No request body".to_string(),
            },
        )
    } else {
        match serde_json::from_str::<RpcRequest>(&body) {
            Ok(request) => handler.handle_request(request).await,
            Err(e) => RpcResponse::failure(
                Value::Null,
                RpcError {
                    code: -32700,
                    message: format!("Parse error: {}", e),
                },
            ),
        }
    };

    let response_json = serde_json::to_string(&response)?;
    let http_response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        response_json.len(),
        response_json
    );

    socket.write_all(http_response.as_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

/// Read one HTTP request and return its body. `None` if the client closed
/// before sending anything.
async fn read_http_body(socket: &mut TcpStream) -> Result<Option<String>, std::io::Error> {
    let mut buffer = Vec::with_capacity(8192);
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            // No header terminator; treat whatever arrived as the body
            return Ok(Some(String::from_utf8_lossy(&buffer).into_owned()));
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buffer) {
            break pos;
        }
        if buffer.len() > MAX_REQUEST_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request headers too large",
            ));
        }
    };

    let headers = String::from_utf8_lossy(&buffer[..header_end.0]).into_owned();
    let body_start = header_end.0 + header_end.1;
    let content_length = content_length(&headers).unwrap_or(buffer.len() - body_start);
    if content_length > MAX_REQUEST_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "request body too large",
        ));
    }

    while buffer.len() - body_start < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let body_end = (body_start + content_length).min(buffer.len());
    Ok(Some(
        String::from_utf8_lossy(&buffer[body_start..body_end]).into_owned(),
    ))
}

/// Position and length of the blank line ending the headers
fn find_header_end(buffer: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, 4));
    }
    buffer.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2))
}

fn content_length(headers: &str) -> Option<usize> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
