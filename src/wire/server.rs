//! TCP server for the decision service.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use super::protocol::{self, CheckResponse, MAX_LINE_BYTES};
use super::service::DecisionService;
use crate::error::{FloodgateError, Result};

/// Serves newline-delimited JSON check requests over TCP.
pub struct DecisionServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared request handler
    service: Arc<DecisionService>,
}

impl DecisionServer {
    /// Create a new decision server.
    pub fn new(addr: SocketAddr, service: Arc<DecisionService>) -> Self {
        Self { addr, service }
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind decision server");
            e
        })?;

        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    ///
    /// Connections still open at shutdown are left to finish on their own.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            addr = %listener.local_addr()?,
            limiters = ?self.service.registry().names(),
            "Starting decision server"
        );

        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("Decision server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let service = self.service.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(service, stream, peer).await {
                                    debug!(peer = %peer, error = %e, "Connection closed with error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection(
    service: Arc<DecisionService>,
    stream: TcpStream,
    peer: SocketAddr,
) -> Result<()> {
    debug!(peer = %peer, "Accepted connection");

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        // Room for a full line plus "\r\n"
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64 + 2)
            .read_until(b'\n', &mut buf)
            .await?;

        if read == 0 {
            break;
        }

        let line = strip_line_ending(&buf);
        if line.len() > MAX_LINE_BYTES {
            warn!(peer = %peer, "Request line too long, closing connection");
            let response = CheckResponse::error(format!(
                "request line exceeds {} bytes",
                MAX_LINE_BYTES
            ));
            write_half
                .write_all(protocol::encode_line(&response)?.as_bytes())
                .await?;
            break;
        }

        let response = match std::str::from_utf8(line) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => service.handle_line(peer, line.trim()),
            Err(e) => {
                let e =
                    FloodgateError::Protocol(format!("request line is not valid UTF-8: {}", e));
                warn!(peer = %peer, error = %e, "Rejecting decision request");
                CheckResponse::error(e.to_string())
            }
        };

        write_half
            .write_all(protocol::encode_line(&response)?.as_bytes())
            .await?;
    }

    debug!(peer = %peer, "Connection closed");
    Ok(())
}

fn strip_line_ending(buf: &[u8]) -> &[u8] {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    line.strip_suffix(b"\r").unwrap_or(line)
}
