// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health probe for the supervised runtime.
//!
//! Sends a plain HTTP/1.1 `GET` over TCP and reads the response using
//! Content-Length framing (does not depend on connection close for EOF).

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Per-probe budget covering connect + write + read.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bodies are read up to this many bytes whatever Content-Length claims.
const MAX_BODY: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request to {addr} timed out")]
    Timeout { addr: SocketAddr },
    #[error("{op} failed: {source}")]
    Io { op: &'static str, source: std::io::Error },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// `true` when `GET /health` on the loopback port answers 2xx.
pub async fn is_healthy(port: u16) -> bool {
    get(SocketAddr::from(([127, 0, 0, 1], port)), "/health").await.is_ok()
}

/// `GET path` on `addr`, returning the body of a non-error response.
pub async fn get(addr: SocketAddr, path: &str) -> Result<String, ProbeError> {
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    tokio::time::timeout(PROBE_TIMEOUT, send_request(addr, &request))
        .await
        .map_err(|_| ProbeError::Timeout { addr })?
}

async fn send_request(addr: SocketAddr, request: &str) -> Result<String, ProbeError> {
    let mut stream =
        TcpStream::connect(addr).await.map_err(|source| ProbeError::Io { op: "connect", source })?;
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|source| ProbeError::Io { op: "write", source })?;

    let mut reader = BufReader::new(&mut stream);
    read_http_response(&mut reader).await
}

/// Read and parse an HTTP/1.1 response from a buffered stream.
pub(crate) async fn read_http_response<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<String, ProbeError> {
    let mut status_line = String::new();
    reader
        .read_line(&mut status_line)
        .await
        .map_err(|source| ProbeError::Io { op: "read status", source })?;

    let status =
        status_line.split_whitespace().nth(1).and_then(|s| s.parse::<u16>().ok()).unwrap_or(0);

    // Content-Length is matched case-insensitively
    let mut content_length: usize = 0;
    loop {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .await
            .map_err(|source| ProbeError::Io { op: "read header", source })?;
        if line == "\r\n" || line.is_empty() {
            break;
        }
        let line_lower = line.to_ascii_lowercase();
        if let Some(val) = line_lower.strip_prefix("content-length:") {
            content_length = val.trim().parse().unwrap_or(0);
        }
    }

    let body = if content_length > 0 {
        let limit = content_length.min(MAX_BODY);
        let mut buf = Vec::with_capacity(limit);
        // A short body (peer closed early) is kept as-is
        (&mut *reader)
            .take(limit as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|source| ProbeError::Io { op: "read body", source })?;
        String::from_utf8_lossy(&buf).into_owned()
    } else {
        String::new()
    };

    if !(200..300).contains(&status) {
        return Err(ProbeError::Status { status, body: body.trim().to_string() });
    }
    Ok(body)
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
