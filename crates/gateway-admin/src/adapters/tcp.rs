//! TCP transport with 4-byte big-endian length-prefixed frames.

use crate::domain::AdminError;
use crate::ports::{Connection, Connector};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::debug;

/// Default maximum frame length (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Dials gateway admin listeners over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    max_frame_len: usize,
}

impl TcpConnector {
    /// Connector accepting frames up to `max_frame_len` bytes.
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, AdminError> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(AdminError::Connect {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(AdminError::Connect {
                    address: address.to_string(),
                    reason: format!("timed out after {:?}", timeout),
                })
            }
        };
        stream.set_nodelay(true).map_err(|e| AdminError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        debug!(address, "tcp connected");
        Ok(Box::new(TcpConnection::new(stream, address, self.max_frame_len)))
    }
}

/// A framed TCP stream to one gateway.
pub struct TcpConnection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    remote: String,
    open: bool,
}

impl TcpConnection {
    /// Wrap an established stream.
    pub fn new(stream: TcpStream, remote: &str, max_frame_len: usize) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .big_endian()
            .max_frame_length(max_frame_len)
            .new_codec();
        Self {
            framed: Framed::new(stream, codec),
            remote: remote.to_string(),
            open: true,
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), AdminError> {
        self.framed.send(frame).await.map_err(|e| {
            self.open = false;
            AdminError::Network(format!("write to {} failed: {}", self.remote, e))
        })
    }

    async fn recv_frame(&mut self) -> Result<Bytes, AdminError> {
        // `Framed` buffers partial reads internally, so this is cancel-safe.
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame.freeze()),
            Some(Err(e)) => {
                self.open = false;
                Err(AdminError::Network(format!(
                    "read from {} failed: {}",
                    self.remote, e
                )))
            }
            None => {
                self.open = false;
                Err(AdminError::Network(format!(
                    "connection closed by {}",
                    self.remote
                )))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.framed.get_mut().shutdown().await;
        }
    }

    fn remote_addr(&self) -> &str {
        &self.remote
    }
}
