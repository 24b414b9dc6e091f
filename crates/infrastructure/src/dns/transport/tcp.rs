//! TCP Transport for DNS queries (RFC 1035 §4.2.2)
//!
//! One connection per query. Connection refused or reset is reported to
//! the caller straight away; there is no retry.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use sans_domain::DomainError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_TCP_MESSAGE_SIZE: usize = 65535;

pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let server_addr = self.server_addr;

        let exchange = async {
            let mut stream = TcpStream::connect(server_addr)
                .await
                .map_err(|e| DomainError::transport(server_addr, e))?;
            stream
                .set_nodelay(true)
                .map_err(|e| DomainError::transport(server_addr, e))?;

            send_with_length_prefix(&mut stream, message_bytes, server_addr).await?;
            debug!(server = %server_addr, message_len = message_bytes.len(), "TCP query sent");

            read_with_length_prefix(&mut stream, server_addr).await
        };

        let response_bytes = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DomainError::timeout(server_addr))??;

        debug!(server = %server_addr, response_len = response_bytes.len(), "TCP response received");

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "TCP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
    server: SocketAddr,
) -> Result<(), DomainError>
where
    S: AsyncWriteExt + Unpin,
{
    if message_bytes.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(DomainError::Encode(format!(
            "query too large for TCP: {} bytes",
            message_bytes.len()
        )));
    }
    let length_bytes = (message_bytes.len() as u16).to_be_bytes();

    stream
        .write_all(&length_bytes)
        .await
        .map_err(|e| DomainError::transport(server, format!("failed to write length prefix: {e}")))?;
    stream
        .write_all(message_bytes)
        .await
        .map_err(|e| DomainError::transport(server, format!("failed to write DNS message: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| DomainError::transport(server, format!("failed to flush stream: {e}")))?;

    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(
    stream: &mut S,
    server: SocketAddr,
) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| DomainError::transport(server, format!("failed to read response length: {e}")))?;

    let response_len = u16::from_be_bytes(len_buf) as usize;

    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| DomainError::transport(server, format!("failed to read response body: {e}")))?;

    Ok(response)
}
