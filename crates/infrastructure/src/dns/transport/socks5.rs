//! DNS over TCP tunnelled through a SOCKS5 proxy (RFC 1928).
//!
//! Only the no-authentication method and CONNECT by IP address are used.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use sans_domain::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const REPLY_SUCCEEDED: u8 = 0x00;

pub struct Socks5Transport {
    proxy_addr: SocketAddr,
    server_addr: SocketAddr,
}

impl Socks5Transport {
    pub fn new(proxy_addr: SocketAddr, server_addr: SocketAddr) -> Self {
        Self {
            proxy_addr,
            server_addr,
        }
    }
}

#[async_trait]
impl DnsTransport for Socks5Transport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let server_addr = self.server_addr;
        let proxy_addr = self.proxy_addr;

        let exchange = async {
            let mut stream = TcpStream::connect(proxy_addr)
                .await
                .map_err(|e| DomainError::transport(proxy_addr, e))?;
            stream
                .set_nodelay(true)
                .map_err(|e| DomainError::transport(proxy_addr, e))?;

            connect_through(&mut stream, server_addr)
                .await
                .map_err(|reason| DomainError::transport(proxy_addr, reason))?;
            debug!(proxy = %proxy_addr, server = %server_addr, "SOCKS5 tunnel established");

            send_with_length_prefix(&mut stream, message_bytes, server_addr).await?;
            read_with_length_prefix(&mut stream, server_addr).await
        };

        let bytes = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DomainError::timeout(server_addr))??;

        Ok(TransportResponse {
            bytes,
            protocol_used: "SOCKS5",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "SOCKS5"
    }
}

/// Runs the method negotiation and CONNECT request on an open stream.
pub(crate) async fn connect_through<S>(stream: &mut S, target: SocketAddr) -> Result<(), String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[VERSION, 1, METHOD_NO_AUTH])
        .await
        .map_err(|e| format!("greeting failed: {e}"))?;

    let mut choice = [0u8; 2];
    stream
        .read_exact(&mut choice)
        .await
        .map_err(|e| format!("greeting reply failed: {e}"))?;
    if choice != [VERSION, METHOD_NO_AUTH] {
        return Err(format!(
            "proxy rejected no-auth method (reply {:#04x} {:#04x})",
            choice[0], choice[1]
        ));
    }

    let mut request = Vec::with_capacity(22);
    request.extend_from_slice(&[VERSION, CMD_CONNECT, 0x00]);
    match target.ip() {
        IpAddr::V4(v4) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&v6.octets());
        }
    }
    request.extend_from_slice(&target.port().to_be_bytes());
    stream
        .write_all(&request)
        .await
        .map_err(|e| format!("connect request failed: {e}"))?;

    let mut head = [0u8; 4];
    stream
        .read_exact(&mut head)
        .await
        .map_err(|e| format!("connect reply failed: {e}"))?;
    if head[0] != VERSION {
        return Err(format!("unexpected SOCKS version {:#04x}", head[0]));
    }
    if head[1] != REPLY_SUCCEEDED {
        return Err(format!("connect refused by proxy (code {})", head[1]));
    }

    // Bound address is not needed but must be drained.
    let remaining = match head[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .map_err(|e| format!("connect reply failed: {e}"))?;
            len[0] as usize + 2
        }
        other => return Err(format!("unknown address type {other:#04x}")),
    };
    let mut bound = vec![0u8; remaining];
    stream
        .read_exact(&mut bound)
        .await
        .map_err(|e| format!("connect reply failed: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handshake_sends_connect_by_ip() {
        let (mut client, mut proxy) = tokio::io::duplex(256);
        let target: SocketAddr = "8.8.4.4:53".parse().unwrap();

        let proxy_side = tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            assert_eq!(greeting, [0x05, 0x01, 0x00]);
            proxy.write_all(&[0x05, 0x00]).await.unwrap();

            let mut request = [0u8; 10];
            proxy.read_exact(&mut request).await.unwrap();
            assert_eq!(request, [0x05, 0x01, 0x00, 0x01, 8, 8, 4, 4, 0x00, 0x35]);
            proxy
                .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        connect_through(&mut client, target).await.unwrap();
        proxy_side.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connect_is_an_error() {
        let (mut client, mut proxy) = tokio::io::duplex(256);
        let target: SocketAddr = "[2001:4860:4860::8844]:53".parse().unwrap();

        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            proxy.write_all(&[0x05, 0x00]).await.unwrap();
            let mut request = [0u8; 22];
            proxy.read_exact(&mut request).await.unwrap();
            proxy
                .write_all(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await
                .unwrap();
        });

        let err = connect_through(&mut client, target).await.unwrap_err();
        assert!(err.contains("code 5"));
    }

    #[tokio::test]
    async fn test_auth_required_proxy_rejected() {
        let (mut client, mut proxy) = tokio::io::duplex(64);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            proxy.write_all(&[0x05, 0xff]).await.unwrap();
        });

        let err = connect_through(&mut client, "1.1.1.1:53".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.contains("no-auth"));
    }
}
