pub mod socks5;
pub mod tcp;
pub mod udp;

use async_trait::async_trait;
use sans_domain::{DomainError, UpstreamEndpoint};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug)]
pub struct TransportResponse {
    pub bytes: Vec<u8>,

    pub protocol_used: &'static str,
}

#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError>;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Udp(udp::UdpTransport),
    Tcp(tcp::TcpTransport),
    Socks5(socks5::Socks5Transport),
}

impl Transport {
    pub async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        match self {
            Self::Udp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Tcp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Socks5(t) => DnsTransport::send(t, message_bytes, timeout).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(_) => "UDP",
            Self::Tcp(_) => "TCP",
            Self::Socks5(_) => "SOCKS5",
        }
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, Self::Udp(_))
    }
}

/// Picks the transport for one endpoint. A proxied group sends everything
/// over TCP through the proxy, UDP endpoints included.
pub fn create_transport(
    endpoint: &UpstreamEndpoint,
    socks5: Option<SocketAddr>,
    udp_retransmit: Duration,
) -> Transport {
    match (socks5, endpoint) {
        (Some(proxy), endpoint) => Transport::Socks5(socks5::Socks5Transport::new(
            proxy,
            endpoint.socket_addr(),
        )),
        (None, UpstreamEndpoint::Udp { addr }) => {
            Transport::Udp(udp::UdpTransport::new(*addr).with_retransmit(udp_retransmit))
        }
        (None, UpstreamEndpoint::Tcp { addr }) => Transport::Tcp(tcp::TcpTransport::new(*addr)),
    }
}

/// Reads the transaction id from raw message bytes.
pub(crate) fn message_id(bytes: &[u8]) -> Option<u16> {
    match bytes {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETRANSMIT: Duration = Duration::from_millis(800);

    #[test]
    fn test_transport_follows_endpoint_protocol() {
        let udp: UpstreamEndpoint = "udp://114.114.114.114:53".parse().unwrap();
        let tcp: UpstreamEndpoint = "tcp://8.8.4.4:53".parse().unwrap();
        assert_eq!(create_transport(&udp, None, RETRANSMIT).protocol_name(), "UDP");
        assert_eq!(create_transport(&tcp, None, RETRANSMIT).protocol_name(), "TCP");
    }

    #[test]
    fn test_proxied_group_always_uses_socks5() {
        let proxy: SocketAddr = "127.0.0.1:1080".parse().unwrap();
        let udp: UpstreamEndpoint = "8.8.8.8".parse().unwrap();
        let transport = create_transport(&udp, Some(proxy), RETRANSMIT);
        assert_eq!(transport.protocol_name(), "SOCKS5");
        assert!(!transport.is_udp());
    }

    #[test]
    fn test_message_id() {
        assert_eq!(message_id(&[0xbe, 0xef, 0x01]), Some(0xbeef));
        assert_eq!(message_id(&[0x01]), None);
    }
}
