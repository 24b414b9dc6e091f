//! UDP Transport for DNS queries (RFC 1035 §4.2.1)
//!
//! Every send binds its own ephemeral socket, so concurrent queries to the
//! same upstream never share a receive path. Datagrams from an unexpected
//! source or carrying a different transaction id are ignored. If nothing
//! valid arrives within the retransmit wait, the query is sent once more
//! before the timeout is declared.

use super::{message_id, DnsTransport, TransportResponse};
use async_trait::async_trait;
use sans_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Maximum UDP DNS response size with EDNS(0)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub const DEFAULT_RETRANSMIT: Duration = Duration::from_millis(800);

/// DNS over UDP transport
pub struct UdpTransport {
    server_addr: SocketAddr,
    retransmit: Duration,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            retransmit: DEFAULT_RETRANSMIT,
        }
    }

    pub fn with_retransmit(mut self, retransmit: Duration) -> Self {
        self.retransmit = retransmit;
        self
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    async fn transmit(&self, socket: &UdpSocket, message_bytes: &[u8]) -> Result<(), DomainError> {
        let bytes_sent = socket
            .send_to(message_bytes, self.server_addr)
            .await
            .map_err(|e| DomainError::transport(self.server_addr, e))?;
        debug!(server = %self.server_addr, bytes_sent, "UDP query sent");
        Ok(())
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let expected_id = message_id(message_bytes)
            .ok_or_else(|| DomainError::Encode("query shorter than a header".to_string()))?;

        // Bind to ephemeral port (0 = OS assigns)
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| DomainError::transport(self.server_addr, e))?;

        let started = Instant::now();
        let deadline = started + timeout;
        // Never let the retransmit consume more than half the budget.
        let retransmit_at = started + self.retransmit.min(timeout / 2);
        let mut retransmitted = false;

        self.transmit(&socket, message_bytes).await?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let wake = if retransmitted {
                deadline
            } else {
                retransmit_at
            };

            match tokio::time::timeout_at(wake, socket.recv_from(&mut recv_buf)).await {
                Ok(Ok((bytes_received, from_addr))) => {
                    if from_addr != self.server_addr {
                        warn!(
                            expected = %self.server_addr,
                            received_from = %from_addr,
                            "UDP response from unexpected source"
                        );
                        continue;
                    }
                    if message_id(&recv_buf[..bytes_received]) != Some(expected_id) {
                        debug!(server = %self.server_addr, "Ignoring UDP response with foreign id");
                        continue;
                    }

                    debug!(server = %self.server_addr, bytes_received, "UDP response received");
                    return Ok(TransportResponse {
                        bytes: recv_buf[..bytes_received].to_vec(),
                        protocol_used: "UDP",
                    });
                }
                Ok(Err(e)) => return Err(DomainError::transport(self.server_addr, e)),
                Err(_) if !retransmitted && Instant::now() < deadline => {
                    debug!(server = %self.server_addr, "Retransmitting UDP query");
                    retransmitted = true;
                    self.transmit(&socket, message_bytes).await?;
                }
                Err(_) => return Err(DomainError::timeout(self.server_addr)),
            }
        }
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
