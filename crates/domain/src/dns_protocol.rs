use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

pub const DEFAULT_DNS_PORT: u16 = 53;

/// A single resolver address together with the transport used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamEndpoint {
    Udp { addr: SocketAddr },
    Tcp { addr: SocketAddr },
}

impl UpstreamEndpoint {
    pub fn socket_addr(&self) -> SocketAddr {
        match self {
            UpstreamEndpoint::Udp { addr } | UpstreamEndpoint::Tcp { addr } => *addr,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            UpstreamEndpoint::Udp { .. } => "UDP",
            UpstreamEndpoint::Tcp { .. } => "TCP",
        }
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, UpstreamEndpoint::Udp { .. })
    }

    /// Same address reached over TCP. Used for truncated UDP replies.
    pub fn as_tcp(&self) -> Self {
        UpstreamEndpoint::Tcp {
            addr: self.socket_addr(),
        }
    }
}

fn parse_socket_addr(s: &str) -> Option<SocketAddr> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    // Bare IPs, including unbracketed IPv6, default to port 53.
    s.parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, DEFAULT_DNS_PORT))
}

impl FromStr for UpstreamEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(addr_str) = s.strip_prefix("udp://") {
            let addr = parse_socket_addr(addr_str)
                .ok_or_else(|| format!("Invalid UDP address '{}'", addr_str))?;
            return Ok(UpstreamEndpoint::Udp { addr });
        }
        if let Some(addr_str) = s.strip_prefix("tcp://") {
            let addr = parse_socket_addr(addr_str)
                .ok_or_else(|| format!("Invalid TCP address '{}'", addr_str))?;
            return Ok(UpstreamEndpoint::Tcp { addr });
        }
        if s.contains("://") {
            return Err(format!(
                "Unsupported upstream scheme in '{}'. Expected 'udp://' or 'tcp://'",
                s
            ));
        }
        parse_socket_addr(s)
            .map(|addr| UpstreamEndpoint::Udp { addr })
            .ok_or_else(|| {
                format!(
                    "Invalid upstream '{}'. Expected 'udp://IP:PORT', 'tcp://IP:PORT', 'IP:PORT' or 'IP'",
                    s
                )
            })
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamEndpoint::Udp { addr } => write!(f, "udp://{}", addr),
            UpstreamEndpoint::Tcp { addr } => write!(f, "tcp://{}", addr),
        }
    }
}
