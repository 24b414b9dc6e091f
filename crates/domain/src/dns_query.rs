use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::domain_name;
use super::RecordType;

/// Where an inbound query came from, and therefore where its single
/// response must be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOrigin {
    Udp { peer: SocketAddr },
    Tcp { peer: SocketAddr, connection: u64 },
}

impl QueryOrigin {
    pub fn peer(&self) -> SocketAddr {
        match self {
            QueryOrigin::Udp { peer } | QueryOrigin::Tcp { peer, .. } => *peer,
        }
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, QueryOrigin::Udp { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub id: u16,
    /// Canonical form; see [`domain_name::canonicalize`].
    pub name: Arc<str>,
    pub record_type: RecordType,
    pub class: u16,
    pub origin: QueryOrigin,
    pub received_at: Instant,
}

impl Query {
    pub fn new(
        id: u16,
        name: &str,
        record_type: RecordType,
        class: u16,
        origin: QueryOrigin,
    ) -> Self {
        Self {
            id,
            name: domain_name::canonicalize(name).into(),
            record_type,
            class,
            origin,
            received_at: Instant::now(),
        }
    }

    pub fn is_reverse_lookup(&self) -> bool {
        domain_name::is_reverse_name(&self.name)
    }
}
