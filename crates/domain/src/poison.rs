use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;

/// Addresses commonly returned by forged replies on poisoned paths.
pub const BUILTIN_SENTINELS: &[&str] = &[
    "4.36.66.178",
    "8.7.198.45",
    "37.61.54.158",
    "46.82.174.68",
    "59.24.3.173",
    "64.33.88.161",
    "78.16.49.15",
    "93.46.8.89",
    "159.106.121.75",
    "203.98.7.65",
    "243.185.187.30",
    "243.185.187.39",
];

/// A blacklisted address or range. Bare addresses become host networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoisonFilterEntry(IpNetwork);

impl PoisonFilterEntry {
    pub fn network(&self) -> IpNetwork {
        self.0
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(ip)
    }
}

impl From<IpAddr> for PoisonFilterEntry {
    fn from(ip: IpAddr) -> Self {
        Self(IpNetwork::from(ip))
    }
}

impl FromStr for PoisonFilterEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<IpNetwork>()
            .map(Self)
            .map_err(|e| format!("Invalid poison entry '{}': {}", s, e))
    }
}

impl fmt::Display for PoisonFilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide, read-only after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoisonFilter {
    entries: Vec<PoisonFilterEntry>,
}

impl PoisonFilter {
    pub fn new(entries: Vec<PoisonFilterEntry>) -> Self {
        Self { entries }
    }

    pub fn builtin() -> Self {
        let entries = BUILTIN_SENTINELS
            .iter()
            .filter_map(|s| s.parse::<IpAddr>().ok())
            .map(PoisonFilterEntry::from)
            .collect();
        Self { entries }
    }

    pub fn extend(&mut self, other: PoisonFilter) {
        for entry in other.entries {
            if !self.entries.contains(&entry) {
                self.entries.push(entry);
            }
        }
    }

    pub fn is_poisoned(&self, ip: IpAddr) -> bool {
        self.entries.iter().any(|entry| entry.contains(ip))
    }

    pub fn entries(&self) -> &[PoisonFilterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
