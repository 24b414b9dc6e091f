//! Canonical domain-name handling.
//!
//! Every comparison in the proxy happens on the canonical form: ASCII
//! lowercase, no trailing dot. The root name is the empty string.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const IPV4_REVERSE_SUFFIX: &str = "in-addr.arpa";
const IPV6_REVERSE_SUFFIX: &str = "ip6.arpa";

pub fn canonicalize(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

/// Labels from the rightmost (TLD) to the leftmost.
pub fn reversed_labels(canonical: &str) -> impl Iterator<Item = &str> {
    canonical.rsplit('.').filter(|label| !label.is_empty())
}

/// `true` when `name` equals `suffix` or ends with `.suffix`, compared
/// label by label. Both inputs must already be canonical.
pub fn is_label_suffix(name: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return true;
    }
    if name == suffix {
        return true;
    }
    name.len() > suffix.len()
        && name.ends_with(suffix)
        && name.as_bytes()[name.len() - suffix.len() - 1] == b'.'
}

pub fn is_reverse_name(canonical: &str) -> bool {
    is_label_suffix(canonical, IPV4_REVERSE_SUFFIX) || is_label_suffix(canonical, IPV6_REVERSE_SUFFIX)
}

/// Converts a PTR owner name back to the address it describes.
///
/// Returns `None` for partial reverse names (e.g. `8.8.in-addr.arpa`) or
/// anything outside the reverse trees.
pub fn reverse_name_to_ip(canonical: &str) -> Option<IpAddr> {
    if let Some(prefix) = strip_label_suffix(canonical, IPV4_REVERSE_SUFFIX) {
        let octets: Vec<u8> = prefix
            .split('.')
            .map(|label| label.parse::<u8>().ok())
            .collect::<Option<Vec<u8>>>()?;
        if octets.len() != 4 {
            return None;
        }
        return Some(IpAddr::V4(Ipv4Addr::new(
            octets[3], octets[2], octets[1], octets[0],
        )));
    }

    if let Some(prefix) = strip_label_suffix(canonical, IPV6_REVERSE_SUFFIX) {
        let nibbles: Vec<u8> = prefix
            .split('.')
            .map(|label| {
                if label.len() == 1 {
                    u8::from_str_radix(label, 16).ok()
                } else {
                    None
                }
            })
            .collect::<Option<Vec<u8>>>()?;
        if nibbles.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, pair) in nibbles.rchunks(2).enumerate() {
            // rchunks walks from the end: pair[1] is the high nibble.
            bytes[i] = (pair[1] << 4) | pair[0];
        }
        return Some(IpAddr::V6(Ipv6Addr::from(bytes)));
    }

    None
}

pub fn ip_to_reverse_name(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.{}", o[3], o[2], o[1], o[0], IPV4_REVERSE_SUFFIX)
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                name.push_str(&format!("{:x}.{:x}.", byte & 0x0f, byte >> 4));
            }
            name.push_str(IPV6_REVERSE_SUFFIX);
            name
        }
    }
}

fn strip_label_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    name.strip_suffix(suffix)?.strip_suffix('.')
}
