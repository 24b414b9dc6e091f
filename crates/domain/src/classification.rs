use std::net::IpAddr;
use std::sync::Arc;

use ipnetwork::IpNetwork;

use super::domain_name;
use super::GroupId;

/// Pattern half of a classification rule. Every name stored here is
/// already canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatcher {
    Exact(Arc<str>),
    /// The apex and every name below it.
    Suffix(Arc<str>),
    /// Strict subdomains only; written `*.example.com` in config.
    Wildcard(Arc<str>),
    /// Membership in a domain list, each entry matching as a suffix.
    List(Arc<[Arc<str>]>),
    /// Reverse-lookup names whose address falls inside the network.
    /// `None` accepts every reverse name.
    Reverse(Option<IpNetwork>),
}

impl RuleMatcher {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleMatcher::Exact(_) => "exact",
            RuleMatcher::Suffix(_) => "suffix",
            RuleMatcher::Wildcard(_) => "wildcard",
            RuleMatcher::List(_) => "list",
            RuleMatcher::Reverse(_) => "reverse",
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, RuleMatcher::Reverse(_))
    }

    /// Linear evaluation against one canonical name. The classifier uses
    /// an index instead; this is the reference behaviour it must agree with.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            RuleMatcher::Exact(pattern) => name == pattern.as_ref(),
            RuleMatcher::Suffix(pattern) => domain_name::is_label_suffix(name, pattern),
            RuleMatcher::Wildcard(pattern) => {
                name != pattern.as_ref() && domain_name::is_label_suffix(name, pattern)
            }
            RuleMatcher::List(entries) => entries
                .iter()
                .any(|entry| domain_name::is_label_suffix(name, entry)),
            RuleMatcher::Reverse(network) => match domain_name::reverse_name_to_ip(name) {
                Some(ip) => reverse_network_contains(network.as_ref(), ip),
                None => false,
            },
        }
    }
}

pub fn reverse_network_contains(network: Option<&IpNetwork>, ip: IpAddr) -> bool {
    network.map_or(true, |net| net.contains(ip))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub matcher: RuleMatcher,
    /// Ordered targets; the dispatcher races all of them.
    pub groups: Vec<GroupId>,
    /// Lower values are evaluated first.
    pub priority: u32,
    /// Declaration order, breaks priority ties.
    pub index: usize,
}

impl ClassificationRule {
    pub fn new(matcher: RuleMatcher, groups: Vec<GroupId>, priority: u32, index: usize) -> Self {
        Self {
            matcher,
            groups,
            priority,
            index,
        }
    }

    pub fn rank(&self) -> (u32, usize) {
        (self.priority, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_excludes_apex() {
        let matcher = RuleMatcher::Wildcard("google.com".into());
        assert!(matcher.matches("mail.google.com"));
        assert!(!matcher.matches("google.com"));
        assert!(!matcher.matches("notgoogle.com"));
    }

    #[test]
    fn test_reverse_matcher_by_network() {
        let matcher = RuleMatcher::Reverse(Some("8.8.0.0/16".parse().unwrap()));
        assert!(matcher.matches("8.8.8.8.in-addr.arpa"));
        assert!(!matcher.matches("1.1.1.1.in-addr.arpa"));
        assert!(!matcher.matches("8.8.in-addr.arpa"));
    }
}
