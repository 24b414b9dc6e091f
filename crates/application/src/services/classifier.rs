use ipnetwork::IpNetwork;
use sans_domain::classification::reverse_network_contains;
use sans_domain::domain_name::{canonicalize, is_reverse_name, reverse_name_to_ip};
use sans_domain::{ClassificationRule, GroupId, RuleMatcher};
use smallvec::SmallVec;
use tracing::debug;

use super::suffix_trie::{PatternKind, SuffixTrie};

pub type GroupList = SmallVec<[GroupId; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Ordered by rule declaration; the dispatcher races all of them.
    pub groups: GroupList,
    /// Declaration index of the winning rule, `None` on the default route.
    pub rule: Option<usize>,
}

impl Classification {
    pub fn is_default(&self) -> bool {
        self.rule.is_none()
    }
}

/// Maps a query name to its upstream groups.
///
/// Built once from the configured rules. Name rules are indexed in a
/// reversed-label trie, reverse-lookup rules are checked by address
/// range. Lookups are read-only and deterministic.
pub struct DomainClassifier {
    /// Rules ordered by `(priority, declaration index)`.
    ranked: Vec<ClassificationRule>,
    names: SuffixTrie,
    reverse: Vec<(usize, Option<IpNetwork>)>,
    default_group: GroupId,
}

impl DomainClassifier {
    pub fn new(rules: &[ClassificationRule], default_group: GroupId) -> Self {
        let mut ranked = rules.to_vec();
        ranked.sort_by_key(ClassificationRule::rank);

        let mut names = SuffixTrie::new();
        let mut reverse = Vec::new();

        for (slot, rule) in ranked.iter().enumerate() {
            match &rule.matcher {
                RuleMatcher::Exact(name) => names.insert(name, PatternKind::Exact, slot),
                RuleMatcher::Suffix(name) => names.insert(name, PatternKind::Suffix, slot),
                RuleMatcher::Wildcard(name) => names.insert(name, PatternKind::Wildcard, slot),
                RuleMatcher::List(entries) => {
                    for entry in entries.iter() {
                        names.insert(entry, PatternKind::Suffix, slot);
                    }
                }
                RuleMatcher::Reverse(network) => reverse.push((slot, *network)),
            }
        }

        debug!(
            rules = ranked.len(),
            name_patterns = names.len(),
            reverse_rules = reverse.len(),
            "Domain classifier built"
        );

        Self {
            ranked,
            names,
            reverse,
            default_group,
        }
    }

    /// Accepts any spelling of the name; comparison happens on the
    /// canonical form.
    pub fn classify(&self, name: &str) -> Classification {
        let canonical = canonicalize(name);
        self.classify_canonical(&canonical)
    }

    pub fn classify_canonical(&self, name: &str) -> Classification {
        let slot = if is_reverse_name(name) {
            self.lookup_reverse(name)
        } else {
            self.names.lookup(name)
        };

        match slot.and_then(|s| self.ranked.get(s)) {
            Some(rule) => Classification {
                groups: rule.groups.iter().copied().collect(),
                rule: Some(rule.index),
            },
            None => Classification {
                groups: smallvec::smallvec![self.default_group],
                rule: None,
            },
        }
    }

    fn lookup_reverse(&self, name: &str) -> Option<usize> {
        let ip = reverse_name_to_ip(name)?;
        // `reverse` is already in slot order.
        self.reverse
            .iter()
            .find(|(_, network)| reverse_network_contains(network.as_ref(), ip))
            .map(|(slot, _)| *slot)
    }

    pub fn default_group(&self) -> GroupId {
        self.default_group
    }

    pub fn rule_count(&self) -> usize {
        self.ranked.len()
    }
}
