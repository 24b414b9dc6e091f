use compact_str::CompactString;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Rule slots are positions in the classifier's ranked rule list, so the
/// smallest slot is always the winner.
type Slots = SmallVec<[usize; 2]>;

#[derive(Default)]
struct TrieNode {
    children: HashMap<CompactString, TrieNode, FxBuildHasher>,
    exact: Slots,
    suffix: Slots,
    wildcard: Slots,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: HashMap::with_hasher(FxBuildHasher),
            exact: Slots::new(),
            suffix: Slots::new(),
            wildcard: Slots::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Exact,
    /// Apex and every subdomain.
    Suffix,
    /// Strict subdomains only.
    Wildcard,
}

/// Reversed-label trie over canonical names.
#[derive(Default)]
pub struct SuffixTrie {
    root: TrieNode,
    len: usize,
}

impl SuffixTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, pattern: &str, kind: PatternKind, slot: usize) {
        let mut node = &mut self.root;
        for label in pattern.rsplit('.').filter(|l| !l.is_empty()) {
            node = node.children.entry(CompactString::new(label)).or_default();
        }
        let slots = match kind {
            PatternKind::Exact => &mut node.exact,
            PatternKind::Suffix => &mut node.suffix,
            PatternKind::Wildcard => &mut node.wildcard,
        };
        if !slots.contains(&slot) {
            slots.push(slot);
            self.len += 1;
        }
    }

    /// Best (smallest) slot whose pattern covers `name`.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        let labels: SmallVec<[&str; 8]> = name.rsplit('.').filter(|l| !l.is_empty()).collect();
        let n = labels.len();
        let mut node = &self.root;
        let mut best: Option<usize> = None;

        let mut consider = |slots: &Slots| {
            if let Some(&min) = slots.iter().min() {
                best = Some(best.map_or(min, |b| b.min(min)));
            }
        };

        for (i, label) in labels.iter().enumerate() {
            match node.children.get(*label) {
                Some(child) => {
                    consider(&child.suffix);
                    if i + 1 < n {
                        consider(&child.wildcard);
                    } else {
                        consider(&child.exact);
                    }
                    node = child;
                }
                None => break,
            }
        }

        best
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
