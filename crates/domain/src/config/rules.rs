use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::domain_name::canonicalize;
use crate::{ClassificationRule, GroupId, RuleMatcher};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Exact,
    Suffix,
    Wildcard,
    List,
    Reverse,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub kind: RuleKind,

    /// Domain for exact/suffix/wildcard rules.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Inline entries of a list rule.
    #[serde(default)]
    pub domains: Vec<String>,

    /// One domain per line, `#` starts a comment.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Address range of a reverse rule; absent means every PTR name.
    #[serde(default)]
    pub network: Option<IpNetwork>,

    pub groups: Vec<String>,

    #[serde(default = "default_priority")]
    pub priority: u32,
}

impl RuleConfig {
    pub fn new(kind: RuleKind, pattern: Option<&str>, groups: Vec<String>) -> Self {
        Self {
            kind,
            pattern: pattern.map(str::to_string),
            domains: Vec::new(),
            file: None,
            network: None,
            groups,
            priority: default_priority(),
        }
    }

    pub fn to_rule(
        &self,
        index: usize,
        group_ids: &HashMap<&str, GroupId>,
    ) -> Result<ClassificationRule, ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Rule #{} has no target groups",
                index + 1
            )));
        }

        let groups = self
            .groups
            .iter()
            .map(|name| {
                group_ids.get(name.as_str()).copied().ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "Rule #{} references unknown group '{}'",
                        index + 1,
                        name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let matcher = self.matcher(index)?;
        Ok(ClassificationRule::new(matcher, groups, self.priority, index))
    }

    fn matcher(&self, index: usize) -> Result<RuleMatcher, ConfigError> {
        let pattern = || -> Result<Arc<str>, ConfigError> {
            let raw = self.pattern.as_deref().unwrap_or_default().trim();
            let raw = match (self.kind, raw.strip_prefix("*.")) {
                (RuleKind::Wildcard, Some(rest)) => rest,
                (_, Some(_)) => {
                    return Err(ConfigError::Validation(format!(
                        "Rule #{} ({:?}): '*.' is only valid in wildcard patterns",
                        index + 1,
                        self.kind
                    )))
                }
                (_, None) => raw,
            };
            let name = canonicalize(raw);
            if name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Rule #{} ({:?}) has an empty pattern",
                    index + 1,
                    self.kind
                )));
            }
            Ok(name.into())
        };

        match self.kind {
            RuleKind::Exact => Ok(RuleMatcher::Exact(pattern()?)),
            RuleKind::Suffix => Ok(RuleMatcher::Suffix(pattern()?)),
            RuleKind::Wildcard => Ok(RuleMatcher::Wildcard(pattern()?)),
            RuleKind::Reverse => Ok(RuleMatcher::Reverse(self.network)),
            RuleKind::List => {
                let mut entries: Vec<Arc<str>> = self
                    .domains
                    .iter()
                    .map(|d| canonicalize(d))
                    .filter(|d| !d.is_empty())
                    .map(Arc::from)
                    .collect();

                if let Some(path) = &self.file {
                    let contents = std::fs::read_to_string(path).map_err(|e| {
                        ConfigError::FileRead(path.display().to_string(), e.to_string())
                    })?;
                    entries.extend(parse_domain_list(&contents).map(Arc::from));
                }

                if entries.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Rule #{} (list) has no domains",
                        index + 1
                    )));
                }
                entries.sort();
                entries.dedup();
                Ok(RuleMatcher::List(entries.into()))
            }
        }
    }
}

pub fn parse_domain_list(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .map(canonicalize)
        .filter(|line| !line.is_empty())
}

fn default_priority() -> u32 {
    1
}
