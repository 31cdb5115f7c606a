//! Domain signatures: the declarative description of one specialist domain.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a capability domain (e.g. `auth-backend`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Dispatch priority. Higher variants are more urgent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad category of a domain. Declaration order is the default tie-break order:
/// security domains win ties over correctness domains, which win over performance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
    Security,
    #[default]
    Correctness,
    Data,
    Integration,
    Rendering,
    Performance,
}

/// One weighted pattern of a signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Case-insensitive regular expression matched against the error message
    pub pattern: String,
    /// Contribution to the score when the pattern hits
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Minimum group priority when this rule hits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalate: Option<Priority>,
}

fn default_weight() -> f64 {
    1.0
}

impl MatchRule {
    pub fn new(pattern: impl Into<String>, weight: f64) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
            escalate: None,
        }
    }

    pub fn escalating(mut self, priority: Priority) -> Self {
        self.escalate = Some(priority);
        self
    }
}

/// Static description of a specialist domain. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DomainSignature {
    pub id: DomainId,
    #[serde(default)]
    pub category: DomainCategory,
    pub rules: Vec<MatchRule>,
    #[serde(default)]
    pub default_priority: Priority,
    /// Directory the specialist works in, relative to the worker resource root
    pub resource_location: String,
    pub description: String,
    #[serde(default)]
    pub coordination_partners: BTreeSet<DomainId>,
}

impl DomainSignature {
    pub fn new(id: impl Into<String>, resource_location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: DomainId::new(id),
            category: DomainCategory::default(),
            rules: Vec::new(),
            default_priority: Priority::default(),
            resource_location: resource_location.into(),
            description: description.into(),
            coordination_partners: BTreeSet::new(),
        }
    }

    pub fn with_category(mut self, category: DomainCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.coordination_partners.insert(DomainId::new(partner));
        self
    }
}
