//! Domain Signature Registry.
//!
//! Immutable table of domain signatures, validated and compiled once at startup.
//! Misconfiguration is fatal here rather than at classification time.
//!
//! The registry also owns the explicit tie-break precedence: a total order over
//! every registered domain id. By default it is derived from
//! `(DomainCategory, DomainId)`, so security domains win ties over correctness
//! domains, which win over performance domains. A custom order may be supplied,
//! but it must name every domain exactly once.

mod builtin;

pub use builtin::builtin_signatures;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::domain::{DomainId, DomainSignature, Priority};
use crate::error::{DispatchError, Result};

/// Score added when a record's location hint falls under the domain's resource location.
pub const LOCATION_BONUS: f64 = 1.0;

/// A match rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub regex: Regex,
    pub weight: f64,
    pub escalate: Option<Priority>,
}

/// A validated signature ready for scoring.
#[derive(Debug, Clone)]
pub struct CompiledSignature {
    pub signature: DomainSignature,
    pub rules: Vec<CompiledRule>,
    /// Highest attainable score: every rule hits plus the location bonus
    pub max_score: f64,
}

impl CompiledSignature {
    fn compile(signature: DomainSignature) -> Result<Self> {
        if signature.rules.is_empty() {
            return Err(DispatchError::Registry(format!(
                "domain '{}' has no match rules",
                signature.id
            )));
        }

        let mut rules = Vec::with_capacity(signature.rules.len());
        for rule in &signature.rules {
            if rule.pattern.trim().is_empty() {
                return Err(DispatchError::Registry(format!(
                    "domain '{}' has an empty pattern",
                    signature.id
                )));
            }
            if !rule.weight.is_finite() || rule.weight <= 0.0 {
                return Err(DispatchError::Registry(format!(
                    "domain '{}' pattern '{}' has invalid weight {}",
                    signature.id, rule.pattern, rule.weight
                )));
            }
            let regex = RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| DispatchError::Pattern {
                    pattern: rule.pattern.clone(),
                    source,
                })?;
            rules.push(CompiledRule {
                regex,
                weight: rule.weight,
                escalate: rule.escalate,
            });
        }

        let max_score = rules.iter().map(|r| r.weight).sum::<f64>() + LOCATION_BONUS;

        Ok(Self {
            signature,
            rules,
            max_score,
        })
    }

    pub fn id(&self) -> &DomainId {
        &self.signature.id
    }

    /// Returns true if `hint` points inside this domain's resource location.
    pub fn owns_location(&self, hint: &str) -> bool {
        path_within(hint, &self.signature.resource_location)
    }
}

/// Two domains whose resource locations coincide or nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationOverlap {
    pub first: DomainId,
    pub second: DomainId,
    pub first_location: String,
    pub second_location: String,
}

/// On-disk registry layout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RegistryFile {
    #[serde(default)]
    precedence: Option<Vec<DomainId>>,
    domains: Vec<DomainSignature>,
}

/// Validated, immutable signature table.
#[derive(Debug, Clone)]
pub struct Registry {
    signatures: BTreeMap<DomainId, CompiledSignature>,
    /// Tie-break order; index is the rank (lower wins)
    precedence: Vec<DomainId>,
}

impl Registry {
    /// Validate and compile a signature table.
    pub fn new(signatures: Vec<DomainSignature>, precedence: Option<Vec<DomainId>>) -> Result<Self> {
        if signatures.is_empty() {
            return Err(DispatchError::Registry("no domain signatures registered".to_string()));
        }

        let mut compiled = BTreeMap::new();
        let mut categories = Vec::with_capacity(signatures.len());
        for signature in signatures {
            let id = signature.id.clone();
            if id.as_str().trim().is_empty() {
                return Err(DispatchError::Registry("domain with empty id".to_string()));
            }
            categories.push((signature.category, id.clone()));
            if compiled.insert(id.clone(), CompiledSignature::compile(signature)?).is_some() {
                return Err(DispatchError::Registry(format!("duplicate domain '{}'", id)));
            }
        }

        for sig in compiled.values() {
            for partner in &sig.signature.coordination_partners {
                if partner == sig.id() {
                    return Err(DispatchError::Registry(format!(
                        "domain '{}' lists itself as a coordination partner",
                        partner
                    )));
                }
                if !compiled.contains_key(partner) {
                    return Err(DispatchError::Registry(format!(
                        "domain '{}' names unknown coordination partner '{}'",
                        sig.id(),
                        partner
                    )));
                }
            }
        }

        let precedence = match precedence {
            Some(order) => {
                let unique: BTreeSet<&DomainId> = order.iter().collect();
                let registered: BTreeSet<&DomainId> = compiled.keys().collect();
                if unique.len() != order.len() || unique != registered {
                    return Err(DispatchError::Registry(
                        "precedence must list every registered domain exactly once".to_string(),
                    ));
                }
                order
            }
            None => {
                categories.sort();
                categories.into_iter().map(|(_, id)| id).collect()
            }
        };

        Ok(Self {
            signatures: compiled,
            precedence,
        })
    }

    /// Registry built from the bundled signature table.
    pub fn builtin() -> Result<Self> {
        Self::new(builtin_signatures(), None)
    }

    /// Load a registry from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: RegistryFile = serde_yaml::from_str(content)?;
        Self::new(file.domains, file.precedence)
    }

    pub fn get(&self, id: &DomainId) -> Option<&CompiledSignature> {
        self.signatures.get(id)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Signatures in tie-break precedence order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledSignature> {
        self.precedence.iter().filter_map(|id| self.signatures.get(id))
    }

    pub fn precedence(&self) -> &[DomainId] {
        &self.precedence
    }

    /// Tie-break rank of a domain; lower ranks win ties. Unknown domains rank last.
    pub fn rank(&self, id: &DomainId) -> usize {
        self.precedence
            .iter()
            .position(|d| d == id)
            .unwrap_or(self.precedence.len())
    }

    /// Returns true if `a` and `b` list each other as coordination partners.
    pub fn are_partners(&self, a: &DomainId, b: &DomainId) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(sa), Some(sb)) => {
                sa.signature.coordination_partners.contains(b) && sb.signature.coordination_partners.contains(a)
            }
            _ => false,
        }
    }

    /// Partnerships declared by only one side. These never produce directives.
    pub fn one_sided_partnerships(&self) -> Vec<(DomainId, DomainId)> {
        let mut pairs = Vec::new();
        for sig in self.signatures.values() {
            for partner in &sig.signature.coordination_partners {
                if !self.are_partners(sig.id(), partner) {
                    pairs.push((sig.id().clone(), partner.clone()));
                }
            }
        }
        pairs
    }

    /// Pairs of domains whose resource locations are equal or nested.
    ///
    /// Workers for overlapping domains are not serialized against each other;
    /// callers surface these as warnings.
    pub fn location_overlaps(&self) -> Vec<LocationOverlap> {
        let sigs: Vec<&CompiledSignature> = self.signatures.values().collect();
        let mut overlaps = Vec::new();
        for (i, a) in sigs.iter().enumerate() {
            for b in &sigs[i + 1..] {
                let la = &a.signature.resource_location;
                let lb = &b.signature.resource_location;
                if path_within(la, lb) || path_within(lb, la) {
                    overlaps.push(LocationOverlap {
                        first: a.id().clone(),
                        second: b.id().clone(),
                        first_location: la.clone(),
                        second_location: lb.clone(),
                    });
                }
            }
        }
        overlaps
    }

    /// Log startup hazards: overlapping locations and one-sided partnerships.
    pub fn warn_hazards(&self) {
        for overlap in self.location_overlaps() {
            log::warn!(
                "Domains '{}' ({}) and '{}' ({}) share a resource location; their workers are not serialized",
                overlap.first,
                overlap.first_location,
                overlap.second,
                overlap.second_location
            );
        }
        for (from, to) in self.one_sided_partnerships() {
            log::warn!(
                "Domain '{}' lists '{}' as a coordination partner but not vice versa; no directive will be emitted",
                from,
                to
            );
        }
    }
}

fn normal_components(path: &str) -> Vec<String> {
    Path::new(path.trim())
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Returns true if `location`'s components appear as a contiguous run in `path`,
/// anchored at the start for relative paths and anywhere for absolute ones.
fn path_within(path: &str, location: &str) -> bool {
    let path_parts = normal_components(path);
    let loc_parts = normal_components(location);
    if loc_parts.is_empty() || loc_parts.len() > path_parts.len() {
        return false;
    }
    if Path::new(path.trim()).is_absolute() && !Path::new(location.trim()).is_absolute() {
        return path_parts
            .windows(loc_parts.len())
            .any(|window| window == loc_parts.as_slice());
    }
    path_parts.starts_with(&loc_parts)
}
