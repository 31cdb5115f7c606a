//! Failure Classifier.
//!
//! Scores every failure record against every signature and assigns it to the single
//! best domain. Pure and deterministic: no randomness, no hidden state, and ties are
//! broken by the registry's explicit precedence table rather than iteration order.
//!
//! Score for a (record, signature) pair:
//! - sum of weights of rules whose pattern matches the error message
//! - plus `LOCATION_BONUS` if the location hint falls under the resource location
//!
//! Confidence is the score divided by the signature's maximum attainable score.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ClassifiedFailure, DomainId, FailureRecord, Priority};
use crate::registry::{CompiledSignature, LOCATION_BONUS, Registry};

/// Confidence a domain must strictly exceed to claim a record.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.0;

/// Failures assigned to one domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainGroup {
    pub failures: Vec<ClassifiedFailure>,
    /// max(default priority, escalations carried by the failures)
    pub priority: Priority,
    pub description: String,
}

/// Output of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub groups: BTreeMap<DomainId, DomainGroup>,
    pub unclassified: Vec<ClassifiedFailure>,
}

impl Classification {
    /// All classified failures, grouped by domain in id order.
    pub fn classified(&self) -> Vec<ClassifiedFailure> {
        self.groups.values().flat_map(|g| g.failures.iter().cloned()).collect()
    }

    pub fn classified_count(&self) -> usize {
        self.groups.values().map(|g| g.failures.len()).sum()
    }

    /// Classified plus unclassified; always equals the number of input records.
    pub fn total(&self) -> usize {
        self.classified_count() + self.unclassified.len()
    }
}

/// Score of one record against one signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchScore {
    pub confidence: f64,
    pub escalation: Option<Priority>,
}

/// Score a record against a signature.
pub fn score(record: &FailureRecord, signature: &CompiledSignature) -> MatchScore {
    let mut raw = 0.0;
    let mut escalation: Option<Priority> = None;

    for rule in &signature.rules {
        if rule.regex.is_match(&record.error_message) {
            raw += rule.weight;
            escalation = escalation.max(rule.escalate);
        }
    }

    if let Some(hint) = &record.location_hint {
        if signature.owns_location(hint) {
            raw += LOCATION_BONUS;
        }
    }

    let confidence = if signature.max_score > 0.0 {
        (raw / signature.max_score).clamp(0.0, 1.0)
    } else {
        0.0
    };

    MatchScore { confidence, escalation }
}

/// Assign one record to its best domain, or leave it unclassified.
pub fn classify_record(record: &FailureRecord, registry: &Registry, min_confidence: f64) -> ClassifiedFailure {
    // Registry iteration follows precedence, so keeping the first of equal scores
    // applies the tie-break table.
    let mut best: Option<(&CompiledSignature, MatchScore)> = None;
    for signature in registry.iter() {
        let candidate = score(record, signature);
        let better = match &best {
            None => true,
            Some((_, current)) => candidate.confidence > current.confidence,
        };
        if better {
            best = Some((signature, candidate));
        }
    }

    match best {
        Some((signature, s)) if s.confidence > min_confidence => ClassifiedFailure {
            record: record.clone(),
            domain: Some(signature.id().clone()),
            confidence: s.confidence,
            escalation: s.escalation,
        },
        best => ClassifiedFailure {
            record: record.clone(),
            domain: None,
            confidence: best.map(|(_, s)| s.confidence).unwrap_or(0.0),
            escalation: None,
        },
    }
}

/// Classify a batch of records and group them by domain.
pub fn classify(records: &[FailureRecord], registry: &Registry, min_confidence: f64) -> Classification {
    let mut classification = Classification::default();

    for record in records {
        let classified = classify_record(record, registry, min_confidence);
        let Some(domain) = classified.domain.clone() else {
            classification.unclassified.push(classified);
            continue;
        };
        let Some(signature) = registry.get(&domain) else {
            continue;
        };

        let group = classification
            .groups
            .entry(domain)
            .or_insert_with(|| DomainGroup {
                failures: Vec::new(),
                priority: signature.signature.default_priority,
                description: signature.signature.description.clone(),
            });
        if let Some(escalation) = classified.escalation {
            group.priority = group.priority.max(escalation);
        }
        group.failures.push(classified);
    }

    log::info!(
        "Classified {} failures into {} domains ({} unclassified)",
        classification.classified_count(),
        classification.groups.len(),
        classification.unclassified.len()
    );

    classification
}
