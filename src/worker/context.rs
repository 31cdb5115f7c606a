//! Task context handed to a specialist worker.
//!
//! The context carries the domain description, the failures with their confidence
//! and evidence text, and coordination hints derived from the signature's partners.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{DomainId, Priority, Task};
use crate::registry::Registry;

/// Encoding of the payload written to the specialist's stdin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Markdown prompt
    #[default]
    Text,
    /// The `WorkerContext` as JSON
    Json,
}

/// One failure as the specialist sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFailure {
    pub id: String,
    pub test_name: String,
    pub confidence: f64,
    pub evidence: String,
}

/// Everything a specialist needs to work on one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerContext {
    pub domain: DomainId,
    pub description: String,
    pub priority: Priority,
    pub resource_location: PathBuf,
    pub failures: Vec<ContextFailure>,
    pub coordination_hints: Vec<String>,
}

impl WorkerContext {
    /// Build the context for `task`. Hints come from the registry, not from
    /// what else happens to be dispatched this cycle.
    pub fn build(task: &Task, registry: &Registry, resource_location: PathBuf) -> Self {
        let signature = registry.get(&task.domain);
        let description = signature
            .map(|s| s.signature.description.clone())
            .unwrap_or_default();

        let mut coordination_hints = Vec::new();
        if let Some(sig) = signature {
            for partner_id in &sig.signature.coordination_partners {
                let Some(partner) = registry.get(partner_id) else {
                    continue;
                };
                let mut hint = format!(
                    "Coordinate with '{}' ({}), which works in {}",
                    partner_id, partner.signature.description, partner.signature.resource_location
                );
                if sig.owns_location(&partner.signature.resource_location)
                    || partner.owns_location(&sig.signature.resource_location)
                {
                    hint.push_str("; the locations overlap and edits are not serialized");
                }
                coordination_hints.push(hint);
            }
        }

        let failures = task
            .failures
            .iter()
            .map(|f| ContextFailure {
                id: f.record.id.clone(),
                test_name: f.record.test_name.clone(),
                confidence: f.confidence,
                evidence: f.evidence(),
            })
            .collect();

        Self {
            domain: task.domain.clone(),
            description,
            priority: task.priority,
            resource_location,
            failures,
            coordination_hints,
        }
    }

    /// Render the context as a markdown prompt.
    pub fn render(&self) -> String {
        let mut out = format!("# Specialist task: {}\n\n{}\n\n", self.domain, self.description);
        out.push_str(&format!("Priority: {}\n", self.priority));
        out.push_str(&format!("Resource location: {}\n\n", self.resource_location.display()));

        out.push_str(&format!("## Failures ({})\n\n", self.failures.len()));
        for failure in &self.failures {
            out.push_str(&format!(
                "- [{}] confidence {:.2}: {}\n",
                failure.id, failure.confidence, failure.evidence
            ));
        }

        if !self.coordination_hints.is_empty() {
            out.push_str("\n## Coordination\n\n");
            for hint in &self.coordination_hints {
                out.push_str(&format!("- {}\n", hint));
            }
        }

        out
    }

    /// Encode the payload in the requested format.
    pub fn payload(&self, format: PayloadFormat) -> crate::error::Result<String> {
        match format {
            PayloadFormat::Text => Ok(self.render()),
            PayloadFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
