//! Failure records and their classification.
//!
//! A `FailureRecord` is produced fresh by the test-run collaborator every cycle and
//! never mutated. Classification wraps it with at most one domain assignment.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::signature::{DomainId, Priority};

/// One failing signal from a test run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Identifier, stable across runs when derived from a fingerprint
    pub id: String,
    /// Name of the failing test
    pub test_name: String,
    /// Error text used for pattern matching
    pub error_message: String,
    /// File or path the failure points at, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

impl FailureRecord {
    /// Create a record with an id derived from its content.
    pub fn new(test_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        let test_name = test_name.into();
        let error_message = error_message.into();
        let id = Self::fingerprint(&test_name, &error_message);
        Self {
            id,
            test_name,
            error_message,
            location_hint: None,
        }
    }

    /// Override the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the location hint.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location_hint = Some(location.into());
        self
    }

    /// Compute a short content fingerprint for records whose source supplied no id.
    pub fn fingerprint(test_name: &str, error_message: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(test_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(error_message.as_bytes());
        let digest = hasher.finalize();
        format!("f-{}", hex::encode(&digest[..6]))
    }
}

/// A failure record with its domain assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub record: FailureRecord,
    /// Assigned domain; `None` means unclassified
    pub domain: Option<DomainId>,
    /// Confidence in [0, 1] of the assignment (best score seen when unclassified)
    pub confidence: f64,
    /// Highest escalation carried by a matching rule of the assigned domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Priority>,
}

impl ClassifiedFailure {
    /// Returns true if no domain claimed this record.
    pub fn is_unclassified(&self) -> bool {
        self.domain.is_none()
    }

    /// Short evidence line used in worker context and reports.
    pub fn evidence(&self) -> String {
        match &self.record.location_hint {
            Some(loc) => format!("{} ({}): {}", self.record.test_name, loc, self.record.error_message),
            None => format!("{}: {}", self.record.test_name, self.record.error_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = FailureRecord::new("login_test", "401 Unauthorized");
        let b = FailureRecord::new("login_test", "401 Unauthorized");
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("f-"));
        assert_eq!(a.id.len(), 2 + 12);
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        // "ab" + "c" must not collide with "a" + "bc"
        assert_ne!(FailureRecord::fingerprint("ab", "c"), FailureRecord::fingerprint("a", "bc"));
    }

    #[test]
    fn test_builder() {
        let record = FailureRecord::new("t", "boom")
            .with_id("F-1")
            .with_location("src/auth/login.rs");
        assert_eq!(record.id, "F-1");
        assert_eq!(record.location_hint.as_deref(), Some("src/auth/login.rs"));
    }

    #[test]
    fn test_deserialize_without_location() {
        let json = r#"{"id":"1","test_name":"t","error_message":"m"}"#;
        let record: FailureRecord = serde_json::from_str(json).unwrap();
        assert!(record.location_hint.is_none());
    }

    #[test]
    fn test_evidence_includes_location() {
        let classified = ClassifiedFailure {
            record: FailureRecord::new("render_test", "blank canvas").with_location("web/canvas.ts"),
            domain: None,
            confidence: 0.0,
            escalation: None,
        };
        assert!(classified.is_unclassified());
        assert_eq!(classified.evidence(), "render_test (web/canvas.ts): blank canvas");
    }
}
