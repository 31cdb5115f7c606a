//! Coordination Analyzer.
//!
//! After a batch completes, finds dispatched domain pairs that are registered as
//! mutual coordination partners and emits one directive per pair. Directives are
//! informational: no extra work is generated from them, and an unresolved
//! cross-cutting issue resurfaces through reclassification next cycle.

use std::collections::BTreeSet;

use crate::domain::{CoordinationDirective, DomainId};
use crate::registry::Registry;

/// Emit one directive per dispatched pair of mutual partners, ordered by pair.
pub fn analyze(dispatched: &BTreeSet<DomainId>, registry: &Registry) -> Vec<CoordinationDirective> {
    let domains: Vec<&DomainId> = dispatched.iter().collect();
    let mut directives = Vec::new();

    // BTreeSet iteration is sorted, so (a, b) with a < b visits each pair once
    for (i, a) in domains.iter().enumerate() {
        for b in &domains[i + 1..] {
            if !registry.are_partners(a, b) {
                continue;
            }
            directives.push(CoordinationDirective {
                domains: BTreeSet::from([(*a).clone(), (*b).clone()]),
                concern: concern_text(a, b, registry),
            });
        }
    }

    for directive in &directives {
        log::info!("Coordination directive: {}", directive.concern);
    }

    directives
}

fn concern_text(a: &DomainId, b: &DomainId, registry: &Registry) -> String {
    let describe = |id: &DomainId| {
        registry
            .get(id)
            .map(|s| s.signature.description.clone())
            .unwrap_or_default()
    };
    let mut concern = format!(
        "'{}' and '{}' were both dispatched and have overlapping concerns ({} / {}); verify their changes agree",
        a,
        b,
        describe(a),
        describe(b)
    );
    let shares_location = match (registry.get(a), registry.get(b)) {
        (Some(sa), Some(sb)) => {
            sa.owns_location(&sb.signature.resource_location) || sb.owns_location(&sa.signature.resource_location)
        }
        _ => false,
    };
    if shares_location {
        concern.push_str("; they also share a resource location");
    }
    concern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainSignature, MatchRule};

    fn registry() -> Registry {
        Registry::new(
            vec![
                DomainSignature::new("auth-frontend", "frontend/auth", "Client auth")
                    .with_rule(MatchRule::new("login", 1.0))
                    .with_partner("auth-backend"),
                DomainSignature::new("auth-backend", "backend/auth", "Server auth")
                    .with_rule(MatchRule::new("401", 1.0))
                    .with_partner("auth-frontend")
                    .with_partner("db"),
                DomainSignature::new("db", "backend/db", "Database").with_rule(MatchRule::new("sql", 1.0)),
                DomainSignature::new("ui", "frontend/ui", "UI").with_rule(MatchRule::new("button", 1.0)),
            ],
            None,
        )
        .unwrap()
    }

    fn set(ids: &[&str]) -> BTreeSet<DomainId> {
        ids.iter().map(|s| DomainId::new(*s)).collect()
    }

    #[test]
    fn test_partner_pair_emits_exactly_one_directive() {
        let directives = analyze(&set(&["auth-frontend", "auth-backend"]), &registry());
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].domains, set(&["auth-backend", "auth-frontend"]));
        assert!(directives[0].concern.contains("auth-backend"));
    }

    #[test]
    fn test_single_partner_dispatched_emits_nothing() {
        assert!(analyze(&set(&["auth-frontend", "ui"]), &registry()).is_empty());
    }

    #[test]
    fn test_one_sided_partnership_emits_nothing() {
        // auth-backend lists db, db does not list auth-backend
        assert!(analyze(&set(&["auth-backend", "db"]), &registry()).is_empty());
    }

    #[test]
    fn test_empty_dispatch() {
        assert!(analyze(&BTreeSet::new(), &registry()).is_empty());
    }

    #[test]
    fn test_analyze_is_pure() {
        let dispatched = set(&["auth-frontend", "auth-backend", "db", "ui"]);
        let registry = registry();
        assert_eq!(analyze(&dispatched, &registry), analyze(&dispatched, &registry));
    }
}
