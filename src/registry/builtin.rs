//! Bundled signature table for a typical web application with a JVM backend,
//! a TypeScript frontend and a model-serving sidecar.

use crate::domain::{DomainCategory, DomainSignature, MatchRule, Priority};

/// The default domain signatures.
pub fn builtin_signatures() -> Vec<DomainSignature> {
    vec![
        DomainSignature::new(
            "security",
            "backend/security",
            "Security hardening: CSRF, CORS, security headers, rate limiting, secret handling",
        )
        .with_category(DomainCategory::Security)
        .with_priority(Priority::High)
        .with_rule(MatchRule::new(r"csrf|xss|injection", 3.0).escalating(Priority::Critical))
        .with_rule(MatchRule::new(r"cors|security header|content-security-policy", 2.0))
        .with_rule(MatchRule::new(r"rate limit|too many requests|\b429\b", 1.5))
        .with_rule(MatchRule::new(r"secret|jwt signing key", 1.0))
        .with_partner("auth-backend"),
        DomainSignature::new(
            "auth-backend",
            "backend/auth",
            "Server-side authentication: OAuth2 token exchange, JWT issuance and validation, sessions",
        )
        .with_category(DomainCategory::Security)
        .with_priority(Priority::High)
        .with_rule(MatchRule::new(r"\b401\b|unauthori[sz]ed", 2.0))
        .with_rule(MatchRule::new(r"\b403\b|forbidden|access denied", 1.5))
        .with_rule(MatchRule::new(r"jwt|token (expired|invalid)|refresh token", 2.0))
        .with_rule(MatchRule::new(r"oauth2?|authenticat", 1.0))
        .with_partner("auth-frontend")
        .with_partner("security"),
        DomainSignature::new(
            "auth-frontend",
            "frontend/src/auth",
            "Client-side authentication: login flows, redirect handling, token storage",
        )
        .with_category(DomainCategory::Security)
        .with_priority(Priority::High)
        .with_rule(MatchRule::new(r"login (page|form|button)|sign[- ]?in", 2.0))
        .with_rule(MatchRule::new(r"redirect(ed)? to /login|callback url", 1.5))
        .with_rule(MatchRule::new(r"localstorage|session storage|auth context", 1.0))
        .with_partner("auth-backend"),
        DomainSignature::new(
            "api",
            "backend/api",
            "API layer: GraphQL resolvers, request validation, response contracts",
        )
        .with_category(DomainCategory::Correctness)
        .with_rule(MatchRule::new(r"graphql|resolver|query failed|mutation", 2.0))
        .with_rule(MatchRule::new(r"\b(400|404|500)\b|bad request|internal server error", 1.5))
        .with_rule(MatchRule::new(r"schema|validation error|expected .* but got", 1.0))
        .with_partner("data-access"),
        DomainSignature::new(
            "data-access",
            "backend/repository",
            "Persistence: repositories, queries, migrations, transactions",
        )
        .with_category(DomainCategory::Data)
        .with_priority(Priority::High)
        .with_rule(MatchRule::new(r"sql|hibernate|jpa|repository", 2.0))
        .with_rule(MatchRule::new(r"constraint violation|duplicate key|foreign key", 2.0).escalating(Priority::Critical))
        .with_rule(MatchRule::new(r"deadlock|transaction|connection pool", 1.5))
        .with_rule(MatchRule::new(r"migration|flyway|liquibase", 1.0))
        .with_partner("api")
        .with_partner("performance"),
        DomainSignature::new(
            "ui",
            "frontend/src/components",
            "UI components: forms, interaction handlers, accessibility",
        )
        .with_category(DomainCategory::Correctness)
        .with_priority(Priority::Low)
        .with_rule(MatchRule::new(r"button|click|form|input field", 2.0))
        .with_rule(MatchRule::new(r"element not found|selector|getby(role|text|testid)", 1.5))
        .with_rule(MatchRule::new(r"aria|accessib", 1.0))
        .with_partner("rendering"),
        DomainSignature::new(
            "rendering",
            "frontend/src/views",
            "Rendering: layout, styling, calendar views, hydration",
        )
        .with_category(DomainCategory::Rendering)
        .with_priority(Priority::Low)
        .with_rule(MatchRule::new(r"render(ed|ing)?|hydration|blank (page|screen)", 2.0))
        .with_rule(MatchRule::new(r"layout|css|style|viewport", 1.0))
        .with_rule(MatchRule::new(r"screenshot|visual diff|snapshot mismatch", 1.5))
        .with_partner("ui"),
        DomainSignature::new(
            "performance",
            "ml-server",
            "Performance: latency budgets, caching, model inference throughput",
        )
        .with_category(DomainCategory::Performance)
        .with_priority(Priority::Medium)
        .with_rule(MatchRule::new(r"timed? ?out|timeout exceeded|deadline", 2.0))
        .with_rule(MatchRule::new(r"latency|slow|took \d+ ?ms|p9[59]", 1.5))
        .with_rule(MatchRule::new(r"out of memory|oom|cache miss", 1.0))
        .with_partner("data-access"),
    ]
}
