//! Domain types for Dispatchr
//!
//! This module contains the core data model:
//! - FailureRecord / ClassifiedFailure: failing signals and their domain assignment
//! - DomainSignature: static description of a specialist domain
//! - Task / WorkerResult: dispatched work and what came back
//! - CycleReport / CoordinationDirective: per-cycle diagnostics
//! - ControllerState: orchestration state machine

pub mod failure;
pub mod report;
pub mod signature;
pub mod state;
pub mod task;

pub use failure::{ClassifiedFailure, FailureRecord};
pub use report::{CoordinationDirective, CycleReport, OrchestrationOutcome, OrchestrationStatus};
pub use signature::{DomainCategory, DomainId, DomainSignature, MatchRule, Priority};
pub use state::ControllerState;
pub use task::{Task, WorkerResult};
