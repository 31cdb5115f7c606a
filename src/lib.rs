//! Dispatchr - failure-driven specialist dispatch
//!
//! Dispatchr takes the failures of a test run, classifies each one into a
//! capability domain, and dispatches one external specialist per domain with
//! bounded concurrency. Cycles repeat until a fresh test run is clean or the
//! cycle budget runs out.

pub mod classifier;
pub mod controller;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod executor;
pub mod planner;
pub mod registry;
mod shell;
pub mod test_run;
pub mod worker;

pub use error::{DispatchError, Result};
