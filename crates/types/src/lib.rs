//! Core types for the deadlock manager.
//!
//! This crate provides the foundational types shared by the ledger and the
//! manager:
//!
//! - **Identifiers**: [`ProcessId`], [`ResourceId`] and the [`Units`] count type
//! - **Outcomes**: [`RequestOutcome`], [`SafetyVerdict`], [`RecoveryOutcome`]
//! - **Lifecycle**: [`EngineState`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod outcome;
mod state;

pub use identifiers::{ProcessId, ResourceId, Units};
pub use outcome::{RecoveryOutcome, RequestOutcome, SafetyVerdict};
pub use state::EngineState;
