//! # Campline Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the persistence layer
//! - The schedule reconciler: classification, normalization, dedupe and
//!   upsert rules for remote course/exam/homework data
//!
//! ## Architecture Principles
//! - Only depends on `campline-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod schedule;

pub use schedule::ports::{ScheduleStore, ScheduleTxn};
pub use schedule::reconciler::ScheduleReconciler;
