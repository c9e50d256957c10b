//! # Campline Domain
//!
//! Business domain types and models for Campline.
//!
//! This crate contains:
//! - Domain data types (schedule records, session metadata, homework)
//! - Domain error types and Result definitions
//! - Pure date/term utilities shared by the portal clients and reconciler
//!
//! ## Architecture
//! - No dependencies on other Campline crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
// Re-export term/date helpers used across crates
pub use utils::term::{iso_weekday, parse_hhmm, term_code_for};
