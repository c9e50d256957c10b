//! # Campline API
//!
//! Command facade exposed to the routing layer.
//!
//! This crate wires the infrastructure into an explicitly constructed
//! [`AppContext`] (no global singletons) and exposes the sync engine's
//! operations as thin command functions with structured logging. The HTTP
//! routing itself lives outside this workspace.

pub mod commands;
pub mod context;
pub mod utils;

pub use context::AppContext;
