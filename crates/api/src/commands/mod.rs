//! Command facade
//!
//! Thin wrappers over the service graph, one module per concern. These are
//! the operations the routing layer is allowed to call.

pub mod homework;
pub mod schedule;
pub mod sessions;
