//! Schedule reconciliation: ports and business rules

pub mod ports;
pub mod reconciler;
