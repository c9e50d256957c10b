//! API utilities

pub mod logging;
