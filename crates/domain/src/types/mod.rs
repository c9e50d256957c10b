//! Domain data types

pub mod homework;
pub mod schedule;
pub mod session;

pub use homework::*;
pub use schedule::*;
pub use session::*;
