//! Per-user authenticated session management

mod store;

pub use store::{SessionContext, SessionStore};
