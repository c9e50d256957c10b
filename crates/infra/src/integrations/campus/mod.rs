//! First portal integration: the CAS-protected teaching-schedule application
//!
//! # Architecture
//!
//! - **SsoAuthenticator**: executes the CAS handshake over a session context
//! - **CampusPortalClient**: authenticated data calls with response
//!   classification
//! - **ScheduleSyncService**: multi-day fetch window feeding the reconciler

pub mod client;
pub mod sso;
pub mod sync;

pub use client::CampusPortalClient;
pub use sso::SsoAuthenticator;
pub use sync::{HomeworkSyncOutcome, ScheduleSyncService};
