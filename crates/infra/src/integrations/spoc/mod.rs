//! Second portal integration: the AES-envelope course-work application
//!
//! Same SSO server, different application: after the login callback the
//! portal speaks an encrypted two-step query protocol. Its bootstrap
//! sequence is observed to be flaky upstream, so every bootstrap step
//! degrades to a fallback instead of aborting; the session records when a
//! fallback was taken.

pub mod client;
pub mod crypto;
pub mod types;

pub use client::{SpocClient, SpocFetch};
pub use crypto::EnvelopeCipher;
