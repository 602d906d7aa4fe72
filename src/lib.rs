//! Thread Reaper -- automatic archival of inactive community threads.
//!
//! A periodic sweep plus platform-event reconciliation feed one pure
//! evaluator; inactive threads are archived through an idempotent actuator.
//! Per-guild thresholds live in a key-value backed config store.

// Foundation
pub mod constants;
pub mod error;
pub mod time_utils;

// Core types
pub mod config;
pub mod guild;

// Sub-systems
pub mod ipc_client;
pub mod moderation;
pub mod platform;
pub mod storage;
pub mod tracing_init;

#[cfg(test)]
pub mod test_helpers;

pub use error::{ReaperError, ReaperResult};
