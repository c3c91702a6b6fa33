//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! accept() error on a frontend listener
//!     → backoff.rs (sleep, then accept again)
//!
//! orchestrator event stream ended / failed
//!     → backoff.rs (sleep, resubscribe, rescan)
//! ```
//!
//! # Design Decisions
//! - Failures that do not invalidate the whole process are retried, not fatal
//! - Jitter keeps many frontends from retrying in lockstep

pub mod backoff;

pub use backoff::Backoff;
