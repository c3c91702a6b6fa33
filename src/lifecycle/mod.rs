//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Marathon client → metrics → command channel → router task → discovery task
//!
//! Shutdown (shutdown.rs):
//!     Signal or fatal discovery error → stop discovery → stop frontends
//!         → drain relays (bounded) → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: a bad Marathon URL is fatal before anything is bound
//! - The router starts before discovery so the first command has a consumer
//! - Shutdown has a timeout: relays still open after the deadline are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
