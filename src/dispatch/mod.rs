//! Command dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Command channel (from discovery)
//!     → router.rs
//!         AppUpdated   → create / reconfigure Frontend, spawn accept loop
//!         AppDropped   → stop Frontend
//!         AddBackend   → Frontend::add_backend
//!         RemoveBackend→ Frontend::remove_backend
//! ```
//!
//! # Design Decisions
//! - The router task is the only owner of the app id → Frontend map
//! - A backend address belongs to at most one application at a time
//! - Backends of an app without a running frontend are held until it starts

pub mod router;

pub use router::Router;
