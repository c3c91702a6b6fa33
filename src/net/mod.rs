//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection on a frontend port
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (relay tracking for drain)
//!     → relay.rs (connect backend, copy both ways, close)
//! ```
//!
//! # Design Decisions
//! - Byte-transparent: no framing, no protocol inspection
//! - Relays are independent tasks sharing no mutable state
//! - Stopping a listener never cancels a relay

pub mod connection;
pub mod listener;
pub mod relay;
