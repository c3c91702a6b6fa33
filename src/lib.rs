//! Marathon-driven TCP load balancer library.

pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod frontend;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::TlbConfig;
pub use dispatch::Router;
pub use frontend::Frontend;
pub use lifecycle::Shutdown;
