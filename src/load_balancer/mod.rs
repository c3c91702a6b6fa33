//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Frontend::lookup()
//!     → (frontend lock held)
//!     → Strategy::next()
//!         - round_robin.rs (rotate through backends)
//!         - random.rs (uniform pick)
//!     → Some("host:port") | None
//! ```
//!
//! # Design Decisions
//! - A strategy owns its own copy of the backend set; the frontend keeps it in
//!   sync under the same lock as its own list
//! - Strategies never perform I/O
//! - Strategy selection per application, via the `tlb.strategy` label

use std::fmt;
use std::str::FromStr;

pub mod random;
pub mod round_robin;

pub use random::Random;
pub use round_robin::RoundRobin;

/// Backend selection policy for one application.
pub trait Strategy: Send + fmt::Debug {
    /// Pick the next backend, or `None` when the set is empty.
    fn next(&mut self) -> Option<String>;

    /// Add a backend to the candidate set.
    fn add_backend(&mut self, node: &str);

    /// Remove a backend from the candidate set. Unknown nodes are ignored.
    fn remove_backend(&mut self, node: &str);

    /// Stable name used in logs.
    fn name(&self) -> &'static str;
}

/// The strategies this balancer knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    RoundRobin,
    Random,
}

impl StrategyKind {
    /// Build a strategy pre-populated with `backends`.
    pub fn build(self, backends: &[String]) -> Box<dyn Strategy> {
        let mut strategy: Box<dyn Strategy> = match self {
            StrategyKind::RoundRobin => Box::new(RoundRobin::new()),
            StrategyKind::Random => Box::new(Random::new()),
        };
        for node in backends {
            strategy.add_backend(node);
        }
        strategy
    }
}

/// Unrecognized strategy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown load balancing strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" | "rr" => Ok(StrategyKind::RoundRobin),
            "random" => Ok(StrategyKind::Random),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::RoundRobin => write!(f, "round-robin"),
            StrategyKind::Random => write!(f, "random"),
        }
    }
}
