//! One application's backend set.
//!
//! The ordered node list and the strategy's own copy are only ever touched
//! together, under one lock, so a lookup never sees one without the other.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::load_balancer::{Strategy, StrategyKind};
use crate::observability::metrics;

#[derive(Debug)]
struct Members {
    nodes: Vec<String>,
    strategy: Box<dyn Strategy>,
}

/// Backend registry for a single application.
#[derive(Debug)]
pub struct BackendRegistry {
    app_id: String,
    members: Mutex<Members>,
}

impl BackendRegistry {
    /// Create a registry seeded with `backends`; duplicates are collapsed.
    pub fn new(app_id: impl Into<String>, kind: StrategyKind, backends: Vec<String>) -> Self {
        let mut nodes: Vec<String> = Vec::with_capacity(backends.len());
        for node in backends {
            if !nodes.contains(&node) {
                nodes.push(node);
            }
        }
        let strategy = kind.build(&nodes);

        Self {
            app_id: app_id.into(),
            members: Mutex::new(Members { nodes, strategy }),
        }
    }

    // Poisoning is ignored: every mutation leaves the pair consistent.
    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next backend according to the strategy, or `None` when empty.
    pub fn lookup(&self) -> Option<String> {
        self.lock().strategy.next()
    }

    /// Add a backend. Returns `false` if it was already present.
    pub fn add_backend(&self, node: &str) -> bool {
        let count = {
            let mut members = self.lock();
            if members.nodes.iter().any(|n| n == node) {
                None
            } else {
                members.nodes.push(node.to_string());
                members.strategy.add_backend(node);
                Some(members.nodes.len())
            }
        };

        match count {
            Some(count) => {
                tracing::info!(app_id = %self.app_id, node = %node, backends = count, "Backend added");
                metrics::record_backend_count(&self.app_id, count);
                true
            }
            None => {
                tracing::debug!(app_id = %self.app_id, node = %node, "Backend already registered");
                false
            }
        }
    }

    /// Remove a backend. Returns `false` (and warns) if it was not present.
    pub fn remove_backend(&self, node: &str) -> bool {
        let count = {
            let mut members = self.lock();
            let index = members.nodes.iter().position(|n| n == node);
            if let Some(index) = index {
                members.nodes.remove(index);
            }
            members.strategy.remove_backend(node);
            index.map(|_| members.nodes.len())
        };

        match count {
            Some(count) => {
                tracing::info!(app_id = %self.app_id, node = %node, backends = count, "Backend removed");
                metrics::record_backend_count(&self.app_id, count);
                true
            }
            None => {
                tracing::warn!(app_id = %self.app_id, node = %node, "Backend is not part of this frontend");
                false
            }
        }
    }

    pub fn len_of_backends(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Snapshot of the current backends, in insertion order.
    pub fn backends(&self) -> Vec<String> {
        self.lock().nodes.clone()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.lock().strategy.name()
    }
}
