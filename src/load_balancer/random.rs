//! Random load balancing strategy.

use rand::Rng;

use crate::load_balancer::Strategy;

/// Picks a backend uniformly at random on every call.
#[derive(Debug, Default)]
pub struct Random {
    backends: Vec<String>,
}

impl Random {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for Random {
    fn next(&mut self) -> Option<String> {
        if self.backends.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.backends.len());
        Some(self.backends[index].clone())
    }

    fn add_backend(&mut self, node: &str) {
        self.backends.push(node.to_string());
    }

    fn remove_backend(&mut self, node: &str) {
        self.backends.retain(|b| b != node);
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
