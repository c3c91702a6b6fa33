//! Round-robin load balancing strategy.

use crate::load_balancer::Strategy;

/// Round-robin selector.
///
/// Keeps the backend list and a cursor. `next` returns `list[cursor % len]`
/// and advances; removals before the cursor pull it back so nothing is skipped.
#[derive(Debug, Default)]
pub struct RoundRobin {
    backends: Vec<String>,
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn next(&mut self) -> Option<String> {
        if self.backends.is_empty() {
            return None;
        }

        let index = self.cursor % self.backends.len();
        self.cursor = index + 1;
        Some(self.backends[index].clone())
    }

    fn add_backend(&mut self, node: &str) {
        self.backends.push(node.to_string());
    }

    fn remove_backend(&mut self, node: &str) {
        let Some(index) = self.backends.iter().position(|b| b == node) else {
            return;
        };
        self.backends.remove(index);
        if index < self.cursor {
            self.cursor -= 1;
        }
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
