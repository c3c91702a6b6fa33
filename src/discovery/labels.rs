//! Application labels understood by the balancer.

use crate::discovery::Labels;
use crate::load_balancer::StrategyKind;

/// Marks an application for balancing. Boolean.
pub const TLB_ENABLED: &str = "tlb.enabled";
/// Index into a task's ip address / port arrays. Integer, default 0.
pub const TLB_PORT_INDEX: &str = "tlb.portIndex";
/// Frontend port for the application. Overrides static configuration.
pub const TLB_PORT: &str = "tlb.port";
/// Load balancing strategy name. Default `round-robin`.
pub const TLB_STRATEGY: &str = "tlb.strategy";

/// Parse a boolean the way Marathon users tend to write them.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "yes" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "no" => Some(false),
        _ => None,
    }
}

/// Whether the application opted in to balancing.
pub fn is_enabled(labels: &Labels) -> bool {
    labels
        .get(TLB_ENABLED)
        .and_then(|v| parse_bool(v))
        .unwrap_or(false)
}

/// Which reported endpoint is routable. Unparseable values fall back to 0.
pub fn port_index(labels: &Labels) -> usize {
    labels
        .get(TLB_PORT_INDEX)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Frontend port from the `tlb.port` label, if present and valid.
pub fn port(labels: &Labels) -> Option<u16> {
    let raw = labels.get(TLB_PORT)?;
    match raw.trim().parse() {
        Ok(port) => Some(port),
        Err(_) => {
            tracing::warn!(label = TLB_PORT, value = %raw, "Ignoring invalid port label");
            None
        }
    }
}

/// Strategy requested by `tlb.strategy`, defaulting to round-robin.
pub fn strategy(labels: &Labels) -> StrategyKind {
    match labels.get(TLB_STRATEGY).map(|v| v.parse::<StrategyKind>()) {
        None => StrategyKind::default(),
        Some(Ok(kind)) => kind,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Falling back to default strategy");
            StrategyKind::default()
        }
    }
}
