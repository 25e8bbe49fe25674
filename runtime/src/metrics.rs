//! Metric names and recorders for the Store runtime.
//!
//! Only the `metrics` facade is used here. Installing an exporter is left to
//! the binary that embeds the runtime.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Register descriptions for every metric the runtime records.
///
/// Safe to call more than once; later calls overwrite the descriptions.
pub fn describe_metrics() {
    describe_counter!(
        "store_actions_total",
        "Total number of actions reduced by the store"
    );
    describe_counter!(
        "store_rejected_actions_total",
        "Actions rejected because the store was shutting down"
    );
    describe_histogram!(
        "store_reducer_duration_seconds",
        "Time spent inside the reducer, write lock held"
    );
    describe_counter!(
        "store_effects_executed_total",
        "Total number of effects executed, labelled by type"
    );
    describe_gauge!(
        "store_effects_pending",
        "Effects spawned by the store that have not completed yet"
    );
}

/// Reducer metrics recorder.
pub struct ReducerMetrics;

impl ReducerMetrics {
    /// Record an action processed.
    pub fn record_action(duration: Duration) {
        counter!("store_actions_total").increment(1);
        histogram!("store_reducer_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an action turned away during shutdown.
    pub fn record_rejected() {
        counter!("store_rejected_actions_total").increment(1);
    }
}

/// Effect metrics recorder.
pub struct EffectMetrics;

impl EffectMetrics {
    /// Record an effect execution of the given kind.
    pub fn record_execution(kind: &'static str) {
        counter!("store_effects_executed_total", "type" => kind).increment(1);
    }

    /// Publish the current number of in-flight effects.
    #[allow(clippy::cast_precision_loss)] // Pending effect counts stay far below 2^52
    pub fn record_pending(pending: usize) {
        gauge!("store_effects_pending").set(pending as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorders_are_noops_without_exporter() {
        describe_metrics();
        ReducerMetrics::record_action(Duration::from_millis(1));
        ReducerMetrics::record_rejected();
        EffectMetrics::record_execution("future");
        EffectMetrics::record_pending(0);
    }
}
