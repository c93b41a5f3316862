//! Metric names and descriptions
//!
//! Counters are emitted through the `metrics` facade. Without an installed
//! recorder they are no-ops, so the library never requires one.

use metrics::{describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const STORE_LOAD: &str = "store.operations.load";
pub const STORE_SAVE: &str = "store.operations.save";
pub const STORE_DELETE: &str = "store.operations.delete";
pub const STORE_FAILED: &str = "store.operations.failed";
pub const STORE_SUPERSEDED: &str = "store.saves.superseded";
pub const STORE_DURATION: &str = "store.operation.duration_ms";
pub const RESOLUTION_RUNS: &str = "resolution.runs";
pub const RESOLUTION_CYCLES: &str = "resolution.cycles_detected";
pub const SIGNALS_SENT: &str = "propagation.signals.sent";
pub const SIGNALS_RECEIVED: &str = "propagation.signals.received";
pub const SIGNALS_DUPLICATE: &str = "propagation.signals.duplicate";

/// Register descriptions for every metric the crate emits
pub fn init_metrics() {
    // Store gateway
    describe_counter!(STORE_LOAD, "Entity loads issued to the storage backend");
    describe_counter!(STORE_SAVE, "Entity saves issued to the storage backend");
    describe_counter!(STORE_DELETE, "Entity deletions issued to the storage backend");
    describe_counter!(STORE_FAILED, "Store operations that failed or timed out");
    describe_counter!(STORE_SUPERSEDED, "Writes skipped because a newer write for the same key was queued");
    describe_histogram!(STORE_DURATION, "Backend operation duration in milliseconds");

    // Resolution
    describe_counter!(RESOLUTION_RUNS, "Permission resolutions performed");
    describe_counter!(RESOLUTION_CYCLES, "Inheritance cycles found during resolution");

    // Propagation
    describe_counter!(SIGNALS_SENT, "Update signals published to the messaging service");
    describe_counter!(SIGNALS_RECEIVED, "Update signals received from other nodes");
    describe_counter!(SIGNALS_DUPLICATE, "Received update signals dropped as duplicates");
}

/// Records elapsed milliseconds into a histogram when stopped
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    pub fn stop(self) {
        histogram!(self.name).record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
