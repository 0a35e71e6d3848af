//! Metrics for the gossip engine.
//!
//! Provides counters, gauges, and histograms for monitoring dissemination
//! behavior.
//!
//! ## Available Metrics
//!
//! ### Counters
//! - `gossip_values_observed_total` - Total newly observed values
//! - `gossip_batches_delivered_total` - Total batches successfully delivered
//! - `gossip_delivery_retries_total` - Total delivery attempts that failed and were retried
//! - `gossip_flushes_total` - Total flush ticks that drained the relay buffer
//! - `gossip_relay_drops_total` - Total values dropped because the relay buffer was full
//!
//! ### Histograms
//! - `gossip_batch_size` - Number of values per delivered batch
//!
//! ### Gauges
//! - `gossip_store_size` - Current number of distinct values observed
//! - `gossip_relay_buffer_size` - Current number of values awaiting flush
//! - `gossip_in_flight_deliveries` - Current number of destinations with an active delivery

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize metric descriptions.
///
/// Call this once at application startup to register all metric descriptions.
/// This makes metrics more discoverable in monitoring systems.
pub fn init_metrics() {
    // Counters
    describe_counter!(
        "gossip_values_observed_total",
        "Total number of newly observed values"
    );
    describe_counter!(
        "gossip_batches_delivered_total",
        "Total number of batches successfully delivered"
    );
    describe_counter!(
        "gossip_delivery_retries_total",
        "Total number of delivery attempts that failed and were retried"
    );
    describe_counter!(
        "gossip_flushes_total",
        "Total number of flush ticks that drained the relay buffer"
    );
    describe_counter!(
        "gossip_relay_drops_total",
        "Total number of values dropped because the relay buffer was full"
    );

    // Histograms
    describe_histogram!("gossip_batch_size", "Number of values per delivered batch");

    // Gauges
    describe_gauge!(
        "gossip_store_size",
        "Current number of distinct values observed"
    );
    describe_gauge!(
        "gossip_relay_buffer_size",
        "Current number of values awaiting the next flush"
    );
    describe_gauge!(
        "gossip_in_flight_deliveries",
        "Current number of destinations with an active delivery"
    );
}

/// Record newly observed values.
pub fn record_values_observed(count: usize) {
    counter!("gossip_values_observed_total").increment(count as u64);
}

/// Record a batch delivered to a destination.
pub fn record_batch_delivered(size: usize) {
    counter!("gossip_batches_delivered_total").increment(1);
    histogram!("gossip_batch_size").record(size as f64);
}

/// Record a failed delivery attempt that will be retried.
pub fn record_delivery_retry() {
    counter!("gossip_delivery_retries_total").increment(1);
}

/// Record a flush tick that drained the relay buffer.
pub fn record_flush() {
    counter!("gossip_flushes_total").increment(1);
}

/// Record a value dropped because the relay buffer was full.
pub fn record_relay_drop() {
    counter!("gossip_relay_drops_total").increment(1);
}

/// Update the store size gauge.
pub fn set_store_size(count: usize) {
    gauge!("gossip_store_size").set(count as f64);
}

/// Update the relay buffer size gauge.
pub fn set_relay_buffer_size(count: usize) {
    gauge!("gossip_relay_buffer_size").set(count as f64);
}

/// Update the in-flight deliveries gauge.
pub fn set_in_flight_deliveries(count: usize) {
    gauge!("gossip_in_flight_deliveries").set(count as f64);
}
