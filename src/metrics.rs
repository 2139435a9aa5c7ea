/// Metrics and telemetry for the Wayfare ledger
///
/// Prometheus counters for the purchase lifecycle:
/// - Webhook events by type and outcome
/// - Completed purchases and refunds
/// - Reviews and access-key verifications

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Gateway webhook events by type and what ingestion did with them
    pub static ref WEBHOOK_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "wayfare_webhook_events_total",
        "Gateway webhook events received",
        &["event_type", "outcome"]
    )
    .unwrap();

    /// Purchases that reached the completed status
    pub static ref PURCHASES_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        "wayfare_purchases_completed_total",
        "Purchases transitioned to completed"
    )
    .unwrap();

    /// Refunds applied to the ledger
    pub static ref REFUNDS_TOTAL: IntCounter = register_int_counter!(
        "wayfare_refunds_total",
        "Purchases transitioned to refunded"
    )
    .unwrap();

    /// Reviews accepted
    pub static ref REVIEWS_TOTAL: IntCounter = register_int_counter!(
        "wayfare_reviews_total",
        "Reviews recorded"
    )
    .unwrap();

    /// Access key verification attempts by outcome
    pub static ref ACCESS_KEY_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "wayfare_access_key_verifications_total",
        "Access key verification attempts",
        &["outcome"]
    )
    .unwrap();
}

/// Record one webhook event
pub fn record_webhook_event(event_type: &str, outcome: crate::webhooks::IngestOutcome) {
    let outcome = match outcome {
        crate::webhooks::IngestOutcome::Applied => "applied",
        crate::webhooks::IngestOutcome::AlreadyProcessed => "already_processed",
        crate::webhooks::IngestOutcome::Ignored => "ignored",
    };
    WEBHOOK_EVENTS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

/// Record one access key verification attempt
pub fn record_access_key_verification(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ACCESS_KEY_VERIFICATIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
