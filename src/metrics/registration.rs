use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

pub const REGISTRATIONS_TOTAL: &str = "scan_intake_registrations_total";
pub const REGISTRATION_DURATION: &str = "scan_intake_registration_duration_seconds";

/// Metrics emitted by the registration use case
pub struct RegistrationMetrics;

impl RegistrationMetrics {
    pub fn describe() {
        describe_counter!(
            REGISTRATIONS_TOTAL,
            "Registration attempts, labelled by outcome"
        );
        describe_histogram!(
            REGISTRATION_DURATION,
            "Time spent handling one registration attempt"
        );
    }

    /// Record one finished registration attempt
    pub fn record_outcome(outcome: &'static str, elapsed: Duration) {
        counter!(REGISTRATIONS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(REGISTRATION_DURATION).record(elapsed.as_secs_f64());
    }
}
