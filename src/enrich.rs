use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::TransactionPayload;

/// Static provenance tag attached to every event. Set once at process
/// configuration, never mutated per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub version: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            source: "MOBILE_APP".to_string(),
            version: "2.4.1".to_string(),
        }
    }
}

/// The immutable record handed to the stream. Created per accepted request,
/// serialized for publication, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEvent {
    pub trace_id: String,
    pub user_id: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Ingestion time, milliseconds since epoch, non-decreasing per process.
    pub timestamp: i64,
    pub metadata: Provenance,
}

/// Source of collision-resistant opaque trace identifiers.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Millisecond clock; implementations must be non-decreasing per process.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Random 128-bit identifiers rendered as 36-char UUID strings.
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Wall clock clamped so it never runs backwards within this process, even
/// if the system clock steps back under NTP adjustment.
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    fn observe(&self, now: i64) -> i64 {
        self.last.fetch_max(now, Ordering::AcqRel).max(now)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> i64 {
        self.observe(Utc::now().timestamp_millis())
    }
}

/// Stamps a validated payload with trace id, ingestion timestamp, and the
/// configured provenance tag. Infallible.
pub struct Enricher {
    ids: Box<dyn IdSource>,
    clock: Box<dyn Clock>,
    provenance: Provenance,
}

impl Enricher {
    pub fn new(provenance: Provenance) -> Self {
        Self::with_parts(Box::new(UuidSource), Box::new(MonotonicClock::new()), provenance)
    }

    /// Constructor with injected generators, for tests.
    pub fn with_parts(
        ids: Box<dyn IdSource>,
        clock: Box<dyn Clock>,
        provenance: Provenance,
    ) -> Self {
        Self {
            ids,
            clock,
            provenance,
        }
    }

    pub fn enrich(&self, payload: TransactionPayload) -> EnrichedEvent {
        EnrichedEvent {
            trace_id: self.ids.next_id(),
            user_id: payload.user_id,
            amount: payload.amount,
            merchant_id: payload.merchant_id,
            location: payload.location,
            currency: payload.currency,
            timestamp: self.clock.now_millis(),
            metadata: self.provenance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn payload(user_id: &str) -> TransactionPayload {
        TransactionPayload {
            user_id: user_id.to_string(),
            amount: 42.5,
            merchant_id: None,
            location: None,
            currency: None,
        }
    }

    #[test]
    fn trace_ids_are_unique_across_many_events() {
        let enricher = Enricher::new(Provenance::default());
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let event = enricher.enrich(payload("u1"));
            assert_eq!(event.trace_id.len(), 36);
            assert!(seen.insert(event.trace_id));
        }
    }

    #[test]
    fn timestamps_are_non_decreasing() {
        let enricher = Enricher::new(Provenance::default());
        let mut last = i64::MIN;
        for _ in 0..1_000 {
            let event = enricher.enrich(payload("u1"));
            assert!(event.timestamp >= last);
            last = event.timestamp;
        }
    }

    #[test]
    fn monotonic_clock_clamps_backward_steps() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.observe(100), 100);
        assert_eq!(clock.observe(90), 100);
        assert_eq!(clock.observe(120), 120);
    }

    #[test]
    fn serializes_with_wire_field_names_and_omits_absent_options() {
        let enricher = Enricher::new(Provenance::default());
        let mut input = payload("u1");
        input.merchant_id = Some("m-1".to_string());
        let value = serde_json::to_value(enricher.enrich(input)).unwrap();

        let object = value.as_object().unwrap();
        assert!(object.contains_key("traceId"));
        assert!(object.contains_key("userId"));
        assert!(object.contains_key("merchantId"));
        assert!(!object.contains_key("location"));
        assert_eq!(object["metadata"]["source"], "MOBILE_APP");
        assert_eq!(object["metadata"]["version"], "2.4.1");
    }
}
