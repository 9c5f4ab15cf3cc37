use std::collections::BTreeMap;
use std::time::Duration;

use super::{EventKind, LatencyHistogram, RequestEvent};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatsKey {
    pub kind: EventKind,
    pub name: String,
}

impl StatsKey {
    #[must_use]
    pub fn new(kind: EventKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_owned(),
        }
    }
}

/// Running totals for one (kind, name) pair.
#[derive(Debug, Clone)]
pub struct OperationStats {
    pub successes: u64,
    pub failures: u64,
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub latency_sum: Duration,
    pub received_bytes: u128,
    pub histogram: Option<LatencyHistogram>,
    /// Failure count per distinct error description.
    pub errors: BTreeMap<String, u64>,
}

impl OperationStats {
    fn new() -> Self {
        let histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                tracing::warn!("Failed to initialize latency histogram: {}", err);
                None
            }
        };
        Self {
            successes: 0,
            failures: 0,
            min_latency: Duration::MAX,
            max_latency: Duration::ZERO,
            latency_sum: Duration::ZERO,
            received_bytes: 0,
            histogram,
            errors: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    #[must_use]
    pub fn mean_latency(&self) -> Duration {
        let Ok(count) = u32::try_from(self.count()) else {
            let nanos = self
                .latency_sum
                .as_nanos()
                .checked_div(u128::from(self.count()))
                .unwrap_or(0);
            return Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        };
        self.latency_sum.checked_div(count).unwrap_or(Duration::ZERO)
    }

    /// Smallest recorded latency, or zero before the first event.
    #[must_use]
    pub fn min_latency(&self) -> Duration {
        if self.count() == 0 {
            Duration::ZERO
        } else {
            self.min_latency
        }
    }

    fn record(&mut self, event: &RequestEvent) {
        match event.error.as_ref() {
            None => self.successes = self.successes.saturating_add(1),
            Some(error) => {
                self.failures = self.failures.saturating_add(1);
                let seen = self.errors.entry(error.clone()).or_insert(0);
                *seen = seen.saturating_add(1);
            }
        }
        self.min_latency = self.min_latency.min(event.duration);
        self.max_latency = self.max_latency.max(event.duration);
        self.latency_sum = self.latency_sum.saturating_add(event.duration);
        self.received_bytes = self
            .received_bytes
            .saturating_add(u128::from(event.payload_size));
        if let Some(histogram) = self.histogram.as_mut() {
            let micros = u64::try_from(event.duration.as_micros()).unwrap_or(u64::MAX);
            if let Err(err) = histogram.record(micros) {
                tracing::warn!("{}", err);
            }
        }
    }

    fn absorb(&mut self, other: &OperationStats) {
        self.successes = self.successes.saturating_add(other.successes);
        self.failures = self.failures.saturating_add(other.failures);
        self.min_latency = self.min_latency.min(other.min_latency);
        self.max_latency = self.max_latency.max(other.max_latency);
        self.latency_sum = self.latency_sum.saturating_add(other.latency_sum);
        self.received_bytes = self.received_bytes.saturating_add(other.received_bytes);
        for (error, count) in &other.errors {
            let seen = self.errors.entry(error.clone()).or_insert(0);
            *seen = seen.saturating_add(*count);
        }
        match (self.histogram.as_mut(), other.histogram.as_ref()) {
            (Some(left), Some(right)) => {
                if let Err(err) = left.merge(right) {
                    tracing::warn!("{}", err);
                }
            }
            (Some(_), None) | (None, Some(_)) | (None, None) => {}
        }
    }
}

/// Point-in-time aggregate of every recorded event, keyed by (kind, name).
#[derive(Debug, Clone, Default)]
pub struct AggregateStats {
    entries: BTreeMap<StatsKey, OperationStats>,
}

impl AggregateStats {
    pub(super) fn record(&mut self, event: &RequestEvent) {
        let key = StatsKey::new(event.kind, &event.name);
        self.entries
            .entry(key)
            .or_insert_with(OperationStats::new)
            .record(event);
    }

    #[must_use]
    pub fn get(&self, kind: EventKind, name: &str) -> Option<&OperationStats> {
        self.entries.get(&StatsKey::new(kind, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StatsKey, &OperationStats)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of events recorded across every key.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.entries
            .values()
            .fold(0_u64, |acc, stats| acc.saturating_add(stats.count()))
    }

    /// Combined stats of every key with the given kind.
    #[must_use]
    pub fn kind_total(&self, kind: EventKind) -> Option<OperationStats> {
        combine(
            self.entries
                .iter()
                .filter(|(key, _)| key.kind == kind)
                .map(|(_, stats)| stats),
        )
    }

    /// Combined stats of every key.
    #[must_use]
    pub fn overall(&self) -> Option<OperationStats> {
        combine(self.entries.values())
    }
}

fn combine<'a>(mut stats: impl Iterator<Item = &'a OperationStats>) -> Option<OperationStats> {
    let mut total = stats.next()?.clone();
    for other in stats {
        total.absorb(other);
    }
    Some(total)
}
