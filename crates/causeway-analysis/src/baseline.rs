//! Historical error-rate baselines
//!
//! Averages ERROR counts per calendar day over a trailing window that
//! ends one day before "now", so the incident under analysis never
//! contributes to its own baseline. Results are cached per
//! (service, window) with a TTL; a miss or expiry recomputes.

use crate::cache::QueryCache;
use crate::window::TimeWindow;
use causeway_store::{Aggregation, DocumentStore, SearchRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default trailing window length in days
pub const DEFAULT_BASELINE_DAYS: u32 = 7;

/// Floor applied to a baseline rate before dividing by it
///
/// An all-zero baseline means "no historical signal", not a literal zero
/// error rate; ratios are computed against `max(epsilon, baseline)`.
pub const BASELINE_EPSILON: f64 = 0.1;

/// Average historical error rates for one service
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBaseline {
    pub avg_per_day: f64,
    pub avg_per_hour: f64,
    pub avg_per_minute: f64,
}

impl ErrorBaseline {
    /// The no-historical-signal baseline
    #[inline]
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Derive all rates from an average daily count
    #[inline]
    #[must_use]
    pub fn from_daily_average(avg_per_day: f64) -> Self {
        Self {
            avg_per_day,
            avg_per_hour: avg_per_day / 24.0,
            avg_per_minute: avg_per_day / 24.0 / 60.0,
        }
    }

    /// Whether there is no historical signal
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.avg_per_day == 0.0
    }

    /// How many times above baseline the current per-minute rate is
    ///
    /// Never divides by zero: the baseline is floored at
    /// [`BASELINE_EPSILON`].
    #[inline]
    #[must_use]
    pub fn burst_ratio(&self, current_per_minute: f64) -> f64 {
        current_per_minute / self.avg_per_minute.max(BASELINE_EPSILON)
    }
}

/// Computes and caches per-service baselines
pub struct BaselineEstimator {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
    index: String,
}

impl BaselineEstimator {
    /// Create an estimator over the given logs index
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache, index: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            index: index.into(),
        }
    }

    /// Baseline error rates for `service` over the trailing `days`
    ///
    /// Days without any data are excluded from the average. No data at
    /// all, or a failed query, yields the all-zero baseline; query
    /// failures are logged and not cached.
    pub async fn baseline(
        &self,
        service: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> ErrorBaseline {
        let window = TimeWindow::baseline_window(now, days);
        let key = format!(
            "baseline:{service}:{}:{}",
            window.start().timestamp(),
            window.end().timestamp()
        );
        if let Some(cached) = self.cache.get::<ErrorBaseline>(&key) {
            return cached;
        }

        let request = SearchRequest::counts()
            .window(window.start(), window.end())
            .levels(["ERROR"])
            .term("service", service)
            .agg("errors_per_day", Aggregation::calendar_histogram("timestamp", "day"));

        let response = match self.store.search(&self.index, &request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%service, %err, "baseline query failed; treating as no history");
                return ErrorBaseline::zero();
            }
        };

        let mut total_errors = 0u64;
        let mut days_with_data = 0u64;
        if let Some(per_day) = response.agg("errors_per_day") {
            for bucket in per_day.buckets() {
                if bucket.doc_count > 0 {
                    total_errors += bucket.doc_count;
                    days_with_data += 1;
                }
            }
        }

        let baseline = if days_with_data == 0 {
            ErrorBaseline::zero()
        } else {
            ErrorBaseline::from_daily_average(total_errors as f64 / days_with_data as f64)
        };
        self.cache.insert(key, baseline);
        baseline
    }
}
