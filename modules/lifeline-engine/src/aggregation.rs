//! Merge-vs-create decision for incoming reports.
//!
//! A report within the time window and radius of an existing active alert of
//! the same kind is folded into that alert as an extra reporter instead of
//! dispatching a second crew to the same event.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use lifeline_common::{Alert, IncidentReport, LifelineError};

use crate::traits::AlertStore;

/// Thresholds for treating two reports as the same physical event.
/// Explicit construction input so tests can tighten or widen them.
#[derive(Debug, Clone)]
pub struct AggregationPolicy {
    /// How far back to scan for mergeable alerts.
    pub window: Duration,
    /// Maximum distance between the report and the alert's canonical
    /// location, in meters.
    pub radius_m: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            window: Duration::seconds(90),
            radius_m: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum MergeDecision {
    /// Report appended to an existing alert; no dispatch happens.
    Merged(Alert),
    /// The same user already reported this incident. No mutation.
    AlreadyReported { alert_id: Uuid },
    /// Nothing mergeable in range; the caller creates a new incident.
    NoMatch,
}

pub struct Aggregator {
    alerts: Arc<dyn AlertStore>,
    policy: AggregationPolicy,
}

impl Aggregator {
    pub fn new(alerts: Arc<dyn AlertStore>, policy: AggregationPolicy) -> Self {
        Self { alerts, policy }
    }

    /// Scan recent active alerts of the report's kind and merge into the
    /// first one within the radius.
    ///
    /// First match wins, not nearest: candidates arrive in store scan order
    /// and the scan stops at the first alert inside the radius. With a 10 m
    /// radius any two candidates this close describe the same event, so the
    /// extra precision of a nearest pass buys nothing.
    pub async fn try_merge(&self, report: &IncidentReport) -> Result<MergeDecision, LifelineError> {
        let threshold = Utc::now() - self.policy.window;

        let candidates = self
            .alerts
            .find_active_by_kind_since(report.kind, threshold)
            .await
            .map_err(|e| LifelineError::Store(e.to_string()))?;

        debug!(
            kind = %report.kind,
            candidates = candidates.len(),
            "scanning recent alerts for aggregation"
        );

        for candidate in candidates {
            let meters = report.location.distance_m(&candidate.location);
            if meters > self.policy.radius_m {
                continue;
            }

            if candidate.has_reporter(report.reporter_id()) {
                return Ok(MergeDecision::AlreadyReported {
                    alert_id: candidate.id,
                });
            }

            let updated = self
                .alerts
                .append_reporter(candidate.id, report.to_reporter(Utc::now()))
                .await
                .map_err(|e| LifelineError::Store(e.to_string()))?;

            info!(
                alert_id = %updated.id,
                report_count = updated.report_count,
                distance_m = meters,
                "merged report into existing alert"
            );

            return Ok(MergeDecision::Merged(updated));
        }

        Ok(MergeDecision::NoMatch)
    }
}
