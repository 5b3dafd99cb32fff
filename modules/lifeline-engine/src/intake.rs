//! Report intake: the control flow tying the engines together.
//!
//! validate -> bucket lock -> try_merge -> dispatch on no match.

use std::sync::Arc;

use lifeline_common::{Alert, GeoPoint, IncidentReport, LifelineError};

use crate::aggregation::{AggregationPolicy, Aggregator, MergeDecision};
use crate::buckets::BucketLocks;
use crate::dispatch::{Dispatched, Dispatcher};
use crate::notify::PushBackend;
use crate::traits::{AlertStore, FacilityDirectory};

/// Dispatch details returned alongside a newly created alert.
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub facility_name: String,
    pub distance_km: f64,
    pub notification_sent: bool,
}

/// What happened to a submitted report.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    /// True when the report was folded into an existing alert.
    pub merged: bool,
    pub alert: Alert,
    pub report_count: u32,
    /// Present only when a new incident was created.
    pub dispatch: Option<DispatchSummary>,
}

/// Front door for citizen reports.
pub struct ReportService {
    aggregator: Aggregator,
    dispatcher: Dispatcher,
    locks: BucketLocks,
}

impl ReportService {
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        facilities: Arc<dyn FacilityDirectory>,
        push: Arc<dyn PushBackend>,
        policy: AggregationPolicy,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(alerts.clone(), policy),
            dispatcher: Dispatcher::new(alerts, facilities, push),
            locks: BucketLocks::new(),
        }
    }

    /// Submit one report: merge it into a recent nearby alert of the same
    /// kind, or dispatch a new incident to the nearest facility.
    ///
    /// The merge-vs-create decision runs under the report's bucket lock, so
    /// two near-simultaneous reports of the same event converge on one
    /// alert instead of dispatching twice.
    pub async fn submit(&self, report: IncidentReport) -> Result<ReportOutcome, LifelineError> {
        // Coordinates are validated before any store access.
        GeoPoint::checked(report.location.lat, report.location.lng)?;

        let bucket = self.locks.lock_for(report.kind, report.location).await;
        let _guard = bucket.lock().await;

        match self.aggregator.try_merge(&report).await? {
            MergeDecision::Merged(alert) => Ok(ReportOutcome {
                merged: true,
                report_count: alert.report_count,
                alert,
                dispatch: None,
            }),
            MergeDecision::AlreadyReported { .. } => Err(LifelineError::DuplicateReporter),
            MergeDecision::NoMatch => {
                let Dispatched {
                    alert,
                    facility_name,
                    distance_km,
                    notification_sent,
                } = self.dispatcher.dispatch(&report).await?;

                Ok(ReportOutcome {
                    merged: false,
                    report_count: alert.report_count,
                    dispatch: Some(DispatchSummary {
                        facility_name,
                        distance_km,
                        notification_sent,
                    }),
                    alert,
                })
            }
        }
    }
}
