//! End-to-end report intake: aggregation, dispatch, notification, and
//! lifecycle, wired through ReportService against in-memory stores.

use std::sync::Arc;

use chrono::Duration;

use lifeline_common::{AlertStatus, GeoPoint, LifelineError, ServiceKind, METERS_PER_DEG_LAT};
use lifeline_engine::testutil::{
    facility_at, report_at, FailingPush, MemoryAlertStore, MemoryFacilityDirectory, RecordingPush,
};
use lifeline_engine::{AggregationPolicy, AlertStore, Lifecycle, ReportService};

fn colombo() -> GeoPoint {
    GeoPoint { lat: 6.9271, lng: 79.8612 }
}

fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
    GeoPoint {
        lat: origin.lat + meters / METERS_PER_DEG_LAT,
        lng: origin.lng,
    }
}

/// One facility of each kind, ~2 km north of Colombo.
fn directory() -> MemoryFacilityDirectory {
    MemoryFacilityDirectory::with(vec![
        facility_at(ServiceKind::Police, 6.9451, 79.8612, "Central Police"),
        facility_at(ServiceKind::Fire, 6.9451, 79.8612, "Central Fire"),
        facility_at(ServiceKind::Ambulance, 6.9451, 79.8612, "Central Hospital"),
    ])
}

fn service(
    alerts: Arc<MemoryAlertStore>,
    push: Arc<RecordingPush>,
) -> ReportService {
    ReportService::new(alerts, Arc::new(directory()), push, AggregationPolicy::default())
}

#[tokio::test]
async fn first_report_creates_and_dispatches() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let out = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();

    assert!(!out.merged);
    assert_eq!(out.report_count, 1);
    let dispatch = out.dispatch.expect("new incident carries dispatch details");
    assert_eq!(dispatch.facility_name, "Central Fire");
    assert!((dispatch.distance_km - 2.0).abs() < 0.05);
    assert!(dispatch.notification_sent);
    assert_eq!(push.sent().await.len(), 1);
}

#[tokio::test]
async fn second_nearby_report_merges_without_dispatch() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();

    let second = svc
        .submit(report_at(
            ServiceKind::Fire,
            north_of(colombo(), 5.0),
            "user-2",
        ))
        .await
        .unwrap();

    assert!(second.merged);
    assert_eq!(second.alert.id, first.alert.id);
    assert_eq!(second.report_count, 2);
    assert!(second.dispatch.is_none());
    // No second push: one incident, one notification.
    assert_eq!(push.sent().await.len(), 1);
    // The canonical location stays at the first report.
    assert_eq!(second.alert.location, colombo());
}

#[tokio::test]
async fn report_past_radius_creates_a_second_incident() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    svc.submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();
    let out = svc
        .submit(report_at(
            ServiceKind::Fire,
            north_of(colombo(), 10.01),
            "user-2",
        ))
        .await
        .unwrap();

    assert!(!out.merged);
    assert_eq!(alerts.recent(None, 10).await.unwrap().len(), 2);
    assert_eq!(push.sent().await.len(), 2);
}

#[tokio::test]
async fn stale_alert_is_not_a_merge_target() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Police, colombo(), "user-1"))
        .await
        .unwrap();

    // Age the alert past the 90s window.
    let mut aged = first.alert.clone();
    aged.created_at = aged.created_at - Duration::seconds(91);
    alerts.save(aged).await.unwrap();

    let out = svc
        .submit(report_at(ServiceKind::Police, colombo(), "user-2"))
        .await
        .unwrap();
    assert!(!out.merged);
}

#[tokio::test]
async fn duplicate_reporter_is_surfaced_and_idempotent() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Police, colombo(), "user-1"))
        .await
        .unwrap();

    let err = svc
        .submit(report_at(ServiceKind::Police, colombo(), "user-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifelineError::DuplicateReporter));

    let alert = alerts.find_by_id(first.alert.id).await.unwrap().unwrap();
    assert_eq!(alert.report_count, 1);
}

#[tokio::test]
async fn anonymous_reports_deduplicate_on_the_sentinel() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let mut report = report_at(ServiceKind::Police, colombo(), "ignored");
    report.user_id = None;
    svc.submit(report.clone()).await.unwrap();

    // A second anonymous report nearby carries the same sentinel id.
    let err = svc.submit(report).await.unwrap_err();
    assert!(matches!(err, LifelineError::DuplicateReporter));
}

#[tokio::test]
async fn no_facility_of_kind_fails_without_persisting() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let dir = MemoryFacilityDirectory::with(vec![facility_at(
        ServiceKind::Police,
        6.9451,
        79.8612,
        "Central Police",
    )]);
    let svc = ReportService::new(
        alerts.clone(),
        Arc::new(dir),
        push,
        AggregationPolicy::default(),
    );

    let err = svc
        .submit(report_at(ServiceKind::Ambulance, colombo(), "user-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifelineError::NoFacilityAvailable(ServiceKind::Ambulance)
    ));
    assert!(alerts.recent(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn push_failure_still_creates_the_alert() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let svc = ReportService::new(
        alerts.clone(),
        Arc::new(directory()),
        Arc::new(FailingPush),
        AggregationPolicy::default(),
    );

    let out = svc
        .submit(report_at(ServiceKind::Ambulance, colombo(), "user-1"))
        .await
        .unwrap();

    let dispatch = out.dispatch.expect("dispatch details");
    assert!(!dispatch.notification_sent);
    assert!(alerts.find_by_id(out.alert.id).await.unwrap().is_some());
}

#[tokio::test]
async fn invalid_coordinates_are_rejected_before_any_store_access() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let report = report_at(
        ServiceKind::Fire,
        GeoPoint { lat: 95.0, lng: 79.8612 },
        "user-1",
    );
    let err = svc.submit(report).await.unwrap_err();

    assert!(matches!(err, LifelineError::Validation(_)));
    assert!(alerts.recent(None, 10).await.unwrap().is_empty());
    assert!(push.sent().await.is_empty());
}

#[tokio::test]
async fn merged_alert_still_acknowledges_and_resolves() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();
    svc.submit(report_at(ServiceKind::Fire, north_of(colombo(), 3.0), "user-2"))
        .await
        .unwrap();

    let lifecycle = Lifecycle::new(alerts.clone());
    let acked = lifecycle.acknowledge(first.alert.id).await.unwrap();
    assert_eq!(acked.status, AlertStatus::Acknowledged);
    assert_eq!(acked.report_count, 2);

    let resolved = lifecycle.resolve(first.alert.id, None).await.unwrap();
    assert_eq!(resolved.status, AlertStatus::Resolved);
}

#[tokio::test]
async fn acknowledged_alert_remains_a_merge_target() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();
    Lifecycle::new(alerts.clone())
        .acknowledge(first.alert.id)
        .await
        .unwrap();

    let out = svc
        .submit(report_at(ServiceKind::Fire, north_of(colombo(), 4.0), "user-2"))
        .await
        .unwrap();
    assert!(out.merged);
    assert_eq!(out.alert.id, first.alert.id);
}

#[tokio::test]
async fn cancelled_alert_is_not_a_merge_target() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = service(alerts.clone(), push.clone());

    let first = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-1"))
        .await
        .unwrap();
    Lifecycle::new(alerts.clone())
        .cancel(first.alert.id)
        .await
        .unwrap();

    let out = svc
        .submit(report_at(ServiceKind::Fire, colombo(), "user-2"))
        .await
        .unwrap();
    assert!(!out.merged);
    assert_ne!(out.alert.id, first.alert.id);
}

#[tokio::test]
async fn concurrent_same_bucket_reports_converge_on_one_alert() {
    let alerts = Arc::new(MemoryAlertStore::new());
    let push = Arc::new(RecordingPush::new());
    let svc = Arc::new(service(alerts.clone(), push.clone()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.submit(report_at(
                ServiceKind::Fire,
                colombo(),
                &format!("user-{i}"),
            ))
            .await
        }));
    }

    let mut merged = 0;
    let mut created = 0;
    for handle in handles {
        let out = handle.await.unwrap().unwrap();
        if out.merged {
            merged += 1;
        } else {
            created += 1;
        }
    }

    assert_eq!(created, 1, "bucket lock must serialize merge-vs-create");
    assert_eq!(merged, 7);
    assert_eq!(push.sent().await.len(), 1);

    let roots = alerts.recent(Some(ServiceKind::Fire), 10).await.unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].report_count, 8);
}
