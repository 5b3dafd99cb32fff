//! Advisory locks serializing the merge-vs-create decision per spatial
//! bucket. Two reports of the same kind landing in the same geohash cell
//! take the same lock, so they cannot both miss each other's not-yet-written
//! alert and dispatch twice. Reports in different cells never contend.
//!
//! The lock is in-process only. Across processes the read-then-write race
//! remains; see DESIGN.md.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use lifeline_common::{GeoPoint, ServiceKind};

/// Geohash precision for the bucket key. Precision-7 cells are roughly
/// 150 m across, comfortably covering the 10 m aggregation radius.
const BUCKET_PRECISION: usize = 7;

/// Bucket key for a report: service kind plus geohash cell.
pub fn bucket_key(kind: ServiceKind, location: GeoPoint) -> String {
    // Coordinates are range-checked at ingestion; a failed encode collapses
    // to a single shared bucket rather than skipping serialization.
    let cell = geohash::encode(
        geohash::Coord {
            x: location.lng,
            y: location.lat,
        },
        BUCKET_PRECISION,
    )
    .unwrap_or_default();

    format!("{kind}:{cell}")
}

/// Per-bucket advisory locks. Clone-cheap; all clones share one lock table.
#[derive(Clone, Default)]
pub struct BucketLocks {
    // Entries are never evicted. Bounded in practice by the number of cells
    // reports actually arrive from.
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl BucketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one (kind, cell) bucket. Callers hold the guard
    /// across the whole merge-vs-create decision.
    pub async fn lock_for(&self, kind: ServiceKind, location: GeoPoint) -> Arc<Mutex<()>> {
        let key = bucket_key(kind, location);
        let mut table = self.inner.lock().await;
        table
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_cell_same_key() {
        let a = GeoPoint { lat: 6.9271, lng: 79.8612 };
        // 5m north: same precision-7 cell
        let b = GeoPoint { lat: 6.92714, lng: 79.8612 };
        assert_eq!(
            bucket_key(ServiceKind::Fire, a),
            bucket_key(ServiceKind::Fire, b)
        );
    }

    #[test]
    fn kind_separates_buckets() {
        let p = GeoPoint { lat: 6.9271, lng: 79.8612 };
        assert_ne!(
            bucket_key(ServiceKind::Fire, p),
            bucket_key(ServiceKind::Police, p)
        );
    }

    #[test]
    fn distant_points_separate_buckets() {
        let colombo = GeoPoint { lat: 6.9271, lng: 79.8612 };
        let kandy = GeoPoint { lat: 7.2906, lng: 80.6337 };
        assert_ne!(
            bucket_key(ServiceKind::Police, colombo),
            bucket_key(ServiceKind::Police, kandy)
        );
    }

    #[tokio::test]
    async fn lock_handles_are_shared_per_bucket() {
        let locks = BucketLocks::new();
        let p = GeoPoint { lat: 6.9271, lng: 79.8612 };
        let a = locks.lock_for(ServiceKind::Fire, p).await;
        let b = locks.lock_for(ServiceKind::Fire, p).await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.lock_for(ServiceKind::Police, p).await;
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
