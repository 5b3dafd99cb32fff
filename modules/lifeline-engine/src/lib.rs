//! Core decision logic for emergency dispatch.
//!
//! A citizen report either merges into a recent nearby alert of the same
//! kind (aggregation) or becomes a new incident dispatched to the nearest
//! active facility, with a best-effort push to that facility. Alert status
//! then moves through a guarded lifecycle.
//!
//! The engines hold no persistent state. They are decision logic over the
//! `AlertStore`, `FacilityDirectory`, and `PushBackend` collaborators handed
//! to them at construction; Postgres implementations live in
//! `lifeline-store`.

pub mod aggregation;
pub mod buckets;
pub mod dispatch;
pub mod intake;
pub mod lifecycle;
pub mod notify;
pub mod testutil;
pub mod traits;

pub use aggregation::{AggregationPolicy, Aggregator, MergeDecision};
pub use buckets::BucketLocks;
pub use dispatch::{Dispatched, Dispatcher};
pub use intake::{DispatchSummary, ReportOutcome, ReportService};
pub use lifecycle::Lifecycle;
pub use notify::{DispatchNote, NoopPush, PushBackend, WebhookPush};
pub use traits::{AlertStore, FacilityDirectory, StatusUpdate};
