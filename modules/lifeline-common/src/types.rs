use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Reporter id recorded when a client submits without an account.
pub const ANONYMOUS_USER: &str = "ANONYMOUS";

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Police,
    Fire,
    Ambulance,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Police => write!(f, "police"),
            ServiceKind::Fire => write!(f, "fire"),
            ServiceKind::Ambulance => write!(f, "ambulance"),
        }
    }
}

impl ServiceKind {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "police" => Some(Self::Police),
            "fire" => Some(Self::Fire),
            "ambulance" => Some(Self::Ambulance),
            _ => None,
        }
    }

    /// Priority a new alert of this kind is created with.
    pub fn priority(&self) -> Priority {
        match self {
            ServiceKind::Police => Priority::High,
            ServiceKind::Fire | ServiceKind::Ambulance => Priority::Critical,
        }
    }

    /// Description used when the report carries none.
    pub fn default_description(&self) -> &'static str {
        match self {
            ServiceKind::Police => "Police assistance required",
            ServiceKind::Fire => "Fire emergency - assistance required",
            ServiceKind::Ambulance => "Medical emergency - ambulance required",
        }
    }

    /// What the responding facility is called for this service.
    pub fn facility_label(&self) -> &'static str {
        match self {
            ServiceKind::Police => "police station",
            ServiceKind::Fire => "fire station",
            ServiceKind::Ambulance => "health center",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

impl Priority {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
    Cancelled,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Pending => write!(f, "pending"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl AlertStatus {
    /// Active alerts are the only aggregation targets.
    pub fn is_active(&self) -> bool {
        matches!(self, AlertStatus::Pending | AlertStatus::Acknowledged)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Cancelled)
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

// --- Facility ---

/// A police station, fire station, or health center capable of receiving
/// dispatch. Registered externally; read-only to the engines. Deactivated
/// facilities stay on record but are excluded from nearest-search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub kind: ServiceKind,
    pub name: String,
    pub phone: String,
    pub location: GeoPoint,
    pub address: Option<String>,
    pub district: Option<String>,
    /// Push channel id for dispatch notifications. None means the facility
    /// has not registered a device yet.
    pub push_channel: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Reporter ---

/// One user's submission contributing to an alert. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporter {
    pub user_id: String,
    pub user_phone: Option<String>,
    pub reported_at: DateTime<Utc>,
    pub location: GeoPoint,
}

// --- Incident report (validated boundary product) ---

/// A validated incident submission. The HTTP boundary produces this; the
/// core never sees an untyped body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub user_id: Option<String>,
    pub user_phone: Option<String>,
    pub kind: ServiceKind,
    pub location: GeoPoint,
    pub description: Option<String>,
}

impl IncidentReport {
    pub fn reporter_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    pub fn to_reporter(&self, reported_at: DateTime<Utc>) -> Reporter {
        Reporter {
            user_id: self.reporter_id().to_string(),
            user_phone: self.user_phone.clone(),
            reported_at,
            location: self.location,
        }
    }
}

// --- Alert ---

/// A tracked emergency record, potentially carrying multiple witness
/// reports of the same event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: ServiceKind,
    pub status: AlertStatus,
    pub priority: Priority,
    /// Location of the first report, which is the canonical incident
    /// location. Does not move as reporters are added.
    pub location: GeoPoint,
    pub description: String,
    pub facility_id: Uuid,
    pub facility_name: String,
    /// Distance from the canonical location to the dispatched facility.
    pub distance_km: f64,
    /// Ordered; starts with exactly one entry (the creator).
    pub reporters: Vec<Reporter>,
    /// Denormalized; always recomputed from `reporters`.
    pub report_count: u32,
    /// Always false for root records; merges append to the root's reporter
    /// list instead of creating children.
    pub is_aggregated: bool,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub response_time: Option<DateTime<Utc>>,
    pub resolved_time: Option<DateTime<Utc>>,
}

impl Alert {
    /// Build a new root alert from a report and the facility it was
    /// dispatched to. Exactly one reporter, pending, priority from kind.
    pub fn new_root(
        report: &IncidentReport,
        facility: &Facility,
        distance_km: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let description = report
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| report.kind.default_description().to_string());

        Self {
            id: Uuid::new_v4(),
            kind: report.kind,
            status: AlertStatus::Pending,
            priority: report.kind.priority(),
            location: report.location,
            description,
            facility_id: facility.id,
            facility_name: facility.name.clone(),
            distance_km,
            reporters: vec![report.to_reporter(created_at)],
            report_count: 1,
            is_aggregated: false,
            notification_sent: false,
            created_at,
            response_time: None,
            resolved_time: None,
        }
    }

    pub fn has_reporter(&self, user_id: &str) -> bool {
        self.reporters.iter().any(|r| r.user_id == user_id)
    }

    /// Recompute `report_count` from the reporter list.
    pub fn recount(&mut self) {
        self.report_count = self.reporters.len() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colombo() -> GeoPoint {
        GeoPoint { lat: 6.9271, lng: 79.8612 }
    }

    fn test_facility(kind: ServiceKind) -> Facility {
        Facility {
            id: Uuid::new_v4(),
            kind,
            name: "Central Station".to_string(),
            phone: "0112345678".to_string(),
            location: colombo(),
            address: None,
            district: Some("Colombo".to_string()),
            push_channel: Some("channel-1".to_string()),
            active: true,
            created_at: Utc::now(),
        }
    }

    fn test_report(kind: ServiceKind) -> IncidentReport {
        IncidentReport {
            user_id: Some("user-1".to_string()),
            user_phone: Some("0771234567".to_string()),
            kind,
            location: colombo(),
            description: None,
        }
    }

    #[test]
    fn priority_derived_from_kind() {
        assert_eq!(ServiceKind::Police.priority(), Priority::High);
        assert_eq!(ServiceKind::Fire.priority(), Priority::Critical);
        assert_eq!(ServiceKind::Ambulance.priority(), Priority::Critical);
    }

    #[test]
    fn status_predicates() {
        assert!(AlertStatus::Pending.is_active());
        assert!(AlertStatus::Acknowledged.is_active());
        assert!(!AlertStatus::Resolved.is_active());
        assert!(AlertStatus::Resolved.is_terminal());
        assert!(AlertStatus::Cancelled.is_terminal());
        assert!(!AlertStatus::Pending.is_terminal());
    }

    #[test]
    fn new_root_starts_with_one_reporter() {
        let report = test_report(ServiceKind::Fire);
        let facility = test_facility(ServiceKind::Fire);
        let alert = Alert::new_root(&report, &facility, 2.5, Utc::now());

        assert_eq!(alert.status, AlertStatus::Pending);
        assert_eq!(alert.priority, Priority::Critical);
        assert_eq!(alert.reporters.len(), 1);
        assert_eq!(alert.report_count, 1);
        assert!(!alert.is_aggregated);
        assert_eq!(alert.facility_id, facility.id);
        assert_eq!(alert.description, "Fire emergency - assistance required");
        assert!(alert.has_reporter("user-1"));
        assert!(!alert.has_reporter("user-2"));
    }

    #[test]
    fn new_root_keeps_caller_description() {
        let mut report = test_report(ServiceKind::Police);
        report.description = Some("Break-in at the corner shop".to_string());
        let facility = test_facility(ServiceKind::Police);
        let alert = Alert::new_root(&report, &facility, 1.0, Utc::now());
        assert_eq!(alert.description, "Break-in at the corner shop");
    }

    #[test]
    fn anonymous_reporter_id_default() {
        let mut report = test_report(ServiceKind::Police);
        report.user_id = None;
        assert_eq!(report.reporter_id(), ANONYMOUS_USER);
    }

    #[test]
    fn kind_round_trips_loose_parse() {
        assert_eq!(ServiceKind::from_str_loose("Police"), Some(ServiceKind::Police));
        assert_eq!(ServiceKind::from_str_loose("FIRE"), Some(ServiceKind::Fire));
        assert_eq!(ServiceKind::from_str_loose("rescue"), None);
    }
}
