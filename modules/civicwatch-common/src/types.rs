use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Points awarded to a citizen for each committed report.
pub const REPORT_POINTS: u32 = 10;

/// Points awarded to a user for each recorded vote.
pub const VOTE_POINTS: u32 = 2;

pub const DEFAULT_CATEGORY: &str = "General Maintenance";
pub const DEFAULT_TITLE: &str = "Reported Issue";

/// Prefix carried by ids of reports that only exist locally.
pub const TEMP_ID_PREFIX: &str = "temp-";

// --- Geo ---

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    New,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ReportStatus {
    /// Status implied by a progress value already clamped to 0..=100.
    pub fn for_progress(progress: u8) -> Self {
        match progress {
            0 => ReportStatus::New,
            100 => ReportStatus::Resolved,
            _ => ReportStatus::InProgress,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::New => write!(f, "New"),
            ReportStatus::InProgress => write!(f, "In Progress"),
            ReportStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(ReportStatus::New),
            "in progress" | "in_progress" | "inprogress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(format!("unknown report status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive match on the first word of free text ("high", "HIGH - urgent").
    pub fn parse_loose(text: &str) -> Option<Self> {
        let word = text
            .trim()
            .split(|c: char| !c.is_ascii_alphabetic())
            .find(|w| !w.is_empty())?;
        match word.to_ascii_lowercase().as_str() {
            "low" | "minor" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" | "major" => Some(Severity::High),
            "critical" | "severe" | "urgent" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// Higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Citizen,
    Authority,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Citizen => write!(f, "citizen"),
            UserRole::Authority => write!(f, "authority"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Support,
    Dispute,
}

// --- Report ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub reporter_name: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub category: String,
    pub severity: Severity,
    pub status: ReportStatus,
    pub progress: u8,
    pub image_url: String,
    pub support_count: u32,
    pub dispute_count: u32,
    pub supported_by: Vec<String>,
    pub disputed_by: Vec<String>,
    pub lat: f64,
    pub lng: f64,
    pub assigned_unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn temp_id() -> String {
        format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
    }

    pub fn is_local_only(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Copy with progress clamped to 0..=100 and status derived from it.
    pub fn with_progress(&self, progress: i32) -> Report {
        let progress = progress.clamp(0, 100) as u8;
        Report {
            progress,
            status: ReportStatus::for_progress(progress),
            ..self.clone()
        }
    }

    pub fn has_voted(&self, user_id: &str) -> bool {
        self.supported_by.iter().any(|id| id == user_id)
            || self.disputed_by.iter().any(|id| id == user_id)
    }

    /// Net community signal: supports minus disputes.
    pub fn community_score(&self) -> i64 {
        i64::from(self.support_count) - i64::from(self.dispute_count)
    }

    pub fn has_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && (self.lat.abs() > 0.0001 || self.lng.abs() > 0.0001)
    }
}

// --- User ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub points: u32,
    pub reports_count: u32,
    pub department: Option<String>,
}

impl User {
    pub fn is_authority(&self) -> bool {
        self.role == UserRole::Authority
    }
}

// --- Notification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    StatusUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub report_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            read: false,
            report_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_report(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }
}
