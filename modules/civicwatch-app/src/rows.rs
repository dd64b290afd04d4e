//! Remote row shapes for the `reports` and `profiles` tables.
//!
//! Conversions are one-to-one field mappings. The only normalisation is on
//! read: status is re-derived from progress so a loaded report always
//! satisfies the progress/status invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use civicwatch_common::{Report, Severity, User, UserRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    #[serde(default)]
    pub reporter_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub support_count: i32,
    #[serde(default)]
    pub dispute_count: i32,
    #[serde(default)]
    pub supported_by: Option<Vec<String>>,
    #[serde(default)]
    pub disputed_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Report> for ReportRow {
    fn from(r: &Report) -> Self {
        Self {
            id: r.id.clone(),
            reporter_id: r.reporter_id.clone(),
            reporter_name: r.reporter_name.clone(),
            title: r.title.clone(),
            description: r.description.clone(),
            location: r.location.clone(),
            category: r.category.clone(),
            severity: r.severity.to_string(),
            status: r.status.to_string(),
            progress: i32::from(r.progress),
            image_url: Some(r.image_url.clone()),
            lat: Some(r.lat),
            lng: Some(r.lng),
            support_count: r.support_count as i32,
            dispute_count: r.dispute_count as i32,
            supported_by: Some(r.supported_by.clone()),
            disputed_by: Some(r.disputed_by.clone()),
            assigned_unit: r.assigned_unit.clone(),
            created_at: Some(r.created_at),
        }
    }
}

impl From<ReportRow> for Report {
    fn from(row: ReportRow) -> Self {
        let base = Report {
            id: row.id,
            reporter_id: row.reporter_id,
            reporter_name: row.reporter_name,
            title: row.title,
            description: row.description,
            location: row.location,
            category: row.category,
            severity: Severity::parse_loose(&row.severity).unwrap_or_default(),
            status: civicwatch_common::ReportStatus::New,
            progress: 0,
            image_url: row.image_url.unwrap_or_default(),
            support_count: row.support_count.max(0) as u32,
            dispute_count: row.dispute_count.max(0) as u32,
            supported_by: row.supported_by.unwrap_or_default(),
            disputed_by: row.disputed_by.unwrap_or_default(),
            lat: row.lat.unwrap_or(0.0),
            lng: row.lng.unwrap_or(0.0),
            assigned_unit: row.assigned_unit,
            created_at: row.created_at.unwrap_or_else(Utc::now),
        };
        base.with_progress(row.progress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub points: Option<i32>,
    #[serde(default)]
    pub department: Option<String>,
}

pub fn parse_role(raw: Option<&str>) -> UserRole {
    match raw.map(|r| r.trim().to_ascii_lowercase()) {
        Some(r) if r == "authority" => UserRole::Authority,
        _ => UserRole::Citizen,
    }
}

impl From<&User> for ProfileRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            email: Some(u.email.clone()),
            full_name: Some(u.name.clone()),
            role: Some(u.role.to_string()),
            points: Some(u.points as i32),
            department: u.department.clone(),
        }
    }
}

impl From<ProfileRow> for User {
    /// `reports_count` is not stored remotely; callers derive it from the report collection.
    fn from(row: ProfileRow) -> Self {
        let email = row.email.unwrap_or_default();
        let name = row
            .full_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        Self {
            id: row.id,
            role: parse_role(row.role.as_deref()),
            points: row.points.unwrap_or(0).max(0) as u32,
            reports_count: 0,
            department: row.department,
            email,
            name,
        }
    }
}
