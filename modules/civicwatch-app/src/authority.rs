//! Authority-side report updates: progress and crew assignment.

use civicwatch_common::{CivicError, Report, ReportStatus, User};
use civicwatch_common::error::Result;

/// Progress given to a New report when a crew is first assigned.
pub const ASSIGNMENT_PROGRESS: i32 = 10;

pub fn require_authority(user: Option<&User>) -> Result<&User> {
    let user = user.ok_or(CivicError::NotAuthenticated)?;
    if !user.is_authority() {
        return Err(CivicError::Forbidden(format!(
            "{} is not an authority account",
            user.email
        )));
    }
    Ok(user)
}

pub fn set_progress(report: &Report, progress: i32) -> Report {
    report.with_progress(progress)
}

/// Assign a crew. A report still in New starts moving.
pub fn assign_unit(report: &Report, unit: &str) -> Result<Report> {
    let unit = unit.trim();
    if unit.is_empty() {
        return Err(CivicError::Validation("unit name must not be empty".to_string()));
    }
    let mut next = if report.status == ReportStatus::New {
        report.with_progress(ASSIGNMENT_PROGRESS)
    } else {
        report.clone()
    };
    next.assigned_unit = Some(unit.to_string());
    Ok(next)
}
