// Report submission: capture -> AI audit -> optimistic insert -> persist.
//
// Phases per attempt:
//   Capturing -> Auditing -> Rejected (back to Capturing, fields kept)
//                         -> Verified -> Committing -> Committed
//                                                   -> RolledBack (back to Capturing)
//
// The optimistic entry carries a temp id. On a failed insert it is removed
// again, so the visible collection is exactly what it was before the attempt.

use ai_client::InlineImage;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use civicwatch_common::error::Result;
use civicwatch_common::{CivicError, Report, ReportStatus, User};

use crate::audit::{classify, AuditVerdict, Auditor, IssueClassification};
use crate::facade::Facade;
use crate::state::{Action, Store};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub description: String,
    pub address: String,
    /// Encoded photo as a `data:` URL.
    pub image: Option<String>,
    pub coordinates: Option<(f64, f64)>,
}

impl ReportDraft {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.address.trim().is_empty() {
            missing.push("address");
        }
        if self.image.as_deref().map_or(true, |i| i.trim().is_empty()) {
            missing.push("image");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionPhase {
    Capturing,
    Auditing,
    Rejected { reason: String },
    Verified { verdict: AuditVerdict, classification: IssueClassification },
    Committing,
    Committed { report_id: String },
    RolledBack { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Verified(IssueClassification),
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub draft: ReportDraft,
    phase: SubmissionPhase,
}

impl Default for Submission {
    fn default() -> Self {
        Self::new(ReportDraft::default())
    }
}

impl Submission {
    pub fn new(draft: ReportDraft) -> Self {
        Self {
            draft,
            phase: SubmissionPhase::Capturing,
        }
    }

    pub fn phase(&self) -> &SubmissionPhase {
        &self.phase
    }

    /// Whether the draft may be sent for audit now.
    pub fn can_advance(&self) -> bool {
        self.is_editable() && self.draft.is_complete()
    }

    fn is_editable(&self) -> bool {
        matches!(
            self.phase,
            SubmissionPhase::Capturing
                | SubmissionPhase::Rejected { .. }
                | SubmissionPhase::RolledBack { .. }
        )
    }

    /// Run the audit. Rejection keeps every field so the user can edit and retry.
    pub async fn audit(&mut self, auditor: &Auditor) -> Result<AuditOutcome> {
        if !self.is_editable() {
            return Err(CivicError::Validation(format!(
                "cannot audit a submission in phase {:?}",
                self.phase
            )));
        }
        let missing = self.draft.missing_fields();
        if !missing.is_empty() {
            return Err(CivicError::Validation(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        let encoded = self.draft.image.as_deref().unwrap_or_default();
        let image = InlineImage::from_data_url(encoded)
            .map_err(|e| CivicError::Validation(format!("photo must be an encoded image: {e}")))?;

        self.phase = SubmissionPhase::Auditing;
        let verdict = auditor
            .audit(self.draft.description.trim(), self.draft.address.trim(), &image)
            .await;

        if !verdict.passed() {
            let reason = verdict.rejection_reason();
            info!(reason = %reason, "Submission rejected by audit");
            self.phase = SubmissionPhase::Rejected {
                reason: reason.clone(),
            };
            return Ok(AuditOutcome::Rejected { reason });
        }

        let classification = classify(&verdict);
        info!(
            category = %classification.category,
            severity = %classification.severity,
            "Submission verified"
        );
        self.phase = SubmissionPhase::Verified {
            verdict,
            classification: classification.clone(),
        };
        Ok(AuditOutcome::Verified(classification))
    }

    /// Insert optimistically, persist, then reconcile with the remote collection.
    ///
    /// On a failed insert the optimistic entry is removed and the error returned.
    pub async fn commit(
        &mut self,
        store: &mut Store,
        facade: &Facade,
        reporter: &User,
        fallback: (f64, f64),
    ) -> Result<Report> {
        let SubmissionPhase::Verified { verdict, classification } = &self.phase else {
            return Err(CivicError::Validation(
                "submission must pass the audit before it is committed".to_string(),
            ));
        };

        let location = if verdict.address.trim().is_empty() {
            self.draft.address.trim().to_string()
        } else {
            verdict.address.trim().to_string()
        };
        let (lat, lng) = self.draft.coordinates.unwrap_or(fallback);

        let optimistic = Report {
            id: Report::temp_id(),
            reporter_id: reporter.id.clone(),
            reporter_name: reporter.name.clone(),
            title: classification.title.clone(),
            description: self.draft.description.trim().to_string(),
            location,
            category: classification.category.clone(),
            severity: classification.severity,
            status: ReportStatus::New,
            progress: 0,
            image_url: self.draft.image.clone().unwrap_or_default(),
            support_count: 0,
            dispute_count: 0,
            supported_by: Vec::new(),
            disputed_by: Vec::new(),
            lat,
            lng,
            assigned_unit: None,
            created_at: Utc::now(),
        };
        let temp_id = optimistic.id.clone();

        self.phase = SubmissionPhase::Committing;
        store.dispatch(Action::ReportAdded(optimistic.clone()));

        let permanent = Report {
            id: Uuid::new_v4().to_string(),
            ..optimistic
        };

        let stored = match facade.save_report(&permanent).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, temp_id = %temp_id, "Report save failed, rolling back");
                store.dispatch(Action::ReportRemoved(temp_id));
                self.phase = SubmissionPhase::RolledBack {
                    error: e.to_string(),
                };
                return Err(e);
            }
        };

        match facade.try_get_all_reports().await {
            Ok(reports) => store.dispatch(Action::ReportsLoaded(reports)),
            Err(e) => {
                warn!(error = %e, "Refresh after save failed, keeping the saved report");
                store.dispatch(Action::ReportPromoted {
                    temp_id,
                    report: stored.clone(),
                });
            }
        }

        self.phase = SubmissionPhase::Committed {
            report_id: stored.id.clone(),
        };
        Ok(stored)
    }

    /// Leave a rejected or rolled-back attempt and edit the draft again.
    pub fn return_to_capture(&mut self) {
        if self.is_editable() {
            self.phase = SubmissionPhase::Capturing;
        }
    }
}
