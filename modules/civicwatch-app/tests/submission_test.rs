use std::sync::Arc;

use civicwatch_app::submission::{AuditOutcome, ReportDraft, Submission, SubmissionPhase};
use civicwatch_app::testing::{
    identity_for, passing_verdict_json, rejecting_verdict_json, sample_report, sample_user, MockBackend,
    ScriptedModel, JPEG_DATA_URL, PUNE, STORAGE_URL,
};
use civicwatch_app::{App, AppSettings};
use civicwatch_common::{CivicError, ReportStatus, Severity, DEFAULT_CATEGORY, DEFAULT_TITLE, REPORT_POINTS};

fn garbage_draft() -> ReportDraft {
    ReportDraft {
        description: "overflowing garbage bin".to_string(),
        address: "MG Road, Pune".to_string(),
        image: Some(JPEG_DATA_URL.to_string()),
        coordinates: None,
    }
}

async fn signed_in_app(backend: Arc<MockBackend>, model: ScriptedModel) -> App {
    let mut app = App::new(backend, Arc::new(model), AppSettings::default());
    app.boot(None).await;
    assert!(app.state().is_authenticated());
    app
}

fn backend_with_citizen() -> Arc<MockBackend> {
    let user = sample_user("u1");
    Arc::new(
        MockBackend::new()
            .with_reports(vec![sample_report("existing")])
            .with_profile(user.clone())
            .with_session(identity_for(&user)),
    )
}

#[tokio::test]
async fn verified_submission_is_stored_and_credited() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new().json(passing_verdict_json(
        "Waste Management",
        "High",
        "Overflowing Garbage Bin",
    ));
    let mut app = signed_in_app(backend.clone(), model).await;

    let mut submission = Submission::new(garbage_draft());
    let outcome = app.audit_submission(&mut submission).await.unwrap();
    let AuditOutcome::Verified(classification) = outcome else {
        panic!("expected a verified audit, got {outcome:?}");
    };
    assert_eq!(classification.category, "Waste Management");
    assert_eq!(classification.severity, Severity::High);

    let report = app.commit_submission(&mut submission).await.unwrap();
    assert!(!report.is_local_only());
    assert_eq!(report.status, ReportStatus::New);
    assert_eq!(report.progress, 0);
    assert_eq!(report.title, "Overflowing Garbage Bin");
    assert_eq!(report.location, "MG Road, Pune, Maharashtra");
    assert_eq!((report.lat, report.lng), PUNE);
    assert!(report.image_url.starts_with(STORAGE_URL));
    assert_eq!(backend.uploads().len(), 1);

    assert_eq!(
        submission.phase(),
        &SubmissionPhase::Committed {
            report_id: report.id.clone()
        }
    );

    // Reconciled with the remote collection: newest first, no temp entries.
    let ids: Vec<&str> = app.state().reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![report.id.as_str(), "existing"]);

    let user = app.state().user.clone().unwrap();
    assert_eq!(user.points, REPORT_POINTS);
    assert_eq!(user.reports_count, 2);
    assert_eq!(backend.profile("u1").unwrap().points, REPORT_POINTS);
}

#[tokio::test]
async fn rejection_keeps_the_draft_for_editing() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new()
        .json(rejecting_verdict_json("The photo shows a tree, not a garbage bin."))
        .json(passing_verdict_json("Waste Management", "Medium", "Overflowing Bin"));
    let mut app = signed_in_app(backend.clone(), model).await;

    let mut submission = Submission::new(garbage_draft());
    let outcome = app.audit_submission(&mut submission).await.unwrap();
    assert_eq!(
        outcome,
        AuditOutcome::Rejected {
            reason: "The photo shows a tree, not a garbage bin.".to_string()
        }
    );
    assert_eq!(submission.draft, garbage_draft());
    assert!(submission.can_advance());
    assert_eq!(app.state().reports.len(), 1);
    assert!(backend.uploads().is_empty());

    // Committing a rejected attempt is refused.
    assert!(app.commit_submission(&mut submission).await.is_err());

    submission.draft.description = "Overflowing garbage bin near the bus stop".to_string();
    let retry = app.audit_submission(&mut submission).await.unwrap();
    assert!(matches!(retry, AuditOutcome::Verified(_)));
}

#[tokio::test]
async fn unparseable_audit_fails_closed() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new().json("I think this looks fine!");
    let mut app = signed_in_app(backend, model).await;

    let mut submission = Submission::new(garbage_draft());
    let outcome = app.audit_submission(&mut submission).await.unwrap();
    let AuditOutcome::Rejected { reason } = outcome else {
        panic!("expected a rejection, got {outcome:?}");
    };
    assert!(reason.to_lowercase().contains("technical anomaly"));
}

#[tokio::test]
async fn transport_failure_fails_closed() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new().json_error("connection reset");
    let mut app = signed_in_app(backend, model).await;

    let mut submission = Submission::new(garbage_draft());
    let outcome = app.audit_submission(&mut submission).await.unwrap();
    assert!(matches!(outcome, AuditOutcome::Rejected { .. }));
    assert!(matches!(submission.phase(), SubmissionPhase::Rejected { .. }));
}

#[tokio::test]
async fn failed_insert_rolls_back_exactly() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new().json(passing_verdict_json("Roads", "Low", "Pothole"));
    let mut app = signed_in_app(backend.clone(), model).await;
    let before = app.state().clone();

    let mut submission = Submission::new(garbage_draft());
    app.audit_submission(&mut submission).await.unwrap();

    backend.fail_inserts(true);
    let err = app.commit_submission(&mut submission).await.unwrap_err();
    assert!(matches!(err, CivicError::Remote(_)));

    assert_eq!(app.state().reports, before.reports);
    assert_eq!(app.state().user, before.user);
    assert!(matches!(submission.phase(), SubmissionPhase::RolledBack { .. }));
    assert!(submission.can_advance());
    assert_eq!(backend.stored_reports().len(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_the_saved_report() {
    let backend = backend_with_citizen();
    let model = ScriptedModel::new().json(passing_verdict_json("Roads", "Low", "Pothole"));
    let mut app = signed_in_app(backend.clone(), model).await;

    let mut submission = Submission::new(garbage_draft());
    app.audit_submission(&mut submission).await.unwrap();

    backend.fail_fetch(true);
    let report = app.commit_submission(&mut submission).await.unwrap();

    let reports = &app.state().reports;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].id, report.id);
    assert!(reports.iter().all(|r| !r.is_local_only()));
}

#[tokio::test]
async fn untyped_verdict_falls_back_to_labels_and_defaults() {
    let backend = backend_with_citizen();
    let verdict = serde_json::json!({
        "address_valid": true,
        "image_matches_description": true,
        "confidence_level": 0.9,
        "issue_analysis": "SEVERITY: critical | CATEGORY: Water Supply",
        "address": "",
        "reason": ""
    });
    let model = ScriptedModel::new().json(verdict.to_string());
    let mut app = signed_in_app(backend, model).await;

    let mut submission = Submission::new(ReportDraft {
        coordinates: Some((18.53, 73.84)),
        ..garbage_draft()
    });
    let AuditOutcome::Verified(classification) = app.audit_submission(&mut submission).await.unwrap() else {
        panic!("expected a verified audit");
    };
    assert_eq!(classification.category, "Water Supply");
    assert_eq!(classification.severity, Severity::Critical);
    assert_eq!(classification.title, DEFAULT_TITLE);
    assert_ne!(classification.category, DEFAULT_CATEGORY);

    let report = app.commit_submission(&mut submission).await.unwrap();
    assert_eq!(report.location, "MG Road, Pune");
    assert_eq!((report.lat, report.lng), (18.53, 73.84));
}

#[tokio::test]
async fn signed_out_audit_opens_prompt() {
    let backend = Arc::new(MockBackend::new());
    let model = Arc::new(ScriptedModel::new());
    let mut app = App::new(backend, model.clone(), AppSettings::default());
    app.boot(None).await;

    let mut submission = Submission::new(garbage_draft());
    let err = app.audit_submission(&mut submission).await.unwrap_err();
    assert!(matches!(err, CivicError::NotAuthenticated));
    assert!(app.state().auth_prompt_open);
    assert!(model.prompts().is_empty());
}

#[tokio::test]
async fn incomplete_draft_never_reaches_the_model() {
    let backend = backend_with_citizen();
    let model = Arc::new(ScriptedModel::new());
    let mut app = App::new(backend, model.clone(), AppSettings::default());
    app.boot(None).await;

    let mut submission = Submission::new(ReportDraft {
        image: None,
        ..garbage_draft()
    });
    let err = app.audit_submission(&mut submission).await.unwrap_err();
    assert!(matches!(err, CivicError::Validation(ref m) if m.contains("image")));
    assert!(model.prompts().is_empty());
}
