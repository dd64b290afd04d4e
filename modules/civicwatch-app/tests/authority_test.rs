use std::sync::Arc;

use civicwatch_app::testing::{identity_for, sample_authority, sample_report, sample_user, MockBackend, ScriptedModel};
use civicwatch_app::{App, AppSettings};
use civicwatch_common::{CivicError, NotificationKind, ReportStatus, User};

async fn boot_as(user: &User, reports: Vec<civicwatch_common::Report>) -> (App, Arc<MockBackend>) {
    let backend = Arc::new(
        MockBackend::new()
            .with_reports(reports)
            .with_profile(user.clone())
            .with_session(identity_for(user)),
    );
    let mut app = App::new(backend.clone(), Arc::new(ScriptedModel::new()), AppSettings::default());
    app.boot(None).await;
    (app, backend)
}

#[tokio::test]
async fn progress_moves_status_through_lifecycle() {
    let (mut app, backend) = boot_as(&sample_authority("a1"), vec![sample_report("r1")]).await;

    let started = app.update_progress("r1", 40).await.unwrap();
    assert_eq!(started.status, ReportStatus::InProgress);

    let reopened = app.update_progress("r1", 0).await.unwrap();
    assert_eq!(reopened.status, ReportStatus::New);

    let done = app.update_progress("r1", 250).await.unwrap();
    assert_eq!(done.progress, 100);
    assert_eq!(done.status, ReportStatus::Resolved);
    assert_eq!(backend.stored_report("r1").unwrap().status, ReportStatus::Resolved);
    assert_eq!(backend.update_calls(), 3);

    let resolved: Vec<_> = app
        .state()
        .notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::StatusUpdate)
        .collect();
    assert_eq!(resolved.len(), 1);
}

#[tokio::test]
async fn assignment_starts_work_on_new_reports() {
    let (mut app, backend) = boot_as(&sample_authority("a1"), vec![sample_report("r1")]).await;

    let assigned = app.assign_unit("r1", "Ward 12 Sanitation").await.unwrap();
    assert_eq!(assigned.assigned_unit.as_deref(), Some("Ward 12 Sanitation"));
    assert_eq!(assigned.status, ReportStatus::InProgress);
    assert_eq!(assigned.progress, 10);
    assert_eq!(backend.stored_report("r1").unwrap(), assigned);

    let err = app.assign_unit("r1", "  ").await.unwrap_err();
    assert!(matches!(err, CivicError::Validation(_)));
}

#[tokio::test]
async fn failed_update_restores_the_report() {
    let (mut app, backend) = boot_as(&sample_authority("a1"), vec![sample_report("r1")]).await;
    let before = app.state().report("r1").cloned().unwrap();

    backend.fail_updates(true);
    assert!(app.update_progress("r1", 100).await.is_err());
    assert_eq!(app.state().report("r1").unwrap(), &before);
    assert!(app
        .state()
        .notifications
        .iter()
        .all(|n| n.kind != NotificationKind::StatusUpdate));
}

#[tokio::test]
async fn citizens_cannot_change_reports() {
    let (mut app, backend) = boot_as(&sample_user("u1"), vec![sample_report("r1")]).await;

    assert!(matches!(
        app.assign_unit("r1", "Crew 1").await,
        Err(CivicError::Forbidden(_))
    ));
    assert!(matches!(
        app.update_progress("r1", 50).await,
        Err(CivicError::Forbidden(_))
    ));
    assert_eq!(backend.update_calls(), 0);
    assert!(!app.state().auth_prompt_open);
}

#[tokio::test]
async fn signed_out_authority_action_prompts() {
    let backend = Arc::new(MockBackend::new().with_reports(vec![sample_report("r1")]));
    let mut app = App::new(backend, Arc::new(ScriptedModel::new()), AppSettings::default());
    app.boot(None).await;

    assert!(matches!(
        app.update_progress("r1", 50).await,
        Err(CivicError::NotAuthenticated)
    ));
    assert!(app.state().auth_prompt_open);
}

#[tokio::test]
async fn analytics_reflect_authority_changes() {
    let mut other = sample_report("r2");
    other.category = "Roads".to_string();
    let (mut app, _) = boot_as(&sample_authority("a1"), vec![sample_report("r1"), other]).await;

    app.update_progress("r1", 100).await.unwrap();
    let analytics = app.analytics();
    assert_eq!(analytics.total, 2);
    assert_eq!(analytics.count(ReportStatus::Resolved), 1);
    assert!((analytics.resolution_rate - 0.5).abs() < 1e-9);
    assert_eq!(analytics.unassigned_open, 1);
}
