// App: the single owner of state, navigation and the remote seams.
//
// Every user-facing operation goes through here so that state changes happen
// in one place and in order. Remote writes are optimistic: the store is
// updated first, then the backend; a failed write restores the previous
// report and returns the error.

use std::sync::Arc;
use std::time::Duration;

use ai_client::{Gemini, GenerativeModel};
use tracing::{info, warn};

use civicwatch_common::error::Result;
use civicwatch_common::{
    CivicError, Config, Notification, NotificationKind, Report, ReportStatus, User, VoteKind,
    REPORT_POINTS, VOTE_POINTS,
};
use supabase_client::SupabaseClient;

use crate::audit::Auditor;
use crate::authority;
use crate::backend::{AuthIdentity, Backend, SignUpProfile, SupabaseBackend};
use crate::dashboard::{AuthorityAnalytics, CitizenStats};
use crate::facade::Facade;
use crate::health::{startup_readiness, Readiness};
use crate::navigation::{Navigator, Transition, View};
use crate::state::{Action, AppState, Store};
use crate::submission::{AuditOutcome, Submission};
use crate::support::SupportChat;
use crate::votes::{apply_vote, VoteOutcome};

/// Shortest password the auth provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// Coordinates used when a submission carries none.
    pub fallback_location: (f64, f64),
    pub health_timeout: Duration,
    /// Upper bound on the initial report load and session restore.
    pub startup_timeout: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            fallback_location: (18.5204, 73.8567),
            health_timeout: Duration::from_secs(2),
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fallback_location: (config.default_lat, config.default_lng),
            health_timeout: config.health_check_timeout,
            startup_timeout: config.startup_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(User),
    /// Account created; the user must confirm their email before signing in.
    ConfirmationRequired(User),
}

pub struct App {
    store: Store,
    nav: Navigator,
    facade: Facade,
    auditor: Auditor,
    support: SupportChat,
    settings: AppSettings,
    readiness: Option<Readiness>,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, model: Arc<dyn GenerativeModel>, settings: AppSettings) -> Self {
        Self {
            store: Store::default(),
            nav: Navigator::new(),
            facade: Facade::new(backend),
            auditor: Auditor::new(model.clone()),
            support: SupportChat::new(model),
            settings,
            readiness: None,
        }
    }

    /// Production wiring: Supabase backend and Gemini model.
    pub fn from_config(config: &Config) -> Self {
        let client = SupabaseClient::new(&config.supabase_url, &config.supabase_anon_key);
        let backend = SupabaseBackend::new(client, &config.image_bucket).with_session_file(config.session_file.clone());
        let model = Gemini::new(&config.gemini_api_key, &config.gemini_model);
        Self::new(Arc::new(backend), Arc::new(model), AppSettings::from_config(config))
    }

    // --- Accessors ---

    pub fn state(&self) -> &AppState {
        self.store.state()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    pub fn facade(&self) -> &Facade {
        &self.facade
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn readiness(&self) -> Option<&Readiness> {
        self.readiness.as_ref()
    }

    // --- Startup ---

    /// Health race, initial report load, session restore, then the initial
    /// view from the URL fragment. The load and restore share
    /// `startup_timeout`; past it the app starts empty and signed out.
    pub async fn boot(&mut self, fragment: Option<&str>) -> Readiness {
        let readiness = startup_readiness(self.facade.backend().as_ref(), self.settings.health_timeout).await;
        self.readiness = Some(readiness.clone());

        let (reports, user) =
            match tokio::time::timeout(self.settings.startup_timeout, self.load_startup_state()).await {
                Ok(loaded) => loaded,
                Err(_) => {
                    warn!(
                        timeout_ms = self.settings.startup_timeout.as_millis() as u64,
                        "Startup load timed out, continuing empty and signed out"
                    );
                    (Vec::new(), None)
                }
            };
        self.store.dispatch(Action::ReportsLoaded(reports));
        if let Some(user) = user {
            self.store.dispatch(Action::SignedIn(user));
        }

        self.nav = Navigator::restore(fragment, self.state().is_authenticated());
        info!(
            view = ?self.nav.current(),
            reports = self.state().reports.len(),
            signed_in = self.state().is_authenticated(),
            "App booted"
        );
        readiness
    }

    async fn load_startup_state(&self) -> (Vec<Report>, Option<User>) {
        let reports = self.facade.get_all_reports().await;
        let user = match self.current_identity().await {
            Some(identity) => Some(self.profile_for(&identity, &reports).await),
            None => None,
        };
        (reports, user)
    }

    /// Replace the collection with the remote one. Fails open to empty.
    pub async fn refresh_reports(&mut self) -> usize {
        let reports = self.facade.get_all_reports().await;
        let count = reports.len();
        self.store.dispatch(Action::ReportsLoaded(reports));
        count
    }

    // --- Session ---

    /// Sign in from the persisted session, if one is still valid.
    pub async fn restore_session(&mut self) -> Option<User> {
        let identity = self.current_identity().await?;
        let user = self.load_profile(&identity).await;
        self.store.dispatch(Action::SignedIn(user.clone()));
        Some(user)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<User> {
        let identity = self.facade.backend().sign_in(email.trim(), password).await?;
        let user = self.load_profile(&identity).await;

        self.store.dispatch(Action::SignedIn(user.clone()));
        self.nav.on_sign_in();
        self.notify(Notification::new(
            NotificationKind::Success,
            format!("Welcome back, {}", user.name),
        ));
        info!(user_id = %user.id, role = %user.role, "Signed in");
        Ok(user)
    }

    pub async fn sign_up(&mut self, email: &str, password: &str, profile: SignUpProfile) -> Result<SignUpOutcome> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(CivicError::Validation("a valid email is required".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CivicError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if profile.full_name.trim().is_empty() {
            return Err(CivicError::Validation("full name is required".to_string()));
        }

        let identity = self.facade.backend().sign_up(email, password, &profile).await?;
        let user = identity.to_user();
        self.facade.sync_profile(&user).await;

        if !identity.has_session {
            info!(user_id = %user.id, "Signed up, awaiting email confirmation");
            self.notify(Notification::new(
                NotificationKind::Info,
                "Check your email to confirm your account, then sign in.",
            ));
            return Ok(SignUpOutcome::ConfirmationRequired(user));
        }

        self.store.dispatch(Action::SignedIn(user.clone()));
        self.nav.on_sign_in();
        info!(user_id = %user.id, role = %user.role, "Signed up");
        Ok(SignUpOutcome::SignedIn(user))
    }

    /// Always ends signed out locally, even if the remote call fails.
    pub async fn sign_out(&mut self) {
        if let Err(e) = self.facade.backend().sign_out().await {
            warn!(error = %e, "Remote sign-out failed");
        }
        self.nav.on_sign_out();
        self.store.dispatch(Action::SignedOut);
        info!("Signed out");
    }

    async fn current_identity(&self) -> Option<AuthIdentity> {
        match self.facade.backend().current_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Session restore failed, continuing signed out");
                None
            }
        }
    }

    async fn load_profile(&self, identity: &AuthIdentity) -> User {
        self.profile_for(identity, &self.state().reports).await
    }

    /// Stored profile, or a fresh one from the signup metadata, with
    /// `reports_count` taken from `reports`.
    async fn profile_for(&self, identity: &AuthIdentity, reports: &[Report]) -> User {
        let mut user = match self.facade.fetch_profile(&identity.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                let user = identity.to_user();
                info!(user_id = %user.id, "Creating missing profile");
                self.facade.sync_profile(&user).await;
                user
            }
            Err(e) => {
                warn!(error = %e, user_id = %identity.user_id, "Profile fetch failed, using signup metadata");
                identity.to_user()
            }
        };
        user.reports_count = reports
            .iter()
            .filter(|r| r.reporter_id == user.id)
            .count() as u32;
        user
    }

    // --- Navigation ---

    /// Views behind sign-in open the auth prompt instead of navigating.
    pub fn navigate(&mut self, view: View) -> Option<Transition> {
        if view.route().requires_auth && !self.state().is_authenticated() {
            self.store.dispatch(Action::AuthPromptOpened);
            return None;
        }
        self.nav.navigate(view)
    }

    pub fn back(&mut self) -> View {
        let authenticated = self.state().is_authenticated();
        self.nav.back(authenticated)
    }

    pub fn close_auth_prompt(&mut self) {
        self.store.dispatch(Action::AuthPromptClosed);
    }

    // --- Submission ---

    pub async fn audit_submission(&mut self, submission: &mut Submission) -> Result<AuditOutcome> {
        self.signed_in_user()?;
        submission.audit(&self.auditor).await
    }

    /// Commit a verified submission and credit the reporter.
    pub async fn commit_submission(&mut self, submission: &mut Submission) -> Result<Report> {
        let user = self.signed_in_user()?;
        let report = submission
            .commit(&mut self.store, &self.facade, &user, self.settings.fallback_location)
            .await?;

        let credited = User {
            points: user.points + REPORT_POINTS,
            reports_count: user.reports_count + 1,
            ..user
        };
        self.store.dispatch(Action::UserUpdated(credited.clone()));
        self.facade.sync_profile(&credited).await;
        self.notify(
            Notification::new(
                NotificationKind::Success,
                format!("Report \"{}\" submitted. +{REPORT_POINTS} points", report.title),
            )
            .for_report(report.id.clone()),
        );
        Ok(report)
    }

    // --- Votes ---

    pub async fn vote(&mut self, report_id: &str, kind: VoteKind) -> Result<VoteOutcome> {
        let Some(user) = self.state().user.clone() else {
            self.store.dispatch(Action::AuthPromptOpened);
            return Ok(VoteOutcome::AuthRequired);
        };
        let previous = self.find_report(report_id)?;
        let Some(next) = apply_vote(&previous, &user.id, kind) else {
            return Ok(VoteOutcome::AlreadyVoted);
        };

        self.store.dispatch(Action::ReportReplaced(next.clone()));
        if let Err(e) = self.facade.update_report(&next).await {
            warn!(error = %e, report_id = %report_id, "Vote failed to persist, restoring report");
            self.store.dispatch(Action::ReportReplaced(previous));
            return Err(e);
        }

        let credited = User {
            points: user.points + VOTE_POINTS,
            ..user
        };
        self.store.dispatch(Action::UserUpdated(credited.clone()));
        self.facade.sync_profile(&credited).await;
        info!(report_id = %report_id, kind = ?kind, "Vote recorded");
        Ok(VoteOutcome::Recorded(next))
    }

    // --- Authority ---

    pub async fn update_progress(&mut self, report_id: &str, progress: i32) -> Result<Report> {
        self.acting_authority()?;
        let previous = self.find_report(report_id)?;
        let next = authority::set_progress(&previous, progress);
        self.commit_authority_update(previous, next).await
    }

    pub async fn assign_unit(&mut self, report_id: &str, unit: &str) -> Result<Report> {
        self.acting_authority()?;
        let previous = self.find_report(report_id)?;
        let next = authority::assign_unit(&previous, unit)?;
        self.commit_authority_update(previous, next).await
    }

    async fn commit_authority_update(&mut self, previous: Report, next: Report) -> Result<Report> {
        self.store.dispatch(Action::ReportReplaced(next.clone()));
        if let Err(e) = self.facade.update_report(&next).await {
            warn!(error = %e, report_id = %next.id, "Authority update failed, restoring report");
            self.store.dispatch(Action::ReportReplaced(previous));
            return Err(e);
        }

        if next.status == ReportStatus::Resolved && previous.status != ReportStatus::Resolved {
            self.notify(
                Notification::new(
                    NotificationKind::StatusUpdate,
                    format!("\"{}\" has been resolved", next.title),
                )
                .for_report(next.id.clone()),
            );
        }
        Ok(next)
    }

    fn acting_authority(&mut self) -> Result<User> {
        match authority::require_authority(self.state().user.as_ref()).cloned() {
            Ok(user) => Ok(user),
            Err(CivicError::NotAuthenticated) => {
                self.store.dispatch(Action::AuthPromptOpened);
                Err(CivicError::NotAuthenticated)
            }
            Err(e) => Err(e),
        }
    }

    // --- Dashboards ---

    pub fn citizen_stats(&self) -> Option<CitizenStats> {
        let user = self.state().user.as_ref()?;
        Some(CitizenStats::compute(&self.state().reports, user))
    }

    pub fn analytics(&self) -> AuthorityAnalytics {
        AuthorityAnalytics::compute(&self.state().reports)
    }

    // --- Support & notifications ---

    pub async fn ask_support(&mut self, input: &str) -> String {
        self.support.send(input).await
    }

    pub fn notify(&mut self, notification: Notification) {
        self.store.dispatch(Action::Notify(notification));
    }

    pub fn mark_notifications_read(&mut self) {
        self.store.dispatch(Action::NotificationsRead);
    }

    pub fn clear_notifications(&mut self) {
        self.store.dispatch(Action::NotificationsCleared);
    }

    // --- Helpers ---

    fn signed_in_user(&mut self) -> Result<User> {
        match self.state().user.clone() {
            Some(user) => Ok(user),
            None => {
                self.store.dispatch(Action::AuthPromptOpened);
                Err(CivicError::NotAuthenticated)
            }
        }
    }

    fn find_report(&self, report_id: &str) -> Result<Report> {
        self.state()
            .report(report_id)
            .cloned()
            .ok_or_else(|| CivicError::NotFound(format!("report {report_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity_for, sample_authority, sample_report, sample_user, MockBackend, ScriptedModel};

    fn app_with(backend: Arc<MockBackend>) -> App {
        App::new(backend, Arc::new(ScriptedModel::new()), AppSettings::default())
    }

    #[tokio::test]
    async fn navigate_to_protected_view_opens_prompt() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        assert!(app.navigate(View::Dashboard).is_none());
        assert!(app.state().auth_prompt_open);
        assert_eq!(app.navigator().current(), View::Home);

        app.close_auth_prompt();
        assert!(app.navigate(View::About).is_some());
    }

    #[tokio::test]
    async fn sign_in_creates_missing_profile() {
        let user = sample_user("u1");
        let backend = Arc::new(MockBackend::new().with_account("u1@example.com", "secret1", identity_for(&user)));
        let mut app = app_with(backend.clone());

        let signed_in = app.sign_in("u1@example.com", "secret1").await.unwrap();
        assert_eq!(signed_in.id, "u1");
        assert!(backend.profile("u1").is_some());
        assert_eq!(app.state().unread_count(), 1);
    }

    #[tokio::test]
    async fn bad_credentials_stay_signed_out() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let err = app.sign_in("nobody@example.com", "x").await.unwrap_err();
        assert!(matches!(err, CivicError::Auth(_)));
        assert!(!app.state().is_authenticated());
    }

    #[tokio::test]
    async fn profile_reports_count_comes_from_collection() {
        let user = sample_user("u1");
        let backend = Arc::new(
            MockBackend::new()
                .with_reports(vec![sample_report("a"), sample_report("b")])
                .with_profile(User { points: 40, ..user.clone() })
                .with_session(identity_for(&user)),
        );
        let mut app = app_with(backend);
        app.boot(None).await;

        let current = app.state().user.clone().unwrap();
        assert_eq!(current.points, 40);
        assert_eq!(current.reports_count, 2);
    }

    #[tokio::test]
    async fn sign_up_validates_input() {
        let mut app = app_with(Arc::new(MockBackend::new()));
        let profile = SignUpProfile {
            full_name: "Asha".into(),
            role: civicwatch_common::UserRole::Citizen,
            department: None,
        };
        assert!(app.sign_up("not-an-email", "secret1", profile.clone()).await.is_err());
        assert!(app.sign_up("asha@example.com", "123", profile).await.is_err());
    }

    #[tokio::test]
    async fn authority_ops_reject_citizens() {
        let user = sample_user("u1");
        let backend = Arc::new(
            MockBackend::new()
                .with_reports(vec![sample_report("r1")])
                .with_session(identity_for(&user)),
        );
        let mut app = app_with(backend.clone());
        app.boot(None).await;

        let err = app.update_progress("r1", 50).await.unwrap_err();
        assert!(matches!(err, CivicError::Forbidden(_)));
        assert_eq!(backend.update_calls(), 0);
    }

    #[tokio::test]
    async fn resolving_notifies() {
        let officer = sample_authority("a1");
        let backend = Arc::new(
            MockBackend::new()
                .with_reports(vec![sample_report("r1")])
                .with_session(identity_for(&officer)),
        );
        let mut app = app_with(backend.clone());
        app.boot(None).await;

        let resolved = app.update_progress("r1", 100).await.unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert_eq!(backend.stored_report("r1").unwrap().progress, 100);
        let latest = &app.state().notifications[0];
        assert_eq!(latest.kind, NotificationKind::StatusUpdate);
        assert_eq!(latest.report_id.as_deref(), Some("r1"));
    }
}
