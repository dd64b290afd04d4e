// Test mocks for the app.
//
// Two mocks matching the two trait boundaries:
// - MockBackend (Backend): stateful in-memory tables with injectable failures
// - ScriptedModel (GenerativeModel): queued responses, records every prompt
//
// Plus helpers for constructing reports, users and encoded photos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use ai_client::{GenerativeModel, InlineImage, Message};
use civicwatch_common::error::Result;
use civicwatch_common::{CivicError, Report, ReportStatus, Severity, User, UserRole};

use crate::backend::{AuthIdentity, Backend, SignUpProfile};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Pune city centre.
pub const PUNE: (f64, f64) = (18.5204, 73.8567);

/// Smallest valid JPEG header, encoded.
pub const JPEG_DATA_URL: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ==";

/// Public URL prefix for images "uploaded" to the mock.
pub const STORAGE_URL: &str = "https://storage.test/report-images";

// ---------------------------------------------------------------------------
// MockBackend
// ---------------------------------------------------------------------------

struct Account {
    password: String,
    identity: AuthIdentity,
}

/// In-memory backend. Reports are kept newest first, like the real table.
///
/// Builder methods (`with_*`) configure it before it is shared; the `fail_*`
/// toggles take `&self` so tests can flip them mid-scenario.
pub struct MockBackend {
    reports: Mutex<Vec<Report>>,
    profiles: Mutex<HashMap<String, User>>,
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<AuthIdentity>>,
    uploads: Mutex<Vec<String>>,
    confirm_email: AtomicBool,
    fail_fetch: AtomicBool,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_uploads: AtomicBool,
    fail_profiles: AtomicBool,
    fail_health: AtomicBool,
    stalled: AtomicBool,
    health_delay: Mutex<Option<Duration>>,
    update_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            profiles: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
            confirm_email: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_uploads: AtomicBool::new(false),
            fail_profiles: AtomicBool::new(false),
            fail_health: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            health_delay: Mutex::new(None),
            update_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_reports(self, reports: Vec<Report>) -> Self {
        *self.reports.lock().unwrap() = reports;
        self
    }

    pub fn with_account(self, email: &str, password: &str, identity: AuthIdentity) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
        self
    }

    /// Start with a persisted session, as if restored from a previous visit.
    pub fn with_session(self, identity: AuthIdentity) -> Self {
        *self.session.lock().unwrap() = Some(identity);
        self
    }

    pub fn with_profile(self, user: User) -> Self {
        self.profiles.lock().unwrap().insert(user.id.clone(), user);
        self
    }

    /// Sign-ups wait for email confirmation instead of opening a session.
    pub fn requiring_confirmation(self) -> Self {
        self.confirm_email.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_health_delay(self, delay: Duration) -> Self {
        *self.health_delay.lock().unwrap() = Some(delay);
        self
    }

    // --- Failure toggles ---

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    pub fn fail_health(&self, fail: bool) {
        self.fail_health.store(fail, Ordering::SeqCst);
    }

    /// Every call hangs forever while set, like a backend that accepts
    /// connections and never answers.
    pub fn stall_all(&self, stall: bool) {
        self.stalled.store(stall, Ordering::SeqCst);
    }

    async fn gate(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    // --- Inspection ---

    pub fn stored_reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn stored_report(&self, id: &str) -> Option<Report> {
        self.reports.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn profile(&self, user_id: &str) -> Option<User> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }

    /// Storage paths of every successful upload.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }
}

fn mock_failure(op: &str) -> CivicError {
    CivicError::Remote(format!("mock {op} failure"))
}

#[async_trait]
impl Backend for MockBackend {
    async fn fetch_reports(&self) -> Result<Vec<Report>> {
        self.gate().await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(mock_failure("fetch"));
        }
        Ok(self.reports.lock().unwrap().clone())
    }

    async fn insert_report(&self, report: &Report) -> Result<()> {
        self.gate().await;
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(mock_failure("insert"));
        }
        self.reports.lock().unwrap().insert(0, report.clone());
        Ok(())
    }

    async fn update_report(&self, report: &Report) -> Result<()> {
        self.gate().await;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(mock_failure("update"));
        }
        let mut reports = self.reports.lock().unwrap();
        match reports.iter_mut().find(|r| r.id == report.id) {
            Some(existing) => {
                *existing = report.clone();
                Ok(())
            }
            None => Err(CivicError::NotFound(format!("report {}", report.id))),
        }
    }

    async fn upload_image(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        self.gate().await;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(mock_failure("upload"));
        }
        self.uploads.lock().unwrap().push(path.to_string());
        Ok(format!("{STORAGE_URL}/{path}"))
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<User>> {
        self.gate().await;
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(mock_failure("profile fetch"));
        }
        Ok(self.profile(user_id))
    }

    async fn upsert_profile(&self, user: &User) -> Result<()> {
        self.gate().await;
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(mock_failure("profile upsert"));
        }
        self.profiles.lock().unwrap().insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        self.gate().await;
        let identity = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(CivicError::Auth("Invalid login credentials".to_string())),
            }
        };
        *self.session.lock().unwrap() = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str, profile: &SignUpProfile) -> Result<AuthIdentity> {
        self.gate().await;
        let has_session = !self.confirm_email.load(Ordering::SeqCst);
        let identity = AuthIdentity {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            full_name: Some(profile.full_name.clone()),
            role: profile.role,
            department: profile.department.clone(),
            has_session,
        };
        {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(CivicError::Auth("User already registered".to_string()));
            }
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: AuthIdentity {
                        has_session: true,
                        ..identity.clone()
                    },
                },
            );
        }
        if has_session {
            *self.session.lock().unwrap() = Some(identity.clone());
        }
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.gate().await;
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn current_identity(&self) -> Result<Option<AuthIdentity>> {
        self.gate().await;
        Ok(self.session.lock().unwrap().clone())
    }

    async fn health_check(&self) -> Result<()> {
        self.gate().await;
        let delay = *self.health_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_health.load(Ordering::SeqCst) {
            return Err(mock_failure("health"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Replays queued responses in order. An empty queue is an error.
#[derive(Default)]
pub struct ScriptedModel {
    json: Mutex<VecDeque<std::result::Result<String, String>>>,
    chat: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    histories: Mutex<Vec<Vec<Message>>>,
    images: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(self, response: impl Into<String>) -> Self {
        self.json.lock().unwrap().push_back(Ok(response.into()));
        self
    }

    pub fn json_error(self, message: impl Into<String>) -> Self {
        self.json.lock().unwrap().push_back(Err(message.into()));
        self
    }

    pub fn chat(self, response: impl Into<String>) -> Self {
        self.chat.lock().unwrap().push_back(Ok(response.into()));
        self
    }

    pub fn chat_error(self, message: impl Into<String>) -> Self {
        self.chat.lock().unwrap().push_back(Err(message.into()));
        self
    }

    /// Every prompt and chat input received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// History passed along with each chat turn.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().unwrap().clone()
    }

    pub fn images_seen(&self) -> usize {
        self.images.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate_json(
        &self,
        _system: &str,
        prompt: &str,
        image: Option<&InlineImage>,
        _schema: serde_json::Value,
    ) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if image.is_some() {
            self.images.fetch_add(1, Ordering::SeqCst);
        }
        match self.json.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted json response")),
        }
    }

    async fn converse(&self, _system: &str, history: &[Message], input: &str) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(input.to_string());
        self.histories.lock().unwrap().push(history.to_vec());
        match self.chat.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted chat response")),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A fresh `New` report by citizen `u1` at Pune with no votes.
pub fn sample_report(id: &str) -> Report {
    Report {
        id: id.to_string(),
        reporter_id: "u1".to_string(),
        reporter_name: "Asha".to_string(),
        title: "Overflowing garbage bin".to_string(),
        description: "Garbage bin overflowing onto the footpath".to_string(),
        location: "MG Road, Pune".to_string(),
        category: "Waste Management".to_string(),
        severity: Severity::Medium,
        status: ReportStatus::New,
        progress: 0,
        image_url: format!("{STORAGE_URL}/reports/{id}.jpg"),
        support_count: 0,
        dispute_count: 0,
        supported_by: Vec::new(),
        disputed_by: Vec::new(),
        lat: PUNE.0,
        lng: PUNE.1,
        assigned_unit: None,
        created_at: Utc::now(),
    }
}

pub fn sample_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        name: format!("Citizen {id}"),
        role: UserRole::Citizen,
        points: 0,
        reports_count: 0,
        department: None,
    }
}

pub fn sample_authority(id: &str) -> User {
    User {
        role: UserRole::Authority,
        name: format!("Officer {id}"),
        department: Some("Public Works".to_string()),
        ..sample_user(id)
    }
}

pub fn identity_for(user: &User) -> AuthIdentity {
    AuthIdentity {
        user_id: user.id.clone(),
        email: user.email.clone(),
        full_name: Some(user.name.clone()),
        role: user.role,
        department: user.department.clone(),
        has_session: true,
    }
}

/// Verdict JSON as the model would return it for a genuine report.
pub fn passing_verdict_json(category: &str, severity: &str, title: &str) -> String {
    serde_json::json!({
        "address_valid": true,
        "image_matches_description": true,
        "confidence_level": "high",
        "issue_analysis": format!("CATEGORY: {category} | SEVERITY: {severity} | TITLE: {title}"),
        "address": "MG Road, Pune, Maharashtra",
        "reason": "",
        "category": category,
        "severity": severity,
        "title": title,
    })
    .to_string()
}

pub fn rejecting_verdict_json(reason: &str) -> String {
    serde_json::json!({
        "address_valid": true,
        "image_matches_description": false,
        "confidence_level": "high",
        "issue_analysis": "",
        "address": "",
        "reason": reason,
    })
    .to_string()
}
