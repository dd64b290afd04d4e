// Backend: every call the app makes to the hosted backend, behind one trait.
//
// SupabaseBackend is the production implementation. testing::MockBackend is
// an in-memory one with injectable failures.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use civicwatch_common::error::Result;
use civicwatch_common::{CivicError, Report, User, UserRole};
use supabase_client::{AuthUser, SessionTokens, SupabaseClient, SupabaseError};

use crate::rows::{parse_role, ProfileRow, ReportRow};

const REPORTS_TABLE: &str = "reports";
const PROFILES_TABLE: &str = "profiles";

/// Who the auth provider says is signed in, plus the metadata stored at signup.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthIdentity {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub department: Option<String>,
    /// False when signup is waiting on email confirmation.
    pub has_session: bool,
}

impl AuthIdentity {
    /// Profile to create when no `profiles` row exists yet.
    pub fn to_user(&self) -> User {
        let name = self
            .full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or_default().to_string());
        User {
            id: self.user_id.clone(),
            email: self.email.clone(),
            name,
            role: self.role,
            points: 0,
            reports_count: 0,
            department: match self.role {
                UserRole::Authority => self.department.clone(),
                UserRole::Citizen => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignUpProfile {
    pub full_name: String,
    pub role: UserRole,
    pub department: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    // --- Reports ---

    /// All reports, newest first.
    async fn fetch_reports(&self) -> Result<Vec<Report>>;

    async fn insert_report(&self, report: &Report) -> Result<()>;

    /// Overwrite the remote row with the same id.
    async fn update_report(&self, report: &Report) -> Result<()>;

    // --- Storage ---

    /// Store an image and return its public URL.
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    // --- Profiles ---

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<User>>;

    async fn upsert_profile(&self, user: &User) -> Result<()>;

    // --- Auth ---

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity>;

    async fn sign_up(&self, email: &str, password: &str, profile: &SignUpProfile) -> Result<AuthIdentity>;

    async fn sign_out(&self) -> Result<()>;

    /// Identity behind the persisted session, if any.
    async fn current_identity(&self) -> Result<Option<AuthIdentity>>;

    // --- Infra ---

    async fn health_check(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// SupabaseBackend
// ---------------------------------------------------------------------------

pub struct SupabaseBackend {
    client: SupabaseClient,
    image_bucket: String,
    session_file: Option<PathBuf>,
}

impl SupabaseBackend {
    pub fn new(client: SupabaseClient, image_bucket: impl Into<String>) -> Self {
        Self {
            client,
            image_bucket: image_bucket.into(),
            session_file: None,
        }
    }

    /// Persist session tokens to `path` so a restart can resume the session.
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    async fn save_session(&self) {
        let (Some(path), Some(tokens)) = (&self.session_file, self.client.session_tokens()) else {
            return;
        };
        if let Err(e) = write_session(path, &tokens).await {
            warn!(path = %path.display(), error = %e, "Failed to persist session");
        }
    }

    async fn load_session(&self) -> Option<SessionTokens> {
        let path = self.session_file.as_ref()?;
        match read_session(path).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    async fn forget_session(&self) {
        self.client.set_session(None);
        let Some(path) = &self.session_file else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove session file"),
        }
    }
}

async fn write_session(path: &Path, tokens: &SessionTokens) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, serde_json::to_string_pretty(tokens)?).await?;
    Ok(())
}

async fn read_session(path: &Path) -> anyhow::Result<Option<SessionTokens>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remote(err: SupabaseError) -> CivicError {
    match err {
        SupabaseError::Auth(message) => CivicError::Auth(message),
        other => CivicError::Remote(other.message().to_string()),
    }
}

fn identity_from(user: &AuthUser, has_session: bool) -> AuthIdentity {
    AuthIdentity {
        user_id: user.id.clone(),
        email: user.email.clone().unwrap_or_default(),
        full_name: user.metadata_str("full_name").map(str::to_string),
        role: parse_role(user.metadata_str("role")),
        department: user.metadata_str("department").map(str::to_string),
        has_session,
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn fetch_reports(&self) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = self
            .client
            .select(REPORTS_TABLE, &[("order", "created_at.desc")])
            .await
            .map_err(remote)?;
        Ok(rows.into_iter().map(Report::from).collect())
    }

    async fn insert_report(&self, report: &Report) -> Result<()> {
        self.client
            .insert(REPORTS_TABLE, &ReportRow::from(report))
            .await
            .map_err(remote)
    }

    async fn update_report(&self, report: &Report) -> Result<()> {
        self.client
            .update(REPORTS_TABLE, "id", &report.id, &ReportRow::from(report))
            .await
            .map_err(remote)
    }

    async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.client
            .upload_object(&self.image_bucket, path, bytes, content_type)
            .await
            .map_err(remote)?;
        Ok(self.client.public_url(&self.image_bucket, path))
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<User>> {
        let row: Option<ProfileRow> = self
            .client
            .select_one(PROFILES_TABLE, "id", user_id)
            .await
            .map_err(remote)?;
        Ok(row.map(User::from))
    }

    async fn upsert_profile(&self, user: &User) -> Result<()> {
        self.client
            .upsert(PROFILES_TABLE, &ProfileRow::from(user))
            .await
            .map_err(remote)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        let session = self
            .client
            .sign_in_with_password(email, password)
            .await
            .map_err(remote)?;
        self.save_session().await;
        Ok(identity_from(&session.user, true))
    }

    async fn sign_up(&self, email: &str, password: &str, profile: &SignUpProfile) -> Result<AuthIdentity> {
        let metadata = json!({
            "full_name": profile.full_name,
            "role": profile.role.to_string(),
            "department": profile.department,
        });
        let resp = self
            .client
            .sign_up(email, password, &metadata)
            .await
            .map_err(remote)?;
        if resp.session().is_some() {
            self.save_session().await;
        }
        Ok(identity_from(resp.user(), resp.session().is_some()))
    }

    async fn sign_out(&self) -> Result<()> {
        let result = self.client.sign_out().await.map_err(remote);
        self.forget_session().await;
        result
    }

    /// Resume from the session file when nothing is in memory. An expired
    /// access token is refreshed once; a rejected refresh signs out.
    async fn current_identity(&self) -> Result<Option<AuthIdentity>> {
        if self.client.session_tokens().is_none() {
            self.client.set_session(self.load_session().await);
        }
        let Some(tokens) = self.client.session_tokens() else {
            return Ok(None);
        };

        if let Some(user) = self.client.current_user().await.map_err(remote)? {
            return Ok(Some(identity_from(&user, true)));
        }

        let Some(refresh_token) = tokens.refresh_token else {
            self.forget_session().await;
            return Ok(None);
        };
        match self.client.refresh_session(&refresh_token).await {
            Ok(session) => {
                self.save_session().await;
                info!(user_id = %session.user.id, "Session resumed with refresh token");
                Ok(Some(identity_from(&session.user, true)))
            }
            Err(SupabaseError::Auth(message)) => {
                warn!(error = %message, "Refresh token rejected, signing out");
                self.forget_session().await;
                Ok(None)
            }
            Err(e) => Err(remote(e)),
        }
    }

    async fn health_check(&self) -> Result<()> {
        self.client.health().await.map_err(remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_reads_signup_metadata() {
        let user = AuthUser {
            id: "u1".into(),
            email: Some("officer@city.gov".into()),
            user_metadata: json!({"full_name": "Officer Rao", "role": "authority", "department": "Roads"}),
        };
        let identity = identity_from(&user, true);
        assert_eq!(identity.role, UserRole::Authority);
        assert_eq!(identity.department.as_deref(), Some("Roads"));

        let profile = identity.to_user();
        assert_eq!(profile.name, "Officer Rao");
        assert_eq!(profile.department.as_deref(), Some("Roads"));
    }

    #[test]
    fn citizens_never_carry_a_department() {
        let identity = AuthIdentity {
            user_id: "u2".into(),
            email: "asha@example.com".into(),
            full_name: None,
            role: UserRole::Citizen,
            department: Some("Roads".into()),
            has_session: true,
        };
        let user = identity.to_user();
        assert_eq!(user.name, "asha");
        assert!(user.department.is_none());
    }

    #[test]
    fn auth_failures_stay_auth_errors() {
        assert!(matches!(
            remote(SupabaseError::Auth("Invalid login credentials".into())),
            CivicError::Auth(_)
        ));
        assert!(matches!(
            remote(SupabaseError::Api { status: 500, message: "boom".into() }),
            CivicError::Remote(ref m) if m == "boom"
        ));
    }
}
