pub mod error;
pub mod types;

pub use error::{Result, SupabaseError};
pub use types::{AuthUser, Session, SessionTokens, SignUpResponse};

use std::sync::{Arc, RwLock};

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{ErrorBody, PasswordCredentials, RefreshRequest, SignUpRequest};

/// Thin client over a Supabase project: PostgREST tables, storage buckets and auth.
///
/// Requests carry the anon key as `apikey`. The bearer token is the signed-in
/// user's access token when a session is set, the anon key otherwise. The
/// session can be exported with [`SupabaseClient::session_tokens`] and
/// restored later with [`SupabaseClient::set_session`].
#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    session: Arc<RwLock<Option<SessionTokens>>>,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the session used for subsequent requests.
    pub fn set_session(&self, tokens: Option<SessionTokens>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = tokens;
        }
    }

    pub fn session_tokens(&self) -> Option<SessionTokens> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.session_tokens().map(|tokens| tokens.access_token)
    }

    fn bearer(&self) -> String {
        self.access_token().unwrap_or_else(|| self.anon_key.clone())
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    // =========================================================================
    // PostgREST
    // =========================================================================

    /// `GET /rest/v1/{table}` with arbitrary PostgREST query parameters.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let resp = self
            .authed(self.client.get(&url))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;

        let resp = check(resp).await?;
        let rows: Vec<T> = decode(resp).await?;
        tracing::debug!(table, count = rows.len(), "Selected rows");
        Ok(rows)
    }

    /// Fetch the single row whose `column` equals `value`, if any.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>> {
        let filter = format!("eq.{value}");
        let rows: Vec<T> = self
            .select(table, &[(column, filter.as_str()), ("limit", "1")])
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn insert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let resp = self
            .authed(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        check(resp).await?;
        tracing::debug!(table, "Inserted row");
        Ok(())
    }

    /// Insert, or merge into the existing row on primary-key conflict.
    pub async fn upsert<T: Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let resp = self
            .authed(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;

        check(resp).await?;
        tracing::debug!(table, "Upserted row");
        Ok(())
    }

    /// `PATCH /rest/v1/{table}?{column}=eq.{value}`.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        column: &str,
        value: &str,
        patch: &T,
    ) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let filter = format!("eq.{value}");
        let resp = self
            .authed(self.client.patch(&url))
            .query(&[(column, filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check(resp).await?;
        tracing::debug!(table, column, value, "Updated row");
        Ok(())
    }

    // =========================================================================
    // Storage
    // =========================================================================

    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        let size = bytes.len();
        let resp = self
            .authed(self.client.post(&url))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        check(resp).await?;
        tracing::info!(bucket, path, size, "Uploaded object");
        Ok(())
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, path)
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Password grant. Stores the returned session on success.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .query(&[("grant_type", "password")])
            .json(&PasswordCredentials { email, password })
            .send()
            .await?;

        let resp = check_auth(resp).await?;
        let session: Session = decode(resp).await?;
        self.set_session(Some(SessionTokens::from(&session)));
        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Exchange a refresh token for a fresh session and store it.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let url = format!("{}/auth/v1/token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let resp = check_auth(resp).await?;
        let session: Session = decode(resp).await?;
        self.set_session(Some(SessionTokens::from(&session)));
        tracing::info!(user_id = %session.user.id, "Refreshed session");
        Ok(session)
    }

    /// Register a user with profile metadata attached to the auth record.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &serde_json::Value,
    ) -> Result<SignUpResponse> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&SignUpRequest {
                email,
                password,
                data: metadata,
            })
            .send()
            .await?;

        let resp = check_auth(resp).await?;
        let body: SignUpResponse = decode(resp).await?;
        if let Some(session) = body.session() {
            self.set_session(Some(SessionTokens::from(session)));
        }
        tracing::info!(user_id = %body.user().id, "Signed up");
        Ok(body)
    }

    /// Revoke the current session. The local token is dropped even if the call fails.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(token) = self.access_token() else {
            return Ok(());
        };
        self.set_session(None);

        let url = format!("{}/auth/v1/logout", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        check_auth(resp).await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// The user behind the current access token, or `None` without a session.
    /// A rejected token also yields `None`; the stored session is left for the
    /// caller to refresh or drop.
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };

        let url = format!("{}/auth/v1/user", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }

        let resp = check_auth(resp).await?;
        Ok(Some(decode(resp).await?))
    }

    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/auth/v1/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .send()
            .await?;

        check(resp).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

async fn check_auth(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body);
    if status.is_client_error() {
        Err(SupabaseError::Auth(message))
    } else {
        Err(SupabaseError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Malformed bodies surface as `Parse`.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::best_message)
        .unwrap_or_else(|| body.to_string())
}
