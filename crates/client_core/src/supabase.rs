//! [`RemoteClient`] over a Supabase project: GoTrue for auth, PostgREST for
//! tables.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::ACCEPT, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use shared::{
    domain::{Session, UserIdentity},
    error::{ErrorCode, RemoteError, RemoteResult},
    protocol::{
        AuthChange, BackendErrorBody, PasswordCredentials, RefreshTokenRequest, SignUpResponse,
    },
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    auth_events::{AuthEventHub, AuthSubscription},
    config::ClientSettings,
    session_store::{FileSessionStore, SessionStore},
    RemoteClient,
};

/// Sessions closer than this to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;
const SINGLE_OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";
const PREFER_INSERT: &str = "return=minimal";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";

#[derive(Default)]
struct SessionCache {
    loaded: bool,
    session: Option<Session>,
}

pub struct SupabaseClient {
    http: Client,
    base_url: String,
    anon_key: String,
    store: Arc<dyn SessionStore>,
    events: AuthEventHub,
    cache: Mutex<SessionCache>,
}

impl SupabaseClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            store,
            events: AuthEventHub::new(),
            cache: Mutex::new(SessionCache::default()),
        }
    }

    /// Client persisting its session under the configured data directory.
    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let base_url = settings.validated_url()?;
        let session_file = settings
            .session_file()
            .context("failed to resolve session file location")?;
        info!(
            supabase_url = %base_url,
            session_file = %session_file.display(),
            "configured supabase client"
        );
        Ok(Self::new(
            base_url,
            settings.supabase_anon_key.clone(),
            Arc::new(FileSessionStore::new(session_file)),
        ))
    }

    pub fn events(&self) -> &AuthEventHub {
        &self.events
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request.header("apikey", &self.anon_key).bearer_auth(token)
    }

    /// Bearer for table requests: the user's token, or the anon key when
    /// signed out.
    async fn table_token(&self) -> RemoteResult<String> {
        Ok(self
            .get_session()
            .await?
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone()))
    }

    async fn request_session(&self, url: String, body: &impl serde::Serialize) -> RemoteResult<Session> {
        let response = self
            .authorized(self.http.post(url), &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let session: Session = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;
        Ok(session.with_issued_at(Utc::now()))
    }

    async fn install_session(&self, session: Option<Session>) {
        let mut cache = self.cache.lock().await;
        cache.loaded = true;
        cache.session = session.clone();
        self.persist(session.as_ref());
    }

    fn load_cached(&self, cache: &mut SessionCache) {
        if cache.loaded {
            return;
        }
        cache.session = match self.store.load() {
            Ok(session) => session,
            Err(err) => {
                warn!("discarding unreadable stored session: {err:#}");
                None
            }
        };
        cache.loaded = true;
    }

    fn persist(&self, session: Option<&Session>) {
        let persisted = match session {
            Some(session) => self.store.save(session),
            None => self.store.clear(),
        };
        if let Err(err) = persisted {
            warn!("failed to persist session change: {err:#}");
        }
    }
}

#[async_trait]
impl RemoteClient for SupabaseClient {
    async fn get_session(&self) -> RemoteResult<Option<Session>> {
        // Held across the refresh: overlapping callers wait and reuse its
        // result, and sign-out cannot finish while a refresh is in flight.
        let mut cache = self.cache.lock().await;
        self.load_cached(&mut cache);

        let Some(session) = cache.session.clone() else {
            return Ok(None);
        };
        if !session.expires_within(Utc::now(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let refreshed = self
            .request_session(
                self.auth_url("token?grant_type=refresh_token"),
                &RefreshTokenRequest {
                    refresh_token: session.refresh_token.clone(),
                },
            )
            .await;
        match refreshed {
            Ok(refreshed) => {
                info!(user_id = %refreshed.user.id, "session refreshed");
                cache.session = Some(refreshed.clone());
                self.persist(Some(&refreshed));
                self.events.emit(AuthChange::token_refreshed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(err) if err.is_unauthorized() || err.status == Some(400) => {
                warn!("refresh token rejected, signing out locally: {err}");
                cache.session = None;
                self.persist(None);
                self.events.emit(AuthChange::signed_out());
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session> {
        let session = self
            .request_session(
                self.auth_url("token?grant_type=password"),
                &PasswordCredentials {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        info!(user_id = %session.user.id, "signed in");
        self.install_session(Some(session.clone())).await;
        self.events.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>> {
        let response = self
            .authorized(self.http.post(self.auth_url("signup")), &self.anon_key)
            .json(&PasswordCredentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(transport_error)?;
        let body: SignUpResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;

        match body {
            SignUpResponse::Session(session) => {
                let session = session.with_issued_at(Utc::now());
                info!(user_id = %session.user.id, "signed up and signed in");
                self.install_session(Some(session.clone())).await;
                self.events.emit(AuthChange::signed_in(session.clone()));
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "signed up, awaiting email confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        // Same lock as the refresh path, so an in-flight refresh cannot
        // reinstate the session after it is cleared. An expired access token
        // is sent as is; the server then answers 401, which counts as done.
        let mut cache = self.cache.lock().await;
        self.load_cached(&mut cache);
        if let Some(session) = cache.session.clone() {
            let response = self
                .authorized(self.http.post(self.auth_url("logout")), &session.access_token)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status();
            // The token is already unusable server-side in these cases.
            let already_gone = matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
            );
            if !status.is_success() && !already_gone {
                return Err(error_from_response(response).await);
            }
        }

        cache.session = None;
        self.persist(None);
        drop(cache);
        self.events.emit(AuthChange::signed_out());
        info!("signed out");
        Ok(())
    }

    async fn get_user(&self) -> RemoteResult<Option<UserIdentity>> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };
        let response = self
            .authorized(self.http.get(self.auth_url("user")), &session.access_token)
            .send()
            .await
            .map_err(transport_error)?;
        let user = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)?;
        Ok(Some(user))
    }

    async fn fetch_single(&self, table: &str, column: &str, value: &str) -> RemoteResult<Value> {
        let token = self.table_token().await?;
        let response = self
            .authorized(self.http.get(self.rest_url(table)), &token)
            .header(ACCEPT, SINGLE_OBJECT_MEDIA_TYPE)
            .query(&[("select", "*".to_string()), (column, format!("eq.{value}"))])
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(decode_error)
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        let token = self.table_token().await?;
        let response = self
            .authorized(self.http.post(self.rest_url(table)), &token)
            .header("Prefer", PREFER_INSERT)
            .json(&rows)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await.map(|_| ())
    }

    async fn upsert_row(&self, table: &str, row: Value) -> RemoteResult<()> {
        let token = self.table_token().await?;
        let response = self
            .authorized(self.http.post(self.rest_url(table)), &token)
            .header("Prefer", PREFER_UPSERT)
            .json(&row)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(response).await.map(|_| ())
    }
}

async fn ensure_success(response: Response) -> RemoteResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: BackendErrorBody = serde_json::from_str(&body).unwrap_or_default();

    let code = parsed
        .code()
        .map(|code| ErrorCode::from_backend_code(&code))
        .filter(|code| !matches!(code, ErrorCode::Other(_)) || !is_auth_status(status))
        .unwrap_or_else(|| code_for_status(status));
    let message = parsed.message().unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    });

    RemoteError::new(code, message).with_status(status.as_u16())
}

fn is_auth_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        other => ErrorCode::Other(other.as_u16().to_string()),
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    RemoteError::transport(err.to_string())
}

fn decode_error(err: reqwest::Error) -> RemoteError {
    RemoteError::decode(format!("unexpected response body: {err}"))
}

#[cfg(test)]
#[path = "tests/supabase_tests.rs"]
mod tests;
