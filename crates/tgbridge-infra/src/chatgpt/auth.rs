//! Session token to access token exchange.
//!
//! The web backend authenticates API calls with a short-lived bearer token
//! derived from the long-lived `__Secure-next-auth.session-token` cookie.
//! The derived token is cached for the session token it came from and
//! dropped when the backend rejects it.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use tgbridge_types::stream::BackendError;

use super::status::status_error;
use super::types::AuthSession;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";

/// Refresh this long before the advertised expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedAccess {
    session_token: SecretString,
    access_token: SecretString,
    expires: Option<DateTime<Utc>>,
}

impl CachedAccess {
    fn valid_for(&self, session_token: &SecretString, now: DateTime<Utc>) -> bool {
        if self.session_token.expose_secret() != session_token.expose_secret() {
            return false;
        }
        match self.expires {
            Some(expires) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < expires,
            None => true,
        }
    }
}

/// Cache of the current access token.
#[derive(Default)]
pub struct AccessTokenCache {
    cached: Mutex<Option<CachedAccess>>,
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a valid access token for `session_token`, fetching one if needed.
    pub async fn access_token(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        session_token: &SecretString,
    ) -> Result<SecretString, BackendError> {
        if let Some(token) = self.lookup(session_token, Utc::now()) {
            return Ok(token);
        }

        let session = fetch_auth_session(client, base_url, session_token).await?;
        let access_token = session
            .access_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                BackendError::AuthExpired("session returned no access token".to_string())
            })?;

        tracing::debug!(expires = ?session.expires, "access token refreshed");
        self.store(CachedAccess {
            session_token: session_token.clone(),
            access_token: access_token.clone(),
            expires: session.expires,
        });
        Ok(access_token)
    }

    /// Forget the cached access token.
    pub fn invalidate(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }

    fn lookup(&self, session_token: &SecretString, now: DateTime<Utc>) -> Option<SecretString> {
        let cached = self.cached.lock().ok()?;
        cached
            .as_ref()
            .filter(|c| c.valid_for(session_token, now))
            .map(|c| c.access_token.clone())
    }

    fn store(&self, access: CachedAccess) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(access);
        }
    }
}

async fn fetch_auth_session(
    client: &reqwest::Client,
    base_url: &str,
    session_token: &SecretString,
) -> Result<AuthSession, BackendError> {
    let url = format!("{base_url}/api/auth/session");
    let response = client
        .get(&url)
        .header(
            "Cookie",
            format!("{SESSION_COOKIE}={}", session_token.expose_secret()),
        )
        .send()
        .await
        .map_err(|e| BackendError::Network(format!("HTTP request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %error_body, "session exchange rejected");
        return Err(status_error(status, &error_body));
    }

    response
        .json::<AuthSession>()
        .await
        .map_err(|e| BackendError::Backend(format!("failed to parse session response: {e}")))
}
