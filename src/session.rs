use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_COOKIE: &str = "XSRF-TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Local,
}

/// The signed-in identity carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub picture: String,
    pub provider: Provider,
}

/// Typed session state. Empty for anonymous clients apart from the rotating
/// CSRF token; `access_token` is only set for OAuth sign-ins so disconnect
/// can revoke it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    iat: usize,
    exp: usize,
    #[serde(flatten)]
    session: Session,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfClaims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signs and opens the session cookie, and signs the user-bound CSRF token.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    csrf_ttl: Duration,
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            session_ttl: Duration::from_secs((cfg.session_ttl_minutes as u64) * 60),
            csrf_ttl: Duration::from_secs((cfg.csrf_ttl_minutes as u64) * 60),
        }
    }

    pub fn seal(&self, session: &Session) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.session_ttl.as_secs() as i64);
        let claims = SessionClaims {
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            session: session.clone(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// A tampered, malformed or expired cookie reads as no session at all.
    pub fn open(&self, token: &str) -> Option<Session> {
        let validation = Validation::default();
        match decode::<SessionClaims>(token, &self.decoding, &validation) {
            Ok(data) => Some(data.claims.session),
            Err(e) => {
                debug!(error = %e, "discarding unreadable session cookie");
                None
            }
        }
    }

    /// Signed, time-limited token bound to a user id. Only ever compared for
    /// session equality on read, never verified cryptographically.
    pub fn sign_csrf(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.csrf_ttl.as_secs() as i64);
        let claims = CsrfClaims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.session)
    }
}

/// Shared mutable view of the request's session. The CSRF middleware installs
/// one into request extensions and writes the final state back as a cookie
/// after the handler runs.
#[derive(Clone, Default)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Session> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.lock().user.clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.lock().user.as_ref().map(|u| u.id)
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.lock().csrf_token.clone()
    }

    /// Pop the stored token; the pre-POST check consumes it.
    pub fn take_csrf_token(&self) -> Option<String> {
        self.lock().csrf_token.take()
    }

    pub fn set_csrf_token(&self, token: String) {
        self.lock().csrf_token = Some(token);
    }

    pub fn sign_in(&self, user: SessionUser, access_token: Option<String>) {
        let mut session = self.lock();
        session.user = Some(user);
        session.access_token = access_token;
    }

    pub fn clear(&self) {
        *self.lock() = Session::default();
    }
}

/// Extracts the signed-in user from the session or rejects with 401.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let handle = parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(ApiError::Unauthorized)?;
        handle.user().map(CurrentUser).ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> SessionKeys {
        SessionKeys::new(&SessionConfig {
            secret: "test-secret".into(),
            session_ttl_minutes: 60,
            csrf_ttl_minutes: 20,
        })
    }

    fn test_user() -> SessionUser {
        SessionUser {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            picture: "https://example.com/ada.png".into(),
            provider: Provider::Local,
        }
    }

    #[test]
    fn seal_and_open_roundtrip() {
        let keys = test_keys();
        let session = Session {
            user: Some(test_user()),
            csrf_token: Some("token".into()),
            access_token: None,
        };
        let sealed = keys.seal(&session).expect("seal session");
        let opened = keys.open(&sealed).expect("open session");
        assert_eq!(opened, session);
    }

    #[test]
    fn open_rejects_tampered_cookie() {
        let keys = test_keys();
        let sealed = keys.seal(&Session::default()).expect("seal session");
        let mut tampered = sealed.clone();
        tampered.push('x');
        assert!(keys.open(&tampered).is_none());
    }

    #[test]
    fn open_rejects_wrong_secret() {
        let keys = test_keys();
        let other = SessionKeys::new(&SessionConfig {
            secret: "another-secret".into(),
            session_ttl_minutes: 60,
            csrf_ttl_minutes: 20,
        });
        let sealed = keys.seal(&Session::default()).expect("seal session");
        assert!(other.open(&sealed).is_none());
    }

    #[test]
    fn csrf_token_is_bound_to_the_user() {
        let keys = test_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_csrf(user_id).expect("sign csrf");

        let mut validation = Validation::default();
        validation.validate_exp = true;
        let data = decode::<CsrfClaims>(
            &token,
            &DecodingKey::from_secret("test-secret".as_bytes()),
            &validation,
        )
        .expect("decode csrf token");
        assert_eq!(data.claims.sub, user_id);
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn take_csrf_token_pops_the_value() {
        let handle = SessionHandle::new(Session {
            csrf_token: Some("once".into()),
            ..Session::default()
        });
        assert_eq!(handle.take_csrf_token().as_deref(), Some("once"));
        assert_eq!(handle.take_csrf_token(), None);
    }

    #[test]
    fn clear_resets_everything() {
        let handle = SessionHandle::new(Session {
            user: Some(test_user()),
            csrf_token: Some("t".into()),
            access_token: Some("a".into()),
        });
        handle.clear();
        assert_eq!(handle.snapshot(), Session::default());
    }
}
