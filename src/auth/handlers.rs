use anyhow::Context;
use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthUserResponse, GconnectQuery, LoginRequest, MessageResponse, RegisterRequest,
            UserData,
        },
        password,
        repo::User,
    },
    error::ApiError,
    session::{Provider, SessionHandle, SessionUser},
    state::AppState,
};

/// Avatar assigned to locally registered users until picture upload exists.
const DEFAULT_PICTURE_URL: &str =
    "https://encrypted-tbn2.gstatic.com/images?q=tbn:ANd9GcRm4xo-buhgKdRnRVIwPQhCC5SiF4hBn4VJOIP3k2gFy4CnfJYOeSsh";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/userdata", get(userdata))
}

pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gconnect", post(gconnect))
        .route("/api/disconnect", get(disconnect))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn session_user(user: &User, provider: Provider) -> SessionUser {
    SessionUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        picture: user.picture.clone(),
        provider,
    }
}

#[instrument(skip(state, session, payload))]
pub async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let email = payload.email.trim().to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid registration email");
        return Err(ApiError::BadRequest("Email is not valid.".into()));
    }
    if payload.password.is_empty() || payload.username.is_empty() {
        return Err(ApiError::BadRequest("Form fields incomplete.".into()));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::BadRequest("User already registered.".into()));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = User::create_local(
        &state.db,
        &payload.username,
        &email,
        DEFAULT_PICTURE_URL,
        &hash,
    )
    .await?;

    session.sign_in(session_user(&user, Provider::Local), None);
    info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "You have successfully registered.".into(),
        }),
    ))
}

#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<AuthUserResponse>), ApiError> {
    let (username, pass) = match (payload.username, payload.password) {
        (Some(username), Some(pass)) => (username, pass),
        _ => return Err(ApiError::BadRequest("Form fields incomplete.".into())),
    };

    let user = User::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::BadRequest("User not registered.".into()))?;

    // OAuth-only users carry no hash and cannot log in with a password.
    let verified = match user.password_hash.as_deref() {
        Some(hash) => password::verify_password(&pass, hash)?,
        None => false,
    };
    if !verified {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::BadRequest(
            "Username or password incorrect.".into(),
        ));
    }

    session.sign_in(session_user(&user, Provider::Local), None);
    info!(user_id = %user.id, "user logged in");

    Ok((
        StatusCode::CREATED,
        Json(AuthUserResponse {
            username: user.username,
            email: user.email,
            picture: user.picture,
            user_id: user.id,
        }),
    ))
}

#[instrument(skip(state, session, query, code))]
pub async fn gconnect(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(query): Query<GconnectQuery>,
    code: String,
) -> Result<Response, ApiError> {
    if query.state.is_none() || query.state != session.csrf_token() {
        warn!("oauth state does not match the session token");
        return Err(ApiError::InvalidState);
    }

    let token = match state.identity.exchange_code(code.trim()).await {
        Ok(token) => token,
        Err(e) => {
            // The sign-in widget fires the callback twice; the second exchange
            // of the same code fails at the provider and is answered with 200
            // so the client keeps the session from the first one.
            warn!(error = %e, "authorization code exchange failed");
            return Ok(Json(MessageResponse {
                message: "Let this error fail silently.".into(),
            })
            .into_response());
        }
    };

    let info = state
        .identity
        .token_info(&token.access_token)
        .await
        .context("fetch tokeninfo")?;
    if let Some(error) = info.error {
        return Err(ApiError::Provider(error));
    }
    if info.user_id.as_deref() != Some(token.subject.as_str()) {
        return Err(ApiError::TokenMismatch(
            "Token's user ID doesn't match given user ID.",
        ));
    }
    if info.issued_to.as_deref() != Some(state.config.google.client_id.as_str()) {
        return Err(ApiError::TokenMismatch(
            "Token's client ID does not match app's.",
        ));
    }

    let profile = state
        .identity
        .user_info(&token.access_token)
        .await
        .context("fetch userinfo")?;

    let user = match User::find_by_email(&state.db, &profile.email).await? {
        Some(user) => user,
        None => {
            User::create_oauth(&state.db, &profile.name, &profile.email, &profile.picture).await?
        }
    };

    session.sign_in(
        session_user(&user, Provider::Google),
        Some(token.access_token),
    );
    info!(user_id = %user.id, "oauth sign-in");

    Ok(Json(UserData {
        username: user.username,
        email: user.email,
        picture: user.picture,
        id: user.id,
    })
    .into_response())
}

#[instrument(skip(state, session))]
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Json<MessageResponse> {
    let snapshot = session.snapshot();
    let provider = snapshot.user.as_ref().map(|user| user.provider);
    if provider == Some(Provider::Google) {
        if let Some(access_token) = snapshot.access_token.as_deref() {
            match state.identity.revoke(access_token).await {
                Ok(true) => debug!("provider token revoked"),
                Ok(false) => warn!("Failed to revoke token for given user."),
                Err(e) => warn!(error = %e, "token revocation errored"),
            }
        }
    }
    session.clear();
    Json(MessageResponse {
        message: "Successfully logged out.".into(),
    })
}

#[instrument(skip(session))]
pub async fn userdata(
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<UserData>, ApiError> {
    let user = session.user().ok_or(ApiError::Forbidden)?;
    Ok(Json(UserData {
        username: user.username,
        email: user.email,
        picture: user.picture,
        id: user.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern_accepts_plain_addresses() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
    }

    #[test]
    fn email_pattern_rejects_garbage() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("spaces in@example.com"));
    }

    #[test]
    fn userdata_serializes_all_profile_fields() {
        let data = UserData {
            username: "ada".into(),
            email: "ada@example.com".into(),
            picture: "https://example.com/a.png".into(),
            id: uuid::Uuid::new_v4(),
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("ada@example.com"));
        assert!(json.contains("picture"));
    }
}
