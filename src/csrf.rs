use axum::extract::{FromRef, Request, State};
use axum::http::{header::SET_COOKIE, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::session::{SessionHandle, SessionKeys, CSRF_COOKIE, SESSION_COOKIE};
use crate::state::AppState;

/// The OAuth callback carries its anti-forgery proof in the `state` query
/// parameter instead of the rotating cookie.
const CSRF_EXEMPT_PATH: &str = "/api/gconnect";

/// Wraps every `/api` route. POSTs must present the cookie token matching the
/// session-stored one (which is consumed by the check); every response leaves
/// with a freshly rotated token and a re-sealed session cookie.
pub async fn layer(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let session = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| keys.open(cookie.value()))
        .unwrap_or_default();
    let handle = SessionHandle::new(session);

    let response = if requires_token(req.method(), req.uri().path())
        && !token_matches(&handle, &jar)
    {
        warn!(path = %req.uri().path(), "rejecting request with missing or mismatched csrf token");
        ApiError::CsrfRejected.into_response()
    } else {
        req.extensions_mut().insert(handle.clone());
        next.run(req).await
    };

    rotate_and_seal(&keys, &handle, response)
}

fn requires_token(method: &Method, path: &str) -> bool {
    method == Method::POST && path != CSRF_EXEMPT_PATH
}

fn token_matches(handle: &SessionHandle, jar: &CookieJar) -> bool {
    let stored = handle.take_csrf_token();
    let presented = jar.get(CSRF_COOKIE).map(|cookie| cookie.value().to_owned());
    matches!((stored, presented), (Some(stored), Some(presented)) if stored == presented)
}

/// Runs for every response, rejected ones included: a random token for
/// anonymous sessions, a signed user-bound one otherwise.
fn rotate_and_seal(keys: &SessionKeys, handle: &SessionHandle, mut response: Response) -> Response {
    let token = match handle.user_id() {
        Some(user_id) => keys.sign_csrf(user_id).unwrap_or_else(|e| {
            error!(error = %e, "signing csrf token failed, falling back to random");
            random_token()
        }),
        None => random_token(),
    };
    handle.set_csrf_token(token.clone());

    match keys.seal(&handle.snapshot()) {
        Ok(sealed) => {
            let session_cookie = Cookie::build((SESSION_COOKIE, sealed))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            append_cookie(&mut response, &session_cookie);
        }
        Err(e) => error!(error = %e, "sealing session cookie failed"),
    }

    // Readable by the client script, which echoes it back as the cookie the
    // pre-POST check compares against.
    let csrf_cookie = Cookie::build((CSRF_COOKIE, token))
        .path("/")
        .same_site(SameSite::Lax)
        .build();
    append_cookie(&mut response, &csrf_cookie);

    response
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, name = %cookie.name(), "cookie not representable as header"),
    }
}

pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_are_32_alphanumeric_chars() {
        let token = random_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn random_tokens_differ() {
        assert_ne!(random_token(), random_token());
    }

    #[test]
    fn only_posts_outside_the_oauth_callback_need_a_token() {
        assert!(requires_token(&Method::POST, "/api/category/"));
        assert!(requires_token(&Method::POST, "/api/login"));
        assert!(!requires_token(&Method::POST, "/api/gconnect"));
        assert!(!requires_token(&Method::GET, "/api/category/"));
        assert!(!requires_token(&Method::DELETE, "/api/category/1"));
    }
}
