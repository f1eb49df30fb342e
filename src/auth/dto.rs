use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for local registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
}

/// Request body for local login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GconnectQuery {
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Returned after a successful login.
#[derive(Debug, Serialize)]
pub struct AuthUserResponse {
    pub username: String,
    pub email: String,
    pub picture: String,
    pub user_id: Uuid,
}

/// The signed-in user's profile, as served by `/api/userdata` and the OAuth
/// callback.
#[derive(Debug, Serialize)]
pub struct UserData {
    pub username: String,
    pub email: String,
    pub picture: String,
    pub id: Uuid,
}
