use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request payload for user login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "username": "thiago",
    "password": "senha123"
}))]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Session token, also set as the `session` cookie
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
    "expires_at": "2024-01-16T12:00:00Z",
    "user_id": 1,
    "name": "Thiago"
}))]
pub struct AuthToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: i64,
    pub name: String,
}

/// Identity carried by a valid session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    pub user_id: i64,
    pub name: String,
}

/// Response for the session check endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub user: Option<SessionInfo>,
}
