use async_trait::async_trait;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::auth::{AuthToken, LoginRequest, SessionInfo};
use crate::models::user::{CreateUserRequest, User};
use crate::repositories::{RepositoryError, UserRepository};

/// How long a session stays valid after login
pub const SESSION_TTL_HOURS: i64 = 24;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user_id
    name: String,
    exp: i64, // expiration timestamp
}

/// Authentication service errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Hash a password with bcrypt at the given cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Trait defining authentication service operations
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user
    async fn register(&self, request: CreateUserRequest) -> Result<User, AuthError>;

    /// Check credentials and issue a session token
    async fn login(&self, request: LoginRequest) -> Result<AuthToken, AuthError>;

    /// Validate a session token; the user must still exist
    async fn validate_token(&self, token: &str) -> Result<SessionInfo, AuthError>;
}

/// Implementation of AuthService
pub struct AuthServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    jwt_secret: String,
    bcrypt_cost: u32,
}

impl AuthServiceImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        jwt_secret: String,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            user_repository,
            jwt_secret,
            bcrypt_cost,
        }
    }

    fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        verify(password, hash)
            .map_err(|e| AuthError::DatabaseError(format!("Password verification failed: {}", e)))
    }

    fn generate_jwt(&self, user: &User) -> Result<AuthToken, AuthError> {
        let expiration = Utc::now() + Duration::hours(SESSION_TTL_HOURS);

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            exp: expiration.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::DatabaseError(format!("Token generation failed: {}", e)))?;

        Ok(AuthToken {
            token,
            expires_at: expiration,
            user_id: user.id,
            name: user.name.clone(),
        })
    }

    fn decode_jwt(&self, token: &str) -> Result<i64, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        token_data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, request: CreateUserRequest) -> Result<User, AuthError> {
        let password_hash = hash_password(&request.password, self.bcrypt_cost)
            .map_err(|e| AuthError::DatabaseError(format!("Password hashing failed: {}", e)))?;

        let user = self
            .user_repository
            .create(request, password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation(_) => AuthError::DuplicateUsername,
                RepositoryError::DatabaseError(msg) | RepositoryError::ReferenceViolation(msg) => {
                    AuthError::DatabaseError(msg)
                }
                RepositoryError::NotFound => {
                    AuthError::DatabaseError("Unexpected error".to_string())
                }
            })?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthToken, AuthError> {
        let user = self
            .user_repository
            .find_by_username(&request.username)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let Some(user) = user else {
            tracing::warn!(username = %request.username, "Login rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !Self::verify_password(&request.password, &user.password_hash)? {
            tracing::warn!(username = %request.username, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.generate_jwt(&user)
    }

    async fn validate_token(&self, token: &str) -> Result<SessionInfo, AuthError> {
        let user_id = self.decode_jwt(token)?;

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidToken)?;

        Ok(SessionInfo {
            user_id: user.id,
            name: user.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::in_memory::InMemoryRepositories;

    const TEST_COST: u32 = 4;

    fn service(repo: Arc<InMemoryRepositories>) -> AuthServiceImpl {
        AuthServiceImpl::new(repo, "test_secret".to_string(), TEST_COST)
    }

    fn register_request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: "Thiago".to_string(),
            username: username.to_string(),
            password: "senha123".to_string(),
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = service(InMemoryRepositories::new());

        let user = service.register(register_request("thiago")).await.unwrap();

        assert_eq!(user.username, "thiago");
        assert_ne!(user.password_hash, "senha123");
        assert!(verify("senha123", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let service = service(InMemoryRepositories::new());

        service.register(register_request("thiago")).await.unwrap();
        let result = service.register(register_request("thiago")).await;

        assert!(matches!(result, Err(AuthError::DuplicateUsername)));
    }

    #[tokio::test]
    async fn test_login_and_validate_token() {
        let service = service(InMemoryRepositories::new());
        let user = service.register(register_request("thiago")).await.unwrap();

        let token = service
            .login(login_request("thiago", "senha123"))
            .await
            .unwrap();
        assert_eq!(token.user_id, user.id);
        assert_eq!(token.name, "Thiago");
        assert!(token.expires_at > Utc::now());

        let session = service.validate_token(&token.token).await.unwrap();
        assert_eq!(
            session,
            SessionInfo {
                user_id: user.id,
                name: "Thiago".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_user() {
        let service = service(InMemoryRepositories::new());
        service.register(register_request("thiago")).await.unwrap();

        let wrong = service.login(login_request("thiago", "errada")).await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = service.login(login_request("ninguem", "senha123")).await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_validate_token_rejects_garbage_and_foreign_secret() {
        let repo = InMemoryRepositories::new();
        let service = service(repo.clone());
        service.register(register_request("thiago")).await.unwrap();
        let token = service
            .login(login_request("thiago", "senha123"))
            .await
            .unwrap();

        assert!(matches!(
            service.validate_token("not-a-token").await,
            Err(AuthError::InvalidToken)
        ));

        let other = AuthServiceImpl::new(repo, "other_secret".to_string(), TEST_COST);
        assert!(matches!(
            other.validate_token(&token.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_validate_token_expired() {
        let repo = InMemoryRepositories::new();
        let user = repo.insert_user("thiago", "Thiago");
        let service = service(repo);

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name,
            exp: (Utc::now() - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        assert!(matches!(
            service.validate_token(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_validate_token_for_deleted_user() {
        let repo = InMemoryRepositories::new();
        let service = service(repo.clone());
        let user = service.register(register_request("thiago")).await.unwrap();
        let token = service
            .login(login_request("thiago", "senha123"))
            .await
            .unwrap();

        UserRepository::delete(repo.as_ref(), user.id).await.unwrap();

        assert!(matches!(
            service.validate_token(&token.token).await,
            Err(AuthError::InvalidToken)
        ));
    }
}
