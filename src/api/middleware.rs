//! Request authentication and user identity.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

/// Header carrying the id of the user a request acts for.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Security configuration loaded from environment variables.
#[derive(Clone, Debug, Default)]
pub struct SecurityConfig {
    /// API key for authentication (from RANKSHELF_API_KEY)
    pub api_key: Option<String>,
    /// Allowed CORS origins (from RANKSHELF_CORS_ORIGINS, comma-separated)
    pub cors_origins: Option<Vec<String>>,
}

impl SecurityConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("RANKSHELF_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let cors_origins = std::env::var("RANKSHELF_CORS_ORIGINS")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect());

        Self {
            api_key,
            cors_origins,
        }
    }

    /// No authentication, permissive CORS.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            cors_origins: None,
        }
    }

    pub fn cors_layer(&self) -> CorsLayer {
        match &self.cors_origins {
            Some(origins) => {
                let origins: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|origin| match origin.parse() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                            None
                        }
                    })
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(tower_http::cors::Any)
                    .allow_headers(tower_http::cors::Any)
            }
            None => CorsLayer::permissive(),
        }
    }
}

/// Rejects requests without the configured bearer token. A no-op when no key is set.
pub async fn auth_middleware(
    State(config): State<SecurityConfig>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected_key) = &config.api_key else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match token {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!("Invalid API key provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// The user a request acts for, taken from the `X-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-User-Id header".to_string()))?;

        value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(CurrentUser)
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid X-User-Id header".to_string()))
    }
}
