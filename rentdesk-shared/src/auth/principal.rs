/// Request principal and bearer-token middleware
///
/// [`jwt_auth_middleware`] validates the `Authorization: Bearer` header and
/// stores a [`Principal`] in the request extensions. Handlers take the
/// principal as an extractor; a request that reaches one without passing
/// through the middleware is rejected as unauthenticated.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use rentdesk_shared::auth::principal::{jwt_auth_middleware, Principal};
///
/// async fn whoami(principal: Principal) -> String {
///     principal.user_id.to_string()
/// }
///
/// let secret = "your-secret-key-at-least-32-bytes".to_string();
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn(
///         move |req: axum::extract::Request, next: middleware::Next| {
///             jwt_auth_middleware(secret.clone(), req, next)
///         },
///     ));
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};

/// The authenticated user behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
}

/// Authentication failures, all rendered as 401
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": "unauthenticated",
            "message": self.to_string(),
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Resolves the principal from an `Authorization: Bearer <jwt>` header
pub fn principal_from_headers(headers: &HeaderMap, secret: &str) -> Result<Principal, AuthError> {
    let token = bearer_token(headers)?;

    let claims = validate_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    Ok(Principal {
        user_id: claims.sub,
        email: claims.email,
    })
}

/// JWT authentication middleware
///
/// Inserts a [`Principal`] into the request extensions on success.
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = principal_from_headers(req.headers(), &secret)?;
    tracing::debug!(user_id = %principal.user_id, "Authenticated request");

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}
