/// Error handling for the API server
///
/// All handlers return `Result<T, ApiError>`, which converts to an HTTP
/// response with a uniform body:
///
/// ```json
/// { "success": false, "error": "forbidden", "message": "...", "details": [...] }
/// ```
///
/// # Example
///
/// ```
/// use rentdesk_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler(found: bool) -> ApiResult<Json<serde_json::Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Lease not found".to_string()));
///     }
///     Ok(Json(json!({ "success": true })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rentdesk_shared::activation::ActivationError;
use rentdesk_shared::auth::authorization::AuthzError;
use rentdesk_shared::auth::principal::AuthError;
use rentdesk_shared::auth::tenant_token::TenantTokenError;
use rentdesk_worker::reminders::DispatchError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// No or invalid credentials (401)
    Unauthenticated(String),

    /// Authenticated but without an active team (403)
    NoTeam,

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// A third-party service failed (502)
    Upstream(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,

    /// Error code (e.g., "no_team", "forbidden")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            ApiError::NoTeam => write!(f, "No active team"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NoTeam | ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::NoTeam => "no_team",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::InternalError(_) => "internal_error",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match self {
            ApiError::ValidationError(errors) => {
                ("Request validation failed".to_string(), Some(errors))
            }
            ApiError::NoTeam => (
                "You are not an active member of any team".to_string(),
                None,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthenticated(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Upstream(msg)
            | ApiError::ServiceUnavailable(msg) => (msg, None),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("unique");
                    return ApiError::Conflict(format!("Already exists ({constraint})"));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthenticated(err.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NoTeam => ApiError::NoTeam,
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Your role does not allow this action".to_string())
            }
            AuthzError::MissingPermission { permission, .. } => {
                ApiError::Forbidden(format!("Missing permission: {}", permission.key()))
            }
            AuthzError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<ActivationError> for ApiError {
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::TeamNotFound => ApiError::NotFound("Team not found".to_string()),
            ActivationError::NotReady { .. } | ActivationError::ModuleLocked { .. } => {
                ApiError::Conflict(err.to_string())
            }
            ActivationError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<TenantTokenError> for ApiError {
    fn from(err: TenantTokenError) -> Self {
        match err {
            TenantTokenError::Invalid
            | TenantTokenError::Expired
            | TenantTokenError::LeaseInactive => ApiError::Unauthenticated(err.to_string()),
            TenantTokenError::IdentityMismatch | TenantTokenError::TooManyAttempts => {
                ApiError::Forbidden(err.to_string())
            }
            TenantTokenError::LeaseNotFound => ApiError::NotFound(err.to_string()),
            TenantTokenError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Convert validator errors into field-level details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentdesk_shared::auth::permissions::TeamPermission;
    use rentdesk_shared::models::team_member::TeamRole;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Lease not found".to_string());
        assert_eq!(err.to_string(), "Not found: Lease not found");
    }

    #[test]
    fn test_no_team_and_forbidden_have_distinct_codes() {
        let no_team: ApiError = AuthzError::NoTeam.into();
        let role: ApiError = AuthzError::InsufficientRole {
            required: vec![TeamRole::Owner],
            actual: TeamRole::Agent,
        }
        .into();
        let permission: ApiError = AuthzError::MissingPermission {
            permission: TeamPermission::PaymentsVoid,
            role: TeamRole::Manager,
        }
        .into();

        assert_eq!(no_team.status(), StatusCode::FORBIDDEN);
        assert_eq!(no_team.code(), "no_team");
        assert_eq!(role.code(), "forbidden");
        assert_eq!(permission.code(), "forbidden");
        assert_eq!(permission.to_string(), "Forbidden: Missing permission: payments.void");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "period_month".to_string(),
                message: "must be between 1 and 12".to_string(),
            },
            ValidationErrorDetail {
                field: "period_year".to_string(),
                message: "out of range".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_tenant_errors_mapping() {
        assert_eq!(ApiError::from(TenantTokenError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(TenantTokenError::TooManyAttempts).status(),
            StatusCode::FORBIDDEN
        );
    }
}
