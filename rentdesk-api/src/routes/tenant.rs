/// Tenant portal endpoints
///
/// Staff create magic links for a lease. A tenant opening the link exchanges
/// the raw token for a signed `tenant_session` cookie, then proves their
/// identity with their last name.
///
/// # Endpoints
///
/// - `POST /v1/tenant/leases/:id/magic-link` - Issue a link (JWT, `leases.edit`)
/// - `DELETE /v1/tenant/leases/:id/magic-link` - Revoke it (JWT, `leases.edit`)
/// - `POST /v1/tenant/session` - Exchange a token for a session cookie
/// - `GET /v1/tenant/session` - Current session
/// - `DELETE /v1/tenant/session` - End the session
/// - `POST /v1/tenant/verify` - Identity check by last name

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::team::CurrentTeam,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rentdesk_shared::{
    auth::{
        authorization::Requirement,
        cookies::{
            clear_cookie_header, read_cookie, set_cookie_header, sign, verify, CookieOptions,
            TENANT_SESSION_COOKIE, TENANT_SESSION_MAX_AGE_SECS,
        },
        permissions::TeamPermission,
        tenant_token,
    },
    models::{
        audit_log::{NewAuditEntry, TeamAuditLog},
        lease::TenantPortalLease,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    pub success: bool,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues a new magic link for a lease, replacing any previous one
///
/// The raw token only ever appears in the returned URL.
pub async fn create_magic_link(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(lease_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<MagicLinkResponse>)> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::LeasesEdit))
        .await?;

    let (token, expires_at) =
        tenant_token::issue_link(&state.db, ctx.team_id, lease_id, Utc::now()).await?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "tenant_link.created")
            .resource("lease", lease_id),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MagicLinkResponse {
            success: true,
            url: state.config.tenant_portal_url(&token),
            expires_at,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct RevokeLinkResponse {
    pub revoked: bool,
}

/// Revokes a lease's magic link
pub async fn revoke_magic_link(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(lease_id): Path<Uuid>,
) -> ApiResult<Json<RevokeLinkResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::LeasesEdit))
        .await?;

    tenant_token::revoke_link(&state.db, ctx.team_id, lease_id).await?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "tenant_link.revoked")
            .resource("lease", lease_id),
    )
    .await?;

    tracing::info!(team_id = %ctx.team_id, lease_id = %lease_id, "Tenant magic link revoked");

    Ok(Json(RevokeLinkResponse { revoked: true }))
}

/// What the portal shows about the session; never includes the token
#[derive(Debug, Clone, Serialize)]
pub struct TenantSession {
    pub lease_id: Uuid,
    pub tenant_name: String,
    pub tenant_email: Option<String>,
    pub property_title: Option<String>,
    pub property_address: Option<String>,
    pub verified: bool,
}

impl From<TenantPortalLease> for TenantSession {
    fn from(lease: TenantPortalLease) -> Self {
        Self {
            lease_id: lease.lease_id,
            tenant_name: lease.tenant_name,
            tenant_email: lease.tenant_email,
            property_title: lease.property_title,
            property_address: lease.property_address,
            verified: lease.tenant_token_verified,
        }
    }
}

fn session_cookie(token: &str, state: &AppState) -> String {
    set_cookie_header(
        TENANT_SESSION_COOKIE,
        &sign(token, state.cookie_secret()),
        &CookieOptions {
            max_age_secs: TENANT_SESSION_MAX_AGE_SECS,
            secure: state.secure_cookies(),
        },
    )
}

/// Raw token carried by a valid `tenant_session` cookie
fn session_token(headers: &HeaderMap, secret: &str) -> ApiResult<String> {
    let raw = read_cookie(headers, TENANT_SESSION_COOKIE)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("No tenant session".to_string()))?;

    verify(raw, secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected tenant session cookie");
        ApiError::Unauthenticated("Invalid tenant session".to_string())
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 128, message = "Token is required"))]
    pub token: String,
}

/// Exchanges a magic-link token for a session cookie
///
/// # Errors
///
/// - `401 Unauthorized`: unknown or expired token, or inactive lease
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let lease = tenant_token::validate_token(&state.db, req.token.trim(), Utc::now()).await?;

    Ok((
        [(header::SET_COOKIE, session_cookie(req.token.trim(), &state))],
        Json(TenantSession::from(lease)),
    ))
}

/// Returns the current tenant session
///
/// The token behind the cookie is validated again, so a revoked or expired
/// link ends the session.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<TenantSession>> {
    let token = session_token(&headers, state.cookie_secret())?;
    let lease = tenant_token::validate_token(&state.db, &token, Utc::now()).await?;

    Ok(Json(lease.into()))
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub success: bool,
}

/// Clears the session cookie
pub async fn end_session(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(
            header::SET_COOKIE,
            clear_cookie_header(TENANT_SESSION_COOKIE, state.secure_cookies()),
        )],
        Json(EndSessionResponse { success: true }),
    )
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyIdentityRequest {
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    /// Raw token, for clients that have not opened a session yet
    pub token: Option<String>,
}

/// Checks the tenant's last name, ignoring case and accents
///
/// # Errors
///
/// - `401 Unauthorized`: no session and no token
/// - `403 Forbidden`: name mismatch, or too many failed attempts
pub async fn verify_identity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<VerifyIdentityRequest>,
) -> ApiResult<Json<TenantSession>> {
    req.validate()?;

    let token = match req.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => token.to_string(),
        None => session_token(&headers, state.cookie_secret())?,
    };

    let lease =
        tenant_token::verify_identity(&state.db, &token, &req.last_name, Utc::now()).await?;

    Ok(Json(lease.into()))
}
