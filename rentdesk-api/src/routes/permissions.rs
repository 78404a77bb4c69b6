/// Temporary permission endpoints
///
/// Owners and managers hand out time-boxed permissions on top of a member's
/// role. Members ask for them through access requests.
///
/// # Endpoints
///
/// - `GET /v1/permissions/me` - Caller's effective permissions
/// - `GET /v1/permissions` - Active grants of the team (owner, manager)
/// - `POST /v1/permissions` - Issue a grant (owner, manager)
/// - `DELETE /v1/permissions/:id` - Revoke a grant (owner, manager)
/// - `POST /v1/permissions/requests` - Ask for a permission
/// - `GET /v1/permissions/requests` - List requests (owner, manager)
/// - `POST /v1/permissions/requests/:id/review` - Approve or reject

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::team::{CurrentTeam, TEAM_ADMINS},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rentdesk_shared::{
    auth::{
        authorization::effective_permissions,
        permissions::TeamPermission,
    },
    models::{
        access_request::{
            AccessRequest, AccessRequestStatus, CreateAccessRequest, ReviewAccessRequest,
        },
        audit_log::{NewAuditEntry, TeamAuditLog},
        team_member::{TeamMember, TeamRole},
        temporary_permission::{
            grant_expiry, GrantTemporaryPermission, TemporaryPermission, DEFAULT_GRANT_HOURS,
            MAX_GRANT_HOURS, MIN_GRANT_HOURS,
        },
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn parse_permission(key: &str) -> ApiResult<TeamPermission> {
    TeamPermission::from_key(key)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown permission: {key}")))
}

fn expiry_for(now: DateTime<Utc>, hours: i64) -> ApiResult<DateTime<Utc>> {
    grant_expiry(now, hours).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Duration must be between {MIN_GRANT_HOURS} and {MAX_GRANT_HOURS} hours"
        ))
    })
}

#[derive(Debug, Serialize)]
pub struct MyPermissionsResponse {
    pub team_id: Uuid,
    pub role: TeamRole,
    /// Role catalog, overrides and active grants combined
    pub permissions: Vec<TeamPermission>,
    pub temporary: Vec<TemporaryPermission>,
}

/// Returns what the caller can do in the active team
pub async fn my_permissions(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<MyPermissionsResponse>> {
    let ctx = current.context()?;
    let now = Utc::now();

    let temporary =
        TemporaryPermission::get_active_permissions(&state.db, ctx.team_id, ctx.user_id, now)
            .await?;

    Ok(Json(MyPermissionsResponse {
        team_id: ctx.team_id,
        role: ctx.role,
        permissions: effective_permissions(ctx, &temporary, now),
        temporary,
    }))
}

#[derive(Debug, Serialize)]
pub struct GrantsResponse {
    pub grants: Vec<TemporaryPermission>,
}

/// Lists the team's grants that have not expired
pub async fn list_grants(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<GrantsResponse>> {
    let ctx = current.require_role(TEAM_ADMINS)?;

    let grants = TemporaryPermission::list_active_for_team(&state.db, ctx.team_id, Utc::now())
        .await?;

    Ok(Json(GrantsResponse { grants }))
}

/// Grant request
#[derive(Debug, Deserialize, Validate)]
pub struct GrantPermissionRequest {
    pub user_id: Uuid,

    /// Permission key, e.g. `payments.void`
    pub permission: String,

    /// Hours until expiry (default: 24, range 1-720)
    #[validate(range(min = 1, max = 720, message = "duration_hours must be between 1 and 720"))]
    pub duration_hours: Option<i64>,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub success: bool,
    pub grant: TemporaryPermission,
}

/// Issues a temporary permission to a member
///
/// # Endpoint
///
/// ```text
/// POST /v1/permissions
/// Authorization: Bearer <jwt_token>
///
/// { "user_id": "...", "permission": "payments.void", "duration_hours": 48 }
/// ```
///
/// Granting a key the member already holds temporarily replaces its expiry.
///
/// # Errors
///
/// - `400 Bad Request`: unknown permission key
/// - `403 Forbidden`: caller is not owner or manager
/// - `404 Not Found`: user is not an active member of the team
/// - `422 Unprocessable Entity`: duration out of range
pub async fn grant_permission(
    State(state): State<AppState>,
    current: CurrentTeam,
    Json(req): Json<GrantPermissionRequest>,
) -> ApiResult<(StatusCode, Json<GrantResponse>)> {
    let ctx = current.require_role(TEAM_ADMINS)?;
    req.validate()?;

    let permission = parse_permission(&req.permission)?;
    let expires_at = expiry_for(Utc::now(), req.duration_hours.unwrap_or(DEFAULT_GRANT_HOURS))?;

    TeamMember::find_active(&state.db, ctx.team_id, req.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    let grant = TemporaryPermission::grant(
        &state.db,
        GrantTemporaryPermission {
            team_id: ctx.team_id,
            user_id: req.user_id,
            permission: permission.key().to_string(),
            granted_by: ctx.user_id,
            reason: req.reason,
            access_request_id: None,
            expires_at,
        },
    )
    .await?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "permission.granted")
            .resource("temporary_permission", grant.id)
            .change(
                None,
                Some(json!({
                    "user_id": grant.user_id,
                    "permission": grant.permission,
                    "expires_at": grant.expires_at,
                })),
            ),
    )
    .await?;

    tracing::info!(
        team_id = %ctx.team_id,
        user_id = %grant.user_id,
        permission = %grant.permission,
        expires_at = %grant.expires_at,
        "Temporary permission granted"
    );

    Ok((
        StatusCode::CREATED,
        Json(GrantResponse {
            success: true,
            grant,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Revokes a grant of the active team
pub async fn revoke_permission(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(grant_id): Path<Uuid>,
) -> ApiResult<Json<RevokeResponse>> {
    let ctx = current.require_role(TEAM_ADMINS)?;

    if !TemporaryPermission::revoke(&state.db, ctx.team_id, grant_id).await? {
        return Err(ApiError::NotFound("Grant not found".to_string()));
    }

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "permission.revoked")
            .resource("temporary_permission", grant_id),
    )
    .await?;

    tracing::info!(team_id = %ctx.team_id, grant_id = %grant_id, "Temporary permission revoked");

    Ok(Json(RevokeResponse { revoked: true }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AccessRequestBody {
    pub permission: String,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessRequestResponse {
    pub success: bool,
    pub request: AccessRequest,
}

/// Files an access request for a permission the caller lacks
///
/// # Errors
///
/// - `400 Bad Request`: unknown key, or the caller already holds it
/// - `409 Conflict`: the same request is already pending
pub async fn request_access(
    State(state): State<AppState>,
    current: CurrentTeam,
    Json(req): Json<AccessRequestBody>,
) -> ApiResult<(StatusCode, Json<AccessRequestResponse>)> {
    let ctx = current.context()?;
    req.validate()?;

    let permission = parse_permission(&req.permission)?;
    let now = Utc::now();

    let grants =
        TemporaryPermission::get_active_permissions(&state.db, ctx.team_id, ctx.user_id, now)
            .await?;
    if effective_permissions(ctx, &grants, now).contains(&permission) {
        return Err(ApiError::BadRequest(format!(
            "You already hold {}",
            permission.key()
        )));
    }

    let request = AccessRequest::create(
        &state.db,
        CreateAccessRequest {
            team_id: ctx.team_id,
            requester_id: ctx.user_id,
            requested_permission: permission.key().to_string(),
            reason: req.reason,
        },
    )
    .await?;

    tracing::info!(
        team_id = %ctx.team_id,
        requester_id = %ctx.user_id,
        permission = permission.key(),
        "Access requested"
    );

    Ok((
        StatusCode::CREATED,
        Json(AccessRequestResponse {
            success: true,
            request,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AccessRequestQuery {
    pub status: Option<AccessRequestStatus>,
}

#[derive(Debug, Serialize)]
pub struct AccessRequestsResponse {
    pub requests: Vec<AccessRequest>,
}

/// Lists the team's access requests, newest first
pub async fn list_access_requests(
    State(state): State<AppState>,
    current: CurrentTeam,
    Query(query): Query<AccessRequestQuery>,
) -> ApiResult<Json<AccessRequestsResponse>> {
    let ctx = current.require_role(TEAM_ADMINS)?;

    let requests = AccessRequest::list_by_team(&state.db, ctx.team_id, query.status).await?;

    Ok(Json(AccessRequestsResponse { requests }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequestBody {
    pub decision: ReviewDecision,

    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub review_notes: Option<String>,

    /// Grant duration on approval (default: 24)
    #[validate(range(min = 1, max = 720, message = "duration_hours must be between 1 and 720"))]
    pub duration_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub success: bool,
    pub request: AccessRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<TemporaryPermission>,
}

/// Approves or rejects a pending request
///
/// Approval issues the grant in the same transaction as the review.
///
/// # Errors
///
/// - `404 Not Found`: no such request in the team
/// - `409 Conflict`: the request was already reviewed
pub async fn review_access_request(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(request_id): Path<Uuid>,
    Json(req): Json<ReviewRequestBody>,
) -> ApiResult<Json<ReviewResponse>> {
    let ctx = current.require_role(TEAM_ADMINS)?;
    req.validate()?;

    let existing = AccessRequest::find_in_team(&state.db, ctx.team_id, request_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Access request not found".to_string()))?;

    let approved = req.decision == ReviewDecision::Approve;
    let expires_at = if approved {
        Some(expiry_for(
            Utc::now(),
            req.duration_hours.unwrap_or(DEFAULT_GRANT_HOURS),
        )?)
    } else {
        None
    };

    let mut tx = state.db.begin().await?;

    let request = AccessRequest::review(
        &mut *tx,
        ctx.team_id,
        request_id,
        ReviewAccessRequest {
            status: if approved {
                AccessRequestStatus::Approved
            } else {
                AccessRequestStatus::Rejected
            },
            reviewed_by: ctx.user_id,
            review_notes: req.review_notes,
            expires_at,
        },
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("Access request was already reviewed".to_string()))?;

    let grant = match expires_at {
        Some(expires_at) => Some(
            TemporaryPermission::grant(
                &mut *tx,
                GrantTemporaryPermission {
                    team_id: ctx.team_id,
                    user_id: existing.requester_id,
                    permission: existing.requested_permission.clone(),
                    granted_by: ctx.user_id,
                    reason: existing.reason.clone(),
                    access_request_id: Some(request.id),
                    expires_at,
                },
            )
            .await?,
        ),
        None => None,
    };

    TeamAuditLog::record(
        &mut *tx,
        NewAuditEntry::new(
            ctx.team_id,
            ctx.user_id,
            if approved {
                "access_request.approved"
            } else {
                "access_request.rejected"
            },
        )
        .resource("access_request", request.id)
        .change(
            Some(json!({ "status": existing.status })),
            Some(json!({ "status": request.status, "expires_at": request.expires_at })),
        ),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        team_id = %ctx.team_id,
        request_id = %request.id,
        approved,
        "Access request reviewed"
    );

    Ok(Json(ReviewResponse {
        success: true,
        request,
        grant,
    }))
}
