/// Team context and membership endpoints
///
/// All endpoints require JWT authentication. The active team comes from the
/// signed `active_team` cookie, falling back to the caller's oldest
/// membership.
///
/// # Endpoints
///
/// - `GET /v1/teams` - Teams the caller belongs to
/// - `GET /v1/teams/current` - Active team context
/// - `POST /v1/teams/switch` - Change the active team
/// - `POST /v1/teams/personal` - Create the caller's personal team
/// - `GET /v1/teams/members` - Team roster
/// - `PATCH /v1/teams/members/:id/role` - Change a member's role
/// - `DELETE /v1/teams/members/:id` - Remove a member
/// - `POST /v1/teams/leave` - Leave the active team
/// - `GET /v1/teams/audit` - Recent audit entries

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::team::CurrentTeam,
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rentdesk_shared::{
    auth::{
        authorization::{effective_permissions, Requirement},
        cookies::{active_team_cookie, clear_cookie_header, ACTIVE_TEAM_COOKIE},
        permissions::TeamPermission,
        principal::Principal,
        team_context::TeamContext,
    },
    models::{
        audit_log::{NewAuditEntry, TeamAuditLog},
        team::{personal_team_slug, CreateTeam, SubscriptionTier, Team},
        team_member::{CreateTeamMember, MemberStatus, MembershipWithTeam, TeamMember, TeamRole},
        temporary_permission::TemporaryPermission,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Trial length of a freshly bootstrapped personal team
pub const PERSONAL_TEAM_TRIAL_DAYS: i64 = 14;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

#[derive(Debug, Serialize)]
pub struct UserTeamsResponse {
    pub teams: Vec<MembershipWithTeam>,
    pub active_team_id: Option<Uuid>,
}

/// Lists the caller's active memberships
pub async fn list_user_teams(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<UserTeamsResponse>> {
    let teams = TeamMember::list_active_by_user(&state.db, current.principal.user_id).await?;

    Ok(Json(UserTeamsResponse {
        teams,
        active_team_id: current.resolution.context().map(|ctx| ctx.team_id),
    }))
}

#[derive(Debug, Serialize)]
pub struct CurrentTeamResponse {
    pub team: TeamContext,
    pub permissions: Vec<TeamPermission>,
}

/// Returns the active team and what the caller can do in it
///
/// # Errors
///
/// - `403 no_team`: the caller has no active membership
pub async fn current_team(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<CurrentTeamResponse>> {
    let ctx = current.context()?.clone();
    let now = Utc::now();

    let grants =
        TemporaryPermission::get_active_permissions(&state.db, ctx.team_id, ctx.user_id, now)
            .await?;
    let permissions = effective_permissions(&ctx, &grants, now);

    Ok(Json(CurrentTeamResponse {
        team: ctx,
        permissions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SwitchTeamRequest {
    pub team_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SwitchTeamResponse {
    pub success: bool,
    pub team_id: Uuid,
    /// Tells the client to refresh the whole layout, not just the page
    pub revalidate: &'static str,
}

/// Makes `team_id` the caller's active team
///
/// # Endpoint
///
/// ```text
/// POST /v1/teams/switch
/// Authorization: Bearer <jwt_token>
///
/// { "team_id": "..." }
/// ```
///
/// The response sets the signed `active_team` cookie.
///
/// # Errors
///
/// - `403 Forbidden`: the caller is not an active member of the team
pub async fn switch_team(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<SwitchTeamRequest>,
) -> ApiResult<impl IntoResponse> {
    let membership = TeamMember::find_active(&state.db, req.team_id, principal.user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("You are not a member of this team".to_string()))?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(req.team_id, principal.user_id, "team.switched")
            .resource("team", req.team_id),
    )
    .await?;

    tracing::info!(
        user_id = %principal.user_id,
        team_id = %req.team_id,
        role = membership.role.as_str(),
        "Active team switched"
    );

    let cookie = active_team_cookie(req.team_id, state.cookie_secret(), state.secure_cookies());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SwitchTeamResponse {
            success: true,
            team_id: req.team_id,
            revalidate: "layout",
        }),
    ))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreatePersonalTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PersonalTeamResponse {
    pub success: bool,
    pub created: bool,
    pub team: Team,
}

/// Bootstraps the caller's personal team
///
/// The team (14-day trial) and the owner membership are created in one
/// transaction. Calling it again returns the existing team with
/// `created: false`.
pub async fn create_personal_team(
    State(state): State<AppState>,
    principal: Principal,
    body: Option<Json<CreatePersonalTeamRequest>>,
) -> ApiResult<impl IntoResponse> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;

    let slug = personal_team_slug(principal.user_id);

    if let Some(team) = Team::find_by_slug(&state.db, &slug).await? {
        if TeamMember::find_active(&state.db, team.id, principal.user_id)
            .await?
            .is_none()
        {
            return Err(ApiError::Conflict(
                "Personal team exists but you are no longer a member".to_string(),
            ));
        }

        let cookie = active_team_cookie(team.id, state.cookie_secret(), state.secure_cookies());
        return Ok((
            [(header::SET_COOKIE, cookie)],
            Json(PersonalTeamResponse {
                success: true,
                created: false,
                team,
            }),
        ));
    }

    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Mon espace".to_string());

    let mut tx = state.db.begin().await?;

    let team = Team::create(
        &mut *tx,
        CreateTeam {
            name,
            slug,
            subscription_tier: SubscriptionTier::Starter,
            trial_days: PERSONAL_TEAM_TRIAL_DAYS,
            created_by: Some(principal.user_id),
        },
    )
    .await?;

    TeamMember::create(
        &mut *tx,
        CreateTeamMember {
            team_id: team.id,
            user_id: principal.user_id,
            role: TeamRole::Owner,
            status: MemberStatus::Active,
            invited_by: None,
        },
    )
    .await?;

    TeamAuditLog::record(
        &mut *tx,
        NewAuditEntry::new(team.id, principal.user_id, "team.created").resource("team", team.id),
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %principal.user_id, team_id = %team.id, "Personal team created");

    let cookie = active_team_cookie(team.id, state.cookie_secret(), state.secure_cookies());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(PersonalTeamResponse {
            success: true,
            created: true,
            team,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<TeamMember>,
}

/// Lists the roster of the active team
///
/// Requires `team.members.view`.
pub async fn list_members(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<MembersResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::TeamMembersView))
        .await?;

    let members = TeamMember::list_by_team(&state.db, ctx.team_id).await?;

    Ok(Json(MembersResponse { members }))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: TeamRole,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub success: bool,
    pub member: TeamMember,
}

/// Loads a member of the caller's team that the caller may act on
async fn editable_member(
    state: &AppState,
    ctx: &TeamContext,
    member_id: Uuid,
) -> ApiResult<TeamMember> {
    let member = TeamMember::find_in_team(&state.db, ctx.team_id, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if member.role == TeamRole::Owner {
        return Err(ApiError::Forbidden(
            "The team owner cannot be modified".to_string(),
        ));
    }

    if member.user_id == ctx.user_id {
        return Err(ApiError::Forbidden(
            "You cannot modify your own membership".to_string(),
        ));
    }

    Ok(member)
}

/// Changes a member's role
///
/// Requires `team.members.edit_role`. The owner's role is fixed and no one
/// can be promoted to owner.
///
/// # Errors
///
/// - `400 Bad Request`: `role` is `owner`
/// - `403 Forbidden`: target is the owner or the caller
/// - `404 Not Found`: member not in the active team
pub async fn change_member_role(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(member_id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<MemberResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::TeamMembersEditRole))
        .await?;

    if !req.role.is_assignable() {
        return Err(ApiError::BadRequest(
            "The owner role cannot be assigned".to_string(),
        ));
    }

    let target = editable_member(&state, &ctx, member_id).await?;

    let member = TeamMember::update_role(&state.db, ctx.team_id, member_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "member.role_changed")
            .resource("team_member", member_id)
            .change(
                Some(json!({ "role": target.role })),
                Some(json!({ "role": member.role })),
            ),
    )
    .await?;

    tracing::info!(
        team_id = %ctx.team_id,
        member_id = %member_id,
        old_role = target.role.as_str(),
        new_role = member.role.as_str(),
        "Member role changed"
    );

    Ok(Json(MemberResponse {
        success: true,
        member,
    }))
}

/// Removes a member from the active team
///
/// Requires `team.members.remove`. The row is kept with status `removed`.
pub async fn remove_member(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<MemberResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::TeamMembersRemove))
        .await?;

    editable_member(&state, &ctx, member_id).await?;

    let member = TeamMember::remove(&state.db, ctx.team_id, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "member.removed")
            .resource("team_member", member_id)
            .change(Some(json!({ "user_id": member.user_id, "role": member.role })), None),
    )
    .await?;

    tracing::info!(team_id = %ctx.team_id, member_id = %member_id, "Member removed");

    Ok(Json(MemberResponse {
        success: true,
        member,
    }))
}

#[derive(Debug, Serialize)]
pub struct LeaveTeamResponse {
    pub success: bool,
    pub team_id: Uuid,
    pub revalidate: &'static str,
}

/// Leaves the active team and clears the `active_team` cookie
///
/// # Errors
///
/// - `403 Forbidden`: the owner cannot leave their team
pub async fn leave_team(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<impl IntoResponse> {
    let ctx = current.context()?;

    if ctx.role == TeamRole::Owner {
        return Err(ApiError::Forbidden(
            "The owner cannot leave the team".to_string(),
        ));
    }

    if !TeamMember::leave(&state.db, ctx.team_id, ctx.user_id).await? {
        return Err(ApiError::NotFound("Membership not found".to_string()));
    }

    TeamAuditLog::record(
        &state.db,
        NewAuditEntry::new(ctx.team_id, ctx.user_id, "member.left")
            .resource("team_member", ctx.member_id),
    )
    .await?;

    tracing::info!(team_id = %ctx.team_id, user_id = %ctx.user_id, "Member left team");

    Ok((
        [(
            header::SET_COOKIE,
            clear_cookie_header(ACTIVE_TEAM_COOKIE, state.secure_cookies()),
        )],
        Json(LeaveTeamResponse {
            success: true,
            team_id: ctx.team_id,
            revalidate: "layout",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<TeamAuditLog>,
}

/// Recent audit entries of the active team, newest first
///
/// Requires `team.audit.view`. `limit` defaults to 50, capped at 200.
pub async fn list_audit_log(
    State(state): State<AppState>,
    current: CurrentTeam,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditLogResponse>> {
    let ctx = current
        .authorize(&state, Requirement::Permission(TeamPermission::TeamAuditView))
        .await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);

    let entries = TeamAuditLog::list_by_team(&state.db, ctx.team_id, limit).await?;

    Ok(Json(AuditLogResponse { entries }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_team_request_validation() {
        assert!(CreatePersonalTeamRequest::default().validate().is_ok());

        let too_long = CreatePersonalTeamRequest {
            name: Some("x".repeat(101)),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_change_role_request_rejects_unknown_role() {
        let parsed: Result<ChangeRoleRequest, _> =
            serde_json::from_str(r#"{ "role": "superadmin" }"#);
        assert!(parsed.is_err());

        let parsed: ChangeRoleRequest = serde_json::from_str(r#"{ "role": "agent" }"#).unwrap();
        assert_eq!(parsed.role, TeamRole::Agent);
    }

    #[test]
    fn test_switch_response_shape() {
        let team_id = Uuid::new_v4();
        let body = serde_json::to_value(SwitchTeamResponse {
            success: true,
            team_id,
            revalidate: "layout",
        })
        .unwrap();

        assert_eq!(body["revalidate"], "layout");
        assert_eq!(body["team_id"], team_id.to_string());
    }
}
