/// Onboarding activation endpoints
///
/// # Endpoints
///
/// - `GET /v1/activation` - Stage and milestones of the active team
/// - `POST /v1/activation/complete` - Mark onboarding done (stage 4 only)
/// - `POST /v1/activation/milestones` - Record a milestone (owner, manager)
/// - `GET /v1/activation/modules/:module` - Whether a module is unlocked

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::team::{CurrentTeam, TEAM_ADMINS},
};
use axum::{
    extract::{Path, State},
    Json,
};
use rentdesk_shared::activation::{
    check_module as check_module_stage, complete_activation, get_activation_status,
    record_milestone, ActivationStage, ActivationStatus, GatedModule, Milestone,
};
use rentdesk_shared::models::audit_log::{NewAuditEntry, TeamAuditLog};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returns the active team's activation status
pub async fn get_status(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<ActivationStatus>> {
    let ctx = current.context()?;
    let status = get_activation_status(&state.db, ctx.team_id).await?;

    Ok(Json(status))
}

/// Marks onboarding as completed
///
/// # Errors
///
/// - `403 Forbidden`: caller is not owner or manager
/// - `409 Conflict`: team has not reached stage 4
pub async fn complete(
    State(state): State<AppState>,
    current: CurrentTeam,
) -> ApiResult<Json<ActivationStatus>> {
    let ctx = current.require_role(TEAM_ADMINS)?;

    let before = get_activation_status(&state.db, ctx.team_id).await?;
    let status = complete_activation(&state.db, ctx.team_id).await?;

    if !before.is_completed() {
        TeamAuditLog::record(
            &state.db,
            NewAuditEntry::new(ctx.team_id, ctx.user_id, "activation.completed")
                .resource("team", ctx.team_id),
        )
        .await?;
    }

    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct RecordMilestoneRequest {
    pub milestone: Milestone,
    /// Entity that triggered the milestone, e.g. the first property
    pub entity_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RecordMilestoneResponse {
    /// False when the milestone was already recorded earlier
    pub recorded: bool,
    pub status: ActivationStatus,
}

/// Records an activation milestone
///
/// The first timestamp sticks; repeated calls report `recorded: false`.
pub async fn record(
    State(state): State<AppState>,
    current: CurrentTeam,
    Json(req): Json<RecordMilestoneRequest>,
) -> ApiResult<Json<RecordMilestoneResponse>> {
    let ctx = current.require_role(TEAM_ADMINS)?;

    let recorded = record_milestone(&state.db, ctx.team_id, req.milestone, req.entity_id).await?;
    let status = get_activation_status(&state.db, ctx.team_id).await?;

    Ok(Json(RecordMilestoneResponse { recorded, status }))
}

#[derive(Debug, Serialize)]
pub struct ModuleAccessResponse {
    pub module: GatedModule,
    pub unlocked: bool,
    pub current_stage: ActivationStage,
    pub required_stage: ActivationStage,
}

/// Parses a module name from the path
pub fn parse_module(raw: &str) -> ApiResult<GatedModule> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| ApiError::NotFound(format!("Unknown module: {raw}")))
}

/// Tells the UI whether a module is unlocked for the active team
pub async fn check_module(
    State(state): State<AppState>,
    current: CurrentTeam,
    Path(module): Path<String>,
) -> ApiResult<Json<ModuleAccessResponse>> {
    let ctx = current.context()?;
    let module = parse_module(&module)?;

    let status = get_activation_status(&state.db, ctx.team_id).await?;

    Ok(Json(ModuleAccessResponse {
        module,
        unlocked: check_module_stage(status.stage, module).is_ok(),
        current_stage: status.stage,
        required_stage: module.required_stage(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_module() {
        assert_eq!(parse_module("accounting").unwrap(), GatedModule::Accounting);
        assert_eq!(parse_module("inventory").unwrap(), GatedModule::Inventory);
        assert!(matches!(parse_module("payroll"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_milestone_request_parsing() {
        let req: RecordMilestoneRequest =
            serde_json::from_str(r#"{ "milestone": "first_property", "entity_id": null }"#)
                .unwrap();
        assert_eq!(req.milestone, Milestone::FirstProperty);
        assert!(req.entity_id.is_none());
    }
}
