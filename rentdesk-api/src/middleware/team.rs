/// Active team extractor
///
/// Resolves the team a request acts on from the authenticated principal and
/// the signed `active_team` cookie. Routes using it must sit behind the JWT
/// layer, which inserts the [`Principal`].
///
/// # Example
///
/// ```no_run
/// use rentdesk_api::error::ApiResult;
/// use rentdesk_api::middleware::team::CurrentTeam;
/// use axum::Json;
///
/// async fn handler(current: CurrentTeam) -> ApiResult<Json<String>> {
///     let ctx = current.context()?;
///     Ok(Json(ctx.team_name.clone()))
/// }
/// ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use rentdesk_shared::auth::authorization::{authorize, require_role, Requirement};
use rentdesk_shared::auth::cookies::read_active_team;
use rentdesk_shared::auth::principal::Principal;
use rentdesk_shared::auth::team_context::{resolve_team_context, TeamContext, TeamResolution};
use rentdesk_shared::models::team_member::TeamRole;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

/// Owner and managers
pub const TEAM_ADMINS: &[TeamRole] = &[TeamRole::Owner, TeamRole::Manager];

/// The caller and their resolved team
#[derive(Debug, Clone)]
pub struct CurrentTeam {
    pub principal: Principal,
    pub resolution: TeamResolution,
}

impl CurrentTeam {
    /// The resolved context, or [`ApiError::NoTeam`]
    pub fn context(&self) -> ApiResult<&TeamContext> {
        self.resolution.context().ok_or(ApiError::NoTeam)
    }

    /// Runs the authorization guard for this request
    pub async fn authorize(
        &self,
        state: &AppState,
        requirement: Requirement,
    ) -> ApiResult<TeamContext> {
        Ok(authorize(&state.db, &self.resolution, requirement, Utc::now()).await?)
    }

    pub fn require_role(&self, allowed: &'static [TeamRole]) -> ApiResult<TeamContext> {
        Ok(require_role(&self.resolution, allowed)?)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentTeam {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        let preferred = read_active_team(&parts.headers, state.cookie_secret());

        let resolution = resolve_team_context(&state.db, principal.user_id, preferred).await?;

        Ok(Self {
            principal,
            resolution,
        })
    }
}
