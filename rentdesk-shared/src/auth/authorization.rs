/// Authorization guard
///
/// Every protected action calls the guard with the resolved team context and
/// a [`Requirement`]. The guard answers with a tagged [`Access`] value so the
/// caller can tell "no team at all" apart from "wrong role" and "missing
/// permission" when choosing what to show.
///
/// # Evaluation order for permission requirements
///
/// 1. No resolved team: denied with [`DenyReason::NoTeam`]
/// 2. Owners hold every permission
/// 3. A per-member override in `custom_permissions` replaces the role default
/// 4. An active temporary grant for the key allows regardless of the above
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use rentdesk_shared::auth::authorization::{authorize, Requirement};
/// use rentdesk_shared::auth::permissions::TeamPermission;
/// use rentdesk_shared::auth::team_context::resolve_team_context;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let resolution = resolve_team_context(&pool, user_id, None).await?;
/// let ctx = authorize(
///     &pool,
///     &resolution,
///     Requirement::Permission(TeamPermission::PaymentsConfirm),
///     Utc::now(),
/// )
/// .await?;
/// println!("acting in team {}", ctx.team_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use super::permissions::TeamPermission;
use super::team_context::{TeamContext, TeamResolution};
use crate::models::team_member::TeamRole;
use crate::models::temporary_permission::TemporaryPermission;

/// What an action demands of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Caller's role must be one of these
    Roles(&'static [TeamRole]),
    /// Caller must effectively hold this permission
    Permission(TeamPermission),
}

/// Why access was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    NoTeam,
    InsufficientRole {
        required: Vec<TeamRole>,
        actual: TeamRole,
    },
    MissingPermission {
        permission: TeamPermission,
        role: TeamRole,
    },
}

/// Guard verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed { role: TeamRole },
    Denied { reason: DenyReason },
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed { .. })
    }
}

/// Authorization errors
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("No active team")]
    NoTeam,

    #[error("Insufficient role: requires one of {required:?}, has {actual:?}")]
    InsufficientRole {
        required: Vec<TeamRole>,
        actual: TeamRole,
    },

    #[error("Missing permission: {}", permission.key())]
    MissingPermission {
        permission: TeamPermission,
        role: TeamRole,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<DenyReason> for AuthzError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NoTeam => AuthzError::NoTeam,
            DenyReason::InsufficientRole { required, actual } => {
                AuthzError::InsufficientRole { required, actual }
            }
            DenyReason::MissingPermission { permission, role } => {
                AuthzError::MissingPermission { permission, role }
            }
        }
    }
}

/// Whether the member holds a permission through role or override alone
pub fn holds_permission(ctx: &TeamContext, permission: TeamPermission) -> bool {
    if ctx.role == TeamRole::Owner {
        return true;
    }

    ctx.custom_permissions
        .get(permission.key())
        .copied()
        .unwrap_or_else(|| permission.is_default_for(ctx.role))
}

/// Evaluates a requirement against a resolved team
///
/// `grants` are the caller's temporary grants; only those active at `now`
/// are considered.
pub fn evaluate(
    resolution: &TeamResolution,
    requirement: Requirement,
    grants: &[TemporaryPermission],
    now: DateTime<Utc>,
) -> Access {
    let ctx = match resolution {
        TeamResolution::Resolved(ctx) => ctx,
        TeamResolution::NoTeam => {
            return Access::Denied {
                reason: DenyReason::NoTeam,
            }
        }
    };

    match requirement {
        Requirement::Roles(allowed) => {
            if allowed.contains(&ctx.role) {
                Access::Allowed { role: ctx.role }
            } else {
                Access::Denied {
                    reason: DenyReason::InsufficientRole {
                        required: allowed.to_vec(),
                        actual: ctx.role,
                    },
                }
            }
        }
        Requirement::Permission(permission) => {
            let granted = grants.iter().any(|g| {
                g.team_id == ctx.team_id
                    && g.user_id == ctx.user_id
                    && g.permission == permission.key()
                    && g.is_active_at(now)
            });

            if granted || holds_permission(ctx, permission) {
                Access::Allowed { role: ctx.role }
            } else {
                Access::Denied {
                    reason: DenyReason::MissingPermission {
                        permission,
                        role: ctx.role,
                    },
                }
            }
        }
    }
}

/// Checks a requirement, loading temporary grants only when role and
/// overrides are not enough
///
/// # Returns
///
/// The team context the caller is allowed to act in
pub async fn authorize(
    pool: &PgPool,
    resolution: &TeamResolution,
    requirement: Requirement,
    now: DateTime<Utc>,
) -> Result<TeamContext, AuthzError> {
    let ctx = resolution.context().ok_or(AuthzError::NoTeam)?;

    let access = match evaluate(resolution, requirement, &[], now) {
        Access::Denied {
            reason: DenyReason::MissingPermission { .. },
        } => {
            let grants =
                TemporaryPermission::get_active_permissions(pool, ctx.team_id, ctx.user_id, now)
                    .await?;
            evaluate(resolution, requirement, &grants, now)
        }
        access => access,
    };

    match access {
        Access::Allowed { .. } => Ok(ctx.clone()),
        Access::Denied { reason } => {
            tracing::debug!(
                user_id = %ctx.user_id,
                team_id = %ctx.team_id,
                ?reason,
                "Access denied"
            );
            Err(reason.into())
        }
    }
}

/// Role-only check; needs no database access
pub fn require_role(
    resolution: &TeamResolution,
    allowed: &'static [TeamRole],
) -> Result<TeamContext, AuthzError> {
    match evaluate(resolution, Requirement::Roles(allowed), &[], Utc::now()) {
        Access::Allowed { .. } => resolution.context().cloned().ok_or(AuthzError::NoTeam),
        Access::Denied { reason } => Err(reason.into()),
    }
}

/// Every permission the member effectively holds at `now`
pub fn effective_permissions(
    ctx: &TeamContext,
    grants: &[TemporaryPermission],
    now: DateTime<Utc>,
) -> Vec<TeamPermission> {
    TeamPermission::ALL
        .into_iter()
        .filter(|p| {
            holds_permission(ctx, *p)
                || grants
                    .iter()
                    .any(|g| g.permission == p.key() && g.is_active_at(now))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::team::{SubscriptionStatus, SubscriptionTier};
    use chrono::Duration;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn context(role: TeamRole) -> TeamContext {
        TeamContext {
            user_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            role,
            team_name: "Immobilière Thiès".to_string(),
            team_slug: "immo-thies".to_string(),
            subscription_status: SubscriptionStatus::Active,
            subscription_tier: SubscriptionTier::Pro,
            subscription_trial_ends_at: None,
            custom_permissions: HashMap::new(),
        }
    }

    fn grant(ctx: &TeamContext, permission: TeamPermission, expires_at: DateTime<Utc>) -> TemporaryPermission {
        TemporaryPermission {
            id: Uuid::new_v4(),
            team_id: ctx.team_id,
            user_id: ctx.user_id,
            permission: permission.key().to_string(),
            granted_by: None,
            reason: None,
            access_request_id: None,
            expires_at,
            created_at: expires_at - Duration::hours(24),
        }
    }

    const MANAGERS: &[TeamRole] = &[TeamRole::Owner, TeamRole::Manager];

    #[test]
    fn test_no_team_is_denied_with_no_team() {
        let access = evaluate(
            &TeamResolution::NoTeam,
            Requirement::Roles(MANAGERS),
            &[],
            Utc::now(),
        );

        assert_eq!(
            access,
            Access::Denied {
                reason: DenyReason::NoTeam
            }
        );
    }

    #[test]
    fn test_role_requirement() {
        let manager = TeamResolution::Resolved(context(TeamRole::Manager));
        let agent = TeamResolution::Resolved(context(TeamRole::Agent));

        assert_eq!(
            evaluate(&manager, Requirement::Roles(MANAGERS), &[], Utc::now()),
            Access::Allowed {
                role: TeamRole::Manager
            }
        );
        assert_eq!(
            evaluate(&agent, Requirement::Roles(MANAGERS), &[], Utc::now()),
            Access::Denied {
                reason: DenyReason::InsufficientRole {
                    required: MANAGERS.to_vec(),
                    actual: TeamRole::Agent,
                }
            }
        );
    }

    #[test]
    fn test_permission_from_role_default() {
        let accountant = TeamResolution::Resolved(context(TeamRole::Accountant));
        let now = Utc::now();

        assert!(evaluate(
            &accountant,
            Requirement::Permission(TeamPermission::PaymentsConfirm),
            &[],
            now
        )
        .is_allowed());
        assert_eq!(
            evaluate(
                &accountant,
                Requirement::Permission(TeamPermission::PropertiesCreate),
                &[],
                now
            ),
            Access::Denied {
                reason: DenyReason::MissingPermission {
                    permission: TeamPermission::PropertiesCreate,
                    role: TeamRole::Accountant,
                }
            }
        );
    }

    #[test]
    fn test_custom_override_replaces_default() {
        let mut ctx = context(TeamRole::Agent);
        ctx.custom_permissions.insert("reports.view".to_string(), true);
        ctx.custom_permissions.insert("properties.create".to_string(), false);
        let resolution = TeamResolution::Resolved(ctx);
        let now = Utc::now();

        assert!(evaluate(&resolution, Requirement::Permission(TeamPermission::ReportsView), &[], now).is_allowed());
        assert!(!evaluate(&resolution, Requirement::Permission(TeamPermission::PropertiesCreate), &[], now).is_allowed());
    }

    #[test]
    fn test_owner_ignores_overrides() {
        let mut ctx = context(TeamRole::Owner);
        ctx.custom_permissions.insert("payments.void".to_string(), false);

        assert!(holds_permission(&ctx, TeamPermission::PaymentsVoid));
    }

    #[test]
    fn test_active_grant_allows() {
        let ctx = context(TeamRole::Agent);
        let now = Utc::now();
        let grants = vec![grant(&ctx, TeamPermission::PaymentsVoid, now + Duration::hours(2))];
        let resolution = TeamResolution::Resolved(ctx);

        assert!(evaluate(&resolution, Requirement::Permission(TeamPermission::PaymentsVoid), &grants, now).is_allowed());
    }

    #[test]
    fn test_expired_grant_ignored() {
        let ctx = context(TeamRole::Agent);
        let now = Utc::now();
        let grants = vec![grant(&ctx, TeamPermission::PaymentsVoid, now - Duration::minutes(1))];
        let resolution = TeamResolution::Resolved(ctx);

        assert!(!evaluate(&resolution, Requirement::Permission(TeamPermission::PaymentsVoid), &grants, now).is_allowed());
    }

    #[test]
    fn test_grant_from_other_team_ignored() {
        let ctx = context(TeamRole::Agent);
        let now = Utc::now();
        let mut foreign = grant(&ctx, TeamPermission::PaymentsVoid, now + Duration::hours(2));
        foreign.team_id = Uuid::new_v4();
        let resolution = TeamResolution::Resolved(ctx);

        assert!(!evaluate(&resolution, Requirement::Permission(TeamPermission::PaymentsVoid), &[foreign], now).is_allowed());
    }

    #[test]
    fn test_grants_do_not_satisfy_role_requirements() {
        let ctx = context(TeamRole::Agent);
        let now = Utc::now();
        let grants = vec![grant(&ctx, TeamPermission::TeamMembersEditRole, now + Duration::hours(2))];
        let resolution = TeamResolution::Resolved(ctx);

        assert!(!evaluate(&resolution, Requirement::Roles(MANAGERS), &grants, now).is_allowed());
    }

    #[test]
    fn test_require_role_returns_context() {
        let resolution = TeamResolution::Resolved(context(TeamRole::Manager));
        let ctx = require_role(&resolution, MANAGERS).expect("allowed");
        assert_eq!(ctx.role, TeamRole::Manager);

        assert!(matches!(
            require_role(&TeamResolution::NoTeam, MANAGERS),
            Err(AuthzError::NoTeam)
        ));
    }

    #[test]
    fn test_effective_permissions_include_grants() {
        let ctx = context(TeamRole::Agent);
        let now = Utc::now();
        let grants = vec![grant(&ctx, TeamPermission::ReportsExport, now + Duration::hours(1))];

        let effective = effective_permissions(&ctx, &grants, now);

        assert!(effective.contains(&TeamPermission::ReportsExport));
        assert!(effective.contains(&TeamPermission::PropertiesView));
        assert!(!effective.contains(&TeamPermission::PaymentsVoid));
    }
}
