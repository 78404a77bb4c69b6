/// Active team resolution
///
/// A user may belong to several teams. For each request the active team is:
///
/// 1. the team named by the signed `active_team` cookie, if the user still
///    holds an active membership there;
/// 2. otherwise the team of the user's oldest active membership;
/// 3. otherwise nothing: the request has no team context.
///
/// A cookie pointing at a team the user has left is ignored, never trusted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::team::{SubscriptionStatus, SubscriptionTier};
use crate::models::team_member::{MembershipWithTeam, TeamMember, TeamRole};

/// The team a request acts on, and the caller's standing in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamContext {
    pub user_id: Uuid,
    pub team_id: Uuid,
    pub member_id: Uuid,
    pub role: TeamRole,
    pub team_name: String,
    pub team_slug: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_tier: SubscriptionTier,
    pub subscription_trial_ends_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub custom_permissions: HashMap<String, bool>,
}

impl TeamContext {
    fn from_membership(user_id: Uuid, membership: MembershipWithTeam) -> Self {
        Self {
            user_id,
            team_id: membership.team_id,
            member_id: membership.member_id,
            role: membership.role,
            team_name: membership.team_name,
            team_slug: membership.team_slug,
            subscription_status: membership.subscription_status,
            subscription_tier: membership.subscription_tier,
            subscription_trial_ends_at: membership.subscription_trial_ends_at,
            custom_permissions: membership.custom_permissions.0,
        }
    }
}

/// Outcome of resolving the active team
#[derive(Debug, Clone, PartialEq)]
pub enum TeamResolution {
    Resolved(TeamContext),
    NoTeam,
}

impl TeamResolution {
    pub fn context(&self) -> Option<&TeamContext> {
        match self {
            TeamResolution::Resolved(ctx) => Some(ctx),
            TeamResolution::NoTeam => None,
        }
    }
}

/// Picks the active team from a user's active memberships
///
/// `memberships` must be ordered oldest first, as returned by
/// [`TeamMember::list_active_by_user`].
pub fn pick_team(
    user_id: Uuid,
    memberships: Vec<MembershipWithTeam>,
    preferred_team: Option<Uuid>,
) -> TeamResolution {
    let preferred_index = preferred_team
        .and_then(|team_id| memberships.iter().position(|m| m.team_id == team_id));

    match preferred_index {
        Some(index) => {
            let membership = memberships.into_iter().nth(index);
            resolution_from(user_id, membership)
        }
        None => {
            if let Some(team_id) = preferred_team {
                tracing::debug!(%user_id, %team_id, "Ignoring active team without membership");
            }
            resolution_from(user_id, memberships.into_iter().next())
        }
    }
}

fn resolution_from(user_id: Uuid, membership: Option<MembershipWithTeam>) -> TeamResolution {
    match membership {
        Some(m) => TeamResolution::Resolved(TeamContext::from_membership(user_id, m)),
        None => TeamResolution::NoTeam,
    }
}

/// Loads the user's memberships and resolves the active team
pub async fn resolve_team_context(
    pool: &PgPool,
    user_id: Uuid,
    preferred_team: Option<Uuid>,
) -> Result<TeamResolution, sqlx::Error> {
    let memberships = TeamMember::list_active_by_user(pool, user_id).await?;
    Ok(pick_team(user_id, memberships, preferred_team))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::types::Json;

    fn membership(team_id: Uuid, role: TeamRole, joined_days_ago: i64) -> MembershipWithTeam {
        MembershipWithTeam {
            team_id,
            member_id: Uuid::new_v4(),
            role,
            custom_permissions: Json(HashMap::new()),
            team_name: format!("Team {team_id}"),
            team_slug: format!("team-{}", &team_id.to_string()[..8]),
            subscription_status: SubscriptionStatus::Active,
            subscription_tier: SubscriptionTier::Pro,
            subscription_trial_ends_at: None,
            joined_at: Some(Utc::now() - Duration::days(joined_days_ago)),
        }
    }

    #[test]
    fn test_preferred_team_wins_when_member() {
        let user_id = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let memberships = vec![
            membership(first, TeamRole::Owner, 30),
            membership(second, TeamRole::Agent, 2),
        ];

        let resolution = pick_team(user_id, memberships, Some(second));
        let ctx = resolution.context().expect("resolved");

        assert_eq!(ctx.team_id, second);
        assert_eq!(ctx.role, TeamRole::Agent);
        assert_eq!(ctx.user_id, user_id);
    }

    #[test]
    fn test_stale_preference_falls_back_to_oldest() {
        let user_id = Uuid::new_v4();
        let oldest = Uuid::new_v4();
        let memberships = vec![
            membership(oldest, TeamRole::Manager, 90),
            membership(Uuid::new_v4(), TeamRole::Owner, 1),
        ];

        let resolution = pick_team(user_id, memberships, Some(Uuid::new_v4()));

        assert_eq!(resolution.context().map(|c| c.team_id), Some(oldest));
    }

    #[test]
    fn test_no_preference_uses_oldest() {
        let oldest = Uuid::new_v4();
        let memberships = vec![
            membership(oldest, TeamRole::Accountant, 10),
            membership(Uuid::new_v4(), TeamRole::Owner, 5),
        ];

        let resolution = pick_team(Uuid::new_v4(), memberships, None);

        assert_eq!(resolution.context().map(|c| c.role), Some(TeamRole::Accountant));
    }

    #[test]
    fn test_no_memberships_is_no_team() {
        assert_eq!(
            pick_team(Uuid::new_v4(), Vec::new(), Some(Uuid::new_v4())),
            TeamResolution::NoTeam
        );
    }
}
