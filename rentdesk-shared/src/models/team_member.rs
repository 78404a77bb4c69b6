/// Team membership model and database operations
///
/// Memberships link users to teams with a role and a status. A user may
/// belong to many teams; only `active` memberships confer access. Members are
/// never hard-deleted: removal and departure are status transitions.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE team_role AS ENUM ('owner', 'manager', 'accountant', 'agent');
/// CREATE TYPE member_status AS ENUM ('active', 'invited', 'suspended', 'removed', 'left');
///
/// CREATE TABLE team_members (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id),
///     user_id UUID NOT NULL,
///     role team_role NOT NULL DEFAULT 'agent',
///     status member_status NOT NULL DEFAULT 'invited',
///     custom_permissions JSONB NOT NULL DEFAULT '{}',
///     invited_by UUID,
///     joined_at TIMESTAMPTZ,
///     removed_at TIMESTAMPTZ,
///     left_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (team_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **owner**: Created the team; cannot be demoted, removed or leave
/// - **manager**: Runs day-to-day operations and the team roster
/// - **accountant**: Payments, receipts and financial reports
/// - **agent**: Field work on properties, leases and tenants
///
/// # Example
///
/// ```no_run
/// use rentdesk_shared::models::team_member::{TeamMember, TeamRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, team_id: Uuid, member_id: Uuid) -> Result<(), sqlx::Error> {
/// if let Some(member) = TeamMember::update_role(&pool, team_id, member_id, TeamRole::Accountant).await? {
///     println!("{} is now {}", member.user_id, member.role.as_str());
/// }
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::team::{SubscriptionStatus, SubscriptionTier};

/// Roles a member can hold within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Manager,
    Accountant,
    Agent,
}

impl TeamRole {
    pub const ALL: [TeamRole; 4] = [
        TeamRole::Owner,
        TeamRole::Manager,
        TeamRole::Accountant,
        TeamRole::Agent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Manager => "manager",
            TeamRole::Accountant => "accountant",
            TeamRole::Agent => "agent",
        }
    }

    /// Parses a role from its wire name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(TeamRole::Owner),
            "manager" => Some(TeamRole::Manager),
            "accountant" => Some(TeamRole::Accountant),
            "agent" => Some(TeamRole::Agent),
            _ => None,
        }
    }

    /// Ownership is fixed at team creation and never handed out by role edits.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, TeamRole::Owner)
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Active,
    Invited,
    Suspended,
    Removed,
    Left,
}

/// A user's membership in a team
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub status: MemberStatus,
    /// Per-member overrides keyed by permission key
    pub custom_permissions: Json<HashMap<String, bool>>,
    pub invited_by: Option<Uuid>,
    pub joined_at: Option<DateTime<Utc>>,
    pub removed_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone)]
pub struct CreateTeamMember {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: TeamRole,
    pub status: MemberStatus,
    pub invited_by: Option<Uuid>,
}

/// Active membership joined with the team it grants access to
///
/// Rows come back ordered oldest membership first, which is the fallback
/// order used when resolving the active team.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MembershipWithTeam {
    pub team_id: Uuid,
    pub member_id: Uuid,
    pub role: TeamRole,
    pub custom_permissions: Json<HashMap<String, bool>>,
    pub team_name: String,
    pub team_slug: String,
    pub subscription_status: SubscriptionStatus,
    pub subscription_tier: SubscriptionTier,
    pub subscription_trial_ends_at: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
}

const MEMBER_COLUMNS: &str = r#"
    id, team_id, user_id, role, status, custom_permissions, invited_by,
    joined_at, removed_at, left_at, created_at, updated_at
"#;

impl TeamMember {
    /// Looks up a per-member override for a permission key
    pub fn custom_permission(&self, key: &str) -> Option<bool> {
        self.custom_permissions.get(key).copied()
    }

    /// Creates a membership
    ///
    /// `joined_at` is set when the membership starts out active.
    ///
    /// # Errors
    ///
    /// Returns an error if the user already has a membership row in the team
    /// (unique constraint) or the database fails.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateTeamMember,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO team_members (team_id, user_id, role, status, invited_by, joined_at)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $4 = 'active'::member_status THEN NOW() END)
            RETURNING {MEMBER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(data.team_id)
            .bind(data.user_id)
            .bind(data.role)
            .bind(data.status)
            .bind(data.invited_by)
            .fetch_one(executor)
            .await
    }

    /// Finds the active membership of a user in a team
    pub async fn find_active(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MEMBER_COLUMNS}
            FROM team_members
            WHERE team_id = $1 AND user_id = $2 AND status = 'active'
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a membership by its ID, scoped to a team
    pub async fn find_in_team(
        pool: &PgPool,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = $1 AND id = $2"
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a user's active memberships with team details, oldest first
    pub async fn list_active_by_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<MembershipWithTeam>, sqlx::Error> {
        sqlx::query_as::<_, MembershipWithTeam>(
            r#"
            SELECT
                tm.team_id,
                tm.id AS member_id,
                tm.role,
                tm.custom_permissions,
                t.name AS team_name,
                t.slug AS team_slug,
                t.subscription_status,
                t.subscription_tier,
                t.subscription_trial_ends_at,
                tm.joined_at
            FROM team_members tm
            JOIN teams t ON t.id = tm.team_id
            WHERE tm.user_id = $1
              AND tm.status = 'active'
              AND t.status <> 'archived'
            ORDER BY COALESCE(tm.joined_at, tm.created_at) ASC, tm.created_at ASC, tm.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Lists the roster of a team
    ///
    /// Removed and departed members are excluded.
    pub async fn list_by_team(pool: &PgPool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {MEMBER_COLUMNS}
            FROM team_members
            WHERE team_id = $1 AND status NOT IN ('removed', 'left')
            ORDER BY created_at ASC
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .fetch_all(pool)
            .await
    }

    /// Changes a member's role
    ///
    /// The owner row is never touched: the `role <> 'owner'` filter makes
    /// the update a no-op for it.
    ///
    /// # Returns
    ///
    /// The updated membership, or `None` if no editable member matched
    pub async fn update_role(
        pool: &PgPool,
        team_id: Uuid,
        member_id: Uuid,
        role: TeamRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE team_members
            SET role = $3, updated_at = NOW()
            WHERE team_id = $1 AND id = $2 AND role <> 'owner'
            RETURNING {MEMBER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(member_id)
            .bind(role)
            .fetch_optional(pool)
            .await
    }

    /// Soft-removes a member from a team
    ///
    /// # Returns
    ///
    /// The updated membership, or `None` if no removable member matched
    pub async fn remove(
        pool: &PgPool,
        team_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE team_members
            SET status = 'removed', removed_at = NOW(), updated_at = NOW()
            WHERE team_id = $1 AND id = $2 AND role <> 'owner' AND status NOT IN ('removed', 'left')
            RETURNING {MEMBER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TeamMember>(&query)
            .bind(team_id)
            .bind(member_id)
            .fetch_optional(pool)
            .await
    }

    /// Marks the caller's own membership as `left`
    ///
    /// # Returns
    ///
    /// True if an active, non-owner membership was updated
    pub async fn leave(pool: &PgPool, team_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE team_members
            SET status = 'left', left_at = NOW(), updated_at = NOW()
            WHERE team_id = $1 AND user_id = $2 AND status = 'active' AND role <> 'owner'
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_as_str_round_trips() {
        for role in TeamRole::ALL {
            assert_eq!(TeamRole::from_str(role.as_str()), Some(role));
        }
        assert_eq!(TeamRole::from_str("admin"), None);
    }

    #[test]
    fn test_owner_is_not_assignable() {
        assert!(!TeamRole::Owner.is_assignable());
        assert!(TeamRole::Manager.is_assignable());
        assert!(TeamRole::Accountant.is_assignable());
        assert!(TeamRole::Agent.is_assignable());
    }

    #[test]
    fn test_custom_permission_lookup() {
        let now = Utc::now();
        let mut overrides = HashMap::new();
        overrides.insert("payments.void".to_string(), true);
        overrides.insert("properties.delete".to_string(), false);

        let member = TeamMember {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: TeamRole::Agent,
            status: MemberStatus::Active,
            custom_permissions: Json(overrides),
            invited_by: None,
            joined_at: Some(now),
            removed_at: None,
            left_at: None,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(member.custom_permission("payments.void"), Some(true));
        assert_eq!(member.custom_permission("properties.delete"), Some(false));
        assert_eq!(member.custom_permission("leases.view"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TeamRole::Accountant).unwrap(), "\"accountant\"");
    }
}
