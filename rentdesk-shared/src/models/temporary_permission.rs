/// Temporary permission grants
///
/// A grant gives one user one permission key inside one team until
/// `expires_at`. Grants are never consulted once expired; expiry is checked
/// at read time against the caller-supplied clock, so no sweeper is needed.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE temporary_permissions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     team_id UUID NOT NULL REFERENCES teams(id),
///     user_id UUID NOT NULL,
///     permission TEXT NOT NULL,
///     granted_by UUID,
///     reason TEXT,
///     access_request_id UUID REFERENCES access_requests(id),
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (team_id, user_id, permission)
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Shortest grant that can be issued, in hours
pub const MIN_GRANT_HOURS: i64 = 1;

/// Longest grant that can be issued (30 days), in hours
pub const MAX_GRANT_HOURS: i64 = 720;

/// Duration applied when an access request is approved without one
pub const DEFAULT_GRANT_HOURS: i64 = 24;

/// A time-boxed permission grant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemporaryPermission {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    /// Permission key, e.g. `payments.void`
    pub permission: String,
    pub granted_by: Option<Uuid>,
    pub reason: Option<String>,
    /// Access request this grant was issued for, if any
    pub access_request_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Input for issuing a grant
#[derive(Debug, Clone)]
pub struct GrantTemporaryPermission {
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub permission: String,
    pub granted_by: Uuid,
    pub reason: Option<String>,
    pub access_request_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// Computes the expiry of a grant issued at `now` for `hours`
///
/// Returns `None` when `hours` is outside `MIN_GRANT_HOURS..=MAX_GRANT_HOURS`.
pub fn grant_expiry(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    if (MIN_GRANT_HOURS..=MAX_GRANT_HOURS).contains(&hours) {
        Some(now + Duration::hours(hours))
    } else {
        None
    }
}

const GRANT_COLUMNS: &str = r#"
    id, team_id, user_id, permission, granted_by, reason, access_request_id,
    expires_at, created_at
"#;

impl TemporaryPermission {
    /// A grant is usable up to and including its expiry instant
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }

    /// Issues a grant
    ///
    /// Granting a key the user already holds replaces the previous grant's
    /// expiry, grantor and reason.
    pub async fn grant<'e>(
        executor: impl PgExecutor<'e>,
        data: GrantTemporaryPermission,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO temporary_permissions
                (team_id, user_id, permission, granted_by, reason, access_request_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (team_id, user_id, permission) DO UPDATE
            SET granted_by = EXCLUDED.granted_by,
                reason = EXCLUDED.reason,
                access_request_id = EXCLUDED.access_request_id,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            RETURNING {GRANT_COLUMNS}
            "#
        );

        sqlx::query_as::<_, TemporaryPermission>(&query)
            .bind(data.team_id)
            .bind(data.user_id)
            .bind(&data.permission)
            .bind(data.granted_by)
            .bind(&data.reason)
            .bind(data.access_request_id)
            .bind(data.expires_at)
            .fetch_one(executor)
            .await
    }

    /// Lists a user's grants that are still active at `now`
    ///
    /// Ordered by expiry ascending, then by ID so equal expiries come back in
    /// a stable order.
    pub async fn get_active_permissions(
        pool: &PgPool,
        team_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM temporary_permissions
            WHERE team_id = $1 AND user_id = $2 AND expires_at >= $3
            ORDER BY expires_at ASC, id ASC
            "#
        );

        sqlx::query_as::<_, TemporaryPermission>(&query)
            .bind(team_id)
            .bind(user_id)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Lists every active grant in a team, for the permissions admin view
    pub async fn list_active_for_team(
        pool: &PgPool,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {GRANT_COLUMNS}
            FROM temporary_permissions
            WHERE team_id = $1 AND expires_at >= $2
            ORDER BY expires_at ASC, id ASC
            "#
        );

        sqlx::query_as::<_, TemporaryPermission>(&query)
            .bind(team_id)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Revokes a grant
    ///
    /// # Returns
    ///
    /// True if a grant belonging to the team was deleted
    pub async fn revoke(pool: &PgPool, team_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM temporary_permissions WHERE team_id = $1 AND id = $2")
            .bind(team_id)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
