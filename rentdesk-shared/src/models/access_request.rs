/// Access requests
///
/// A member lacking a permission can ask for it temporarily. A reviewer with
/// the right to edit roles approves (issuing a grant) or rejects the request.
/// At most one pending request exists per (team, requester, permission).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "access_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessRequest {
    pub id: Uuid,
    pub team_id: Uuid,
    pub requester_id: Uuid,
    pub requested_permission: String,
    pub reason: Option<String>,
    pub status: AccessRequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    /// Expiry of the grant issued on approval
    pub expires_at: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAccessRequest {
    pub team_id: Uuid,
    pub requester_id: Uuid,
    pub requested_permission: String,
    pub reason: Option<String>,
}

/// Reviewer decision applied to a pending request
#[derive(Debug, Clone)]
pub struct ReviewAccessRequest {
    pub status: AccessRequestStatus,
    pub reviewed_by: Uuid,
    pub review_notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

const REQUEST_COLUMNS: &str = r#"
    id, team_id, requester_id, requested_permission, reason, status,
    reviewed_by, reviewed_at, review_notes, expires_at, requested_at
"#;

impl AccessRequest {
    /// Files a new request
    ///
    /// # Errors
    ///
    /// Fails with a unique violation when the same request is already pending.
    pub async fn create(pool: &PgPool, data: CreateAccessRequest) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO access_requests (team_id, requester_id, requested_permission, reason)
            VALUES ($1, $2, $3, $4)
            RETURNING {REQUEST_COLUMNS}
            "#
        );

        sqlx::query_as::<_, AccessRequest>(&query)
            .bind(data.team_id)
            .bind(data.requester_id)
            .bind(&data.requested_permission)
            .bind(&data.reason)
            .fetch_one(pool)
            .await
    }

    pub async fn find_in_team(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {REQUEST_COLUMNS} FROM access_requests WHERE team_id = $1 AND id = $2"
        );

        sqlx::query_as::<_, AccessRequest>(&query)
            .bind(team_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists a team's requests, newest first, optionally filtered by status
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        status: Option<AccessRequestStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM access_requests
            WHERE team_id = $1 AND ($2::access_request_status IS NULL OR status = $2)
            ORDER BY requested_at DESC
            "#
        );

        sqlx::query_as::<_, AccessRequest>(&query)
            .bind(team_id)
            .bind(status)
            .fetch_all(pool)
            .await
    }

    /// Applies a review decision to a request that is still pending
    ///
    /// The `status = 'pending'` filter makes concurrent reviews race-safe:
    /// only the first one gets a row back.
    pub async fn review<'e>(
        executor: impl PgExecutor<'e>,
        team_id: Uuid,
        id: Uuid,
        review: ReviewAccessRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE access_requests
            SET status = $3, reviewed_by = $4, reviewed_at = NOW(), review_notes = $5, expires_at = $6
            WHERE team_id = $1 AND id = $2 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        );

        sqlx::query_as::<_, AccessRequest>(&query)
            .bind(team_id)
            .bind(id)
            .bind(review.status)
            .bind(review.reviewed_by)
            .bind(&review.review_notes)
            .bind(review.expires_at)
            .fetch_optional(executor)
            .await
    }
}
