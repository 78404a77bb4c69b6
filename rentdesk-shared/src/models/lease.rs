/// Lease model and tenant-portal token storage
///
/// Only the columns the access-control core relies on live here: tenant
/// contact details used by rent reminders, the billing day, and the hashed
/// magic-link token that lets a tenant open the portal without an account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lease_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Pending,
    Active,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lease {
    pub id: Uuid,
    pub team_id: Uuid,
    pub property_id: Option<Uuid>,
    /// Landlord copied on tenant communication
    pub owner_id: Option<Uuid>,
    pub tenant_name: String,
    pub tenant_email: Option<String>,
    pub tenant_push_token: Option<String>,
    pub property_address: Option<String>,
    /// Monthly rent in minor units of the team currency
    pub monthly_amount: i64,
    /// Overrides the team's default billing day
    pub billing_day: Option<i16>,
    pub status: LeaseStatus,
    /// SHA-256 hex of the tenant magic-link token
    #[serde(skip_serializing)]
    pub tenant_access_token: Option<String>,
    pub tenant_token_expires_at: Option<DateTime<Utc>>,
    pub tenant_token_verified: bool,
    pub tenant_last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What the tenant portal needs to know about a lease reached by token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantPortalLease {
    pub lease_id: Uuid,
    pub team_id: Uuid,
    pub tenant_name: String,
    pub tenant_email: Option<String>,
    pub property_title: Option<String>,
    pub property_address: Option<String>,
    pub status: LeaseStatus,
    pub tenant_token_expires_at: Option<DateTime<Utc>>,
    pub tenant_token_verified: bool,
}

const LEASE_COLUMNS: &str = r#"
    id, team_id, property_id, owner_id, tenant_name, tenant_email, tenant_push_token,
    property_address, monthly_amount, billing_day, status, tenant_access_token,
    tenant_token_expires_at, tenant_token_verified, tenant_last_access_at, created_at
"#;

impl Lease {
    pub async fn find_in_team(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {LEASE_COLUMNS} FROM leases WHERE team_id = $1 AND id = $2");

        sqlx::query_as::<_, Lease>(&query)
            .bind(team_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {LEASE_COLUMNS} FROM leases WHERE id = $1");

        sqlx::query_as::<_, Lease>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists every active lease across all teams
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {LEASE_COLUMNS} FROM leases WHERE status = 'active' ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, Lease>(&query).fetch_all(pool).await
    }

    /// Stores a fresh tenant token hash, replacing any previous one
    ///
    /// Resets identity verification: a new link must be verified again.
    pub async fn set_tenant_token(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE leases
            SET tenant_access_token = $3, tenant_token_expires_at = $4, tenant_token_verified = FALSE
            WHERE team_id = $1 AND id = $2
            "#,
        )
        .bind(team_id)
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes the tenant token of a lease
    pub async fn clear_tenant_token(
        pool: &PgPool,
        team_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE leases
            SET tenant_access_token = NULL, tenant_token_expires_at = NULL, tenant_token_verified = FALSE
            WHERE team_id = $1 AND id = $2
            "#,
        )
        .bind(team_id)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Looks up the lease owning a token hash
    ///
    /// Expiry and lease status are left to the caller so each failure can be
    /// logged with its own reason.
    pub async fn find_portal_lease_by_token_hash(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<TenantPortalLease>, sqlx::Error> {
        sqlx::query_as::<_, TenantPortalLease>(
            r#"
            SELECT
                l.id AS lease_id,
                l.team_id,
                l.tenant_name,
                l.tenant_email,
                p.title AS property_title,
                COALESCE(l.property_address, p.address) AS property_address,
                l.status,
                l.tenant_token_expires_at,
                l.tenant_token_verified
            FROM leases l
            LEFT JOIN properties p ON p.id = l.property_id
            WHERE l.tenant_access_token = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_tenant_verified(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE leases SET tenant_token_verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn touch_tenant_access(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE leases SET tenant_last_access_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
