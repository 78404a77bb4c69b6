/// Tenant portal access trail
///
/// Every token validation, identity check and session event is appended
/// here. Writes are best-effort: a failure to log never blocks the tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantAccessAction {
    LinkCreated,
    LinkRevoked,
    TokenValidated,
    TokenRejected,
    IdentityVerified,
    VerificationFailed,
    SessionCreated,
}

impl TenantAccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantAccessAction::LinkCreated => "link_created",
            TenantAccessAction::LinkRevoked => "link_revoked",
            TenantAccessAction::TokenValidated => "token_validated",
            TenantAccessAction::TokenRejected => "token_rejected",
            TenantAccessAction::IdentityVerified => "identity_verified",
            TenantAccessAction::VerificationFailed => "verification_failed",
            TenantAccessAction::SessionCreated => "session_created",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantAccessLog {
    pub id: Uuid,
    pub lease_id: Option<Uuid>,
    pub action: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TenantAccessLog {
    /// Appends an entry, logging and swallowing any database error
    pub async fn record(
        pool: &PgPool,
        lease_id: Option<Uuid>,
        action: TenantAccessAction,
        failure_reason: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO tenant_access_logs (lease_id, action, failure_reason) VALUES ($1, $2, $3)",
        )
        .bind(lease_id)
        .bind(action.as_str())
        .bind(failure_reason)
        .execute(pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, action = action.as_str(), "Failed to write tenant access log");
        }
    }

    /// Counts failed identity checks for a lease since `since`
    pub async fn count_failed_verifications(
        pool: &PgPool,
        lease_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tenant_access_logs
            WHERE lease_id = $1 AND action = 'verification_failed' AND created_at >= $2
            "#,
        )
        .bind(lease_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }
}
