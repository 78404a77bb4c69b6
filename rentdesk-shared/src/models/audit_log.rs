/// Team audit trail
///
/// Membership and permission changes are recorded with before/after
/// snapshots so owners can review who changed what.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamAuditLog {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub old_data: Option<JsonValue>,
    pub new_data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewAuditEntry {
    pub team_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub old_data: Option<JsonValue>,
    pub new_data: Option<JsonValue>,
}

impl NewAuditEntry {
    pub fn new(team_id: Uuid, user_id: Uuid, action: impl Into<String>) -> Self {
        Self {
            team_id,
            user_id: Some(user_id),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn resource(mut self, resource_type: &str, resource_id: Uuid) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id);
        self
    }

    pub fn change(mut self, old_data: Option<JsonValue>, new_data: Option<JsonValue>) -> Self {
        self.old_data = old_data;
        self.new_data = new_data;
        self
    }
}

impl TeamAuditLog {
    pub async fn record<'e>(
        executor: impl PgExecutor<'e>,
        entry: NewAuditEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO team_audit_logs
                (team_id, user_id, action, resource_type, resource_id, old_data, new_data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.team_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.old_data)
        .bind(&entry.new_data)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Lists a team's most recent entries
    pub async fn list_by_team(
        pool: &PgPool,
        team_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TeamAuditLog>(
            r#"
            SELECT id, team_id, user_id, action, resource_type, resource_id, old_data, new_data, created_at
            FROM team_audit_logs
            WHERE team_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audit_entry_builder() {
        let team_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let member_id = Uuid::new_v4();

        let entry = NewAuditEntry::new(team_id, user_id, "member.role_changed")
            .resource("team_member", member_id)
            .change(Some(json!({"role": "agent"})), Some(json!({"role": "manager"})));

        assert_eq!(entry.team_id, team_id);
        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.action, "member.role_changed");
        assert_eq!(entry.resource_type.as_deref(), Some("team_member"));
        assert_eq!(entry.resource_id, Some(member_id));
        assert_eq!(entry.new_data, Some(json!({"role": "manager"})));
    }
}
