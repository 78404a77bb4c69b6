/// Team model and database operations
///
/// A team is the unit of tenancy: every property, lease and rent record
/// belongs to exactly one team. The team row also carries the subscription
/// state and the activation milestones used by [`crate::activation`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name TEXT NOT NULL,
///     slug TEXT NOT NULL UNIQUE,
///     status team_status NOT NULL DEFAULT 'active',
///     subscription_status subscription_status NOT NULL DEFAULT 'trialing',
///     subscription_tier subscription_tier NOT NULL DEFAULT 'starter',
///     subscription_trial_ends_at TIMESTAMPTZ,
///     default_billing_day SMALLINT NOT NULL DEFAULT 5,
///     currency TEXT NOT NULL DEFAULT 'XOF',
///     commission_bps INTEGER NOT NULL DEFAULT 0,
///     first_property_at TIMESTAMPTZ,
///     first_property_id UUID,
///     first_lease_at TIMESTAMPTZ,
///     first_payment_at TIMESTAMPTZ,
///     activation_completed_at TIMESTAMPTZ,
///     created_by UUID,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Lifecycle status of a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "team_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Active,
    Suspended,
    Archived,
}

/// Billing state mirrored from the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Solo landlords, a handful of units
    Starter,
    /// Agencies with several collaborators
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }
}

/// Team model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier
    pub slug: String,
    pub status: TeamStatus,
    pub subscription_status: SubscriptionStatus,
    pub subscription_tier: SubscriptionTier,
    pub subscription_trial_ends_at: Option<DateTime<Utc>>,
    /// Day of month rent falls due when a lease does not override it
    pub default_billing_day: i16,
    /// ISO currency code used when rendering amounts
    pub currency: String,
    /// Agency commission in basis points
    pub commission_bps: i32,
    pub first_property_at: Option<DateTime<Utc>>,
    pub first_property_id: Option<Uuid>,
    pub first_lease_at: Option<DateTime<Utc>>,
    pub first_payment_at: Option<DateTime<Utc>>,
    pub activation_completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new team
#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub name: String,
    pub slug: String,
    pub subscription_tier: SubscriptionTier,
    /// Length of the trial; the team starts in `trialing`
    pub trial_days: i64,
    pub created_by: Option<Uuid>,
}

const TEAM_COLUMNS: &str = r#"
    id, name, slug, status, subscription_status, subscription_tier,
    subscription_trial_ends_at, default_billing_day, currency, commission_bps,
    first_property_at, first_property_id, first_lease_at, first_payment_at,
    activation_completed_at, created_by, created_at, updated_at
"#;

impl Team {
    /// Whether the team may use paid features at `now`
    ///
    /// Active subscriptions always qualify. Trialing teams qualify until the
    /// trial end passes.
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Trialing => self
                .subscription_trial_ends_at
                .map(|ends| ends > now)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Creates a new team in the trialing state
    ///
    /// Accepts any executor so it can run inside the personal-team bootstrap
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the slug is already taken or the database fails.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateTeam,
    ) -> Result<Self, sqlx::Error> {
        let trial_ends_at = Utc::now() + Duration::days(data.trial_days);

        let query = format!(
            r#"
            INSERT INTO teams (name, slug, subscription_tier, subscription_trial_ends_at, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TEAM_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Team>(&query)
            .bind(&data.name)
            .bind(&data.slug)
            .bind(data.subscription_tier)
            .bind(trial_ends_at)
            .bind(data.created_by)
            .fetch_one(executor)
            .await
    }

    /// Finds a team by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1");

        sqlx::query_as::<_, Team>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a team by slug
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE slug = $1");

        sqlx::query_as::<_, Team>(&query)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }
}

/// Slug of a user's personal team: `perso-` plus the first 8 hex digits of
/// the user ID. The unique slug also keeps a user to one personal team.
pub fn personal_team_slug(user_id: Uuid) -> String {
    let simple = user_id.simple().to_string();
    format!("perso-{}", &simple[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(status: SubscriptionStatus, trial_ends_at: Option<DateTime<Utc>>) -> Team {
        let now = Utc::now();
        Team {
            id: Uuid::new_v4(),
            name: "Agence Dakar".to_string(),
            slug: "agence-dakar".to_string(),
            status: TeamStatus::Active,
            subscription_status: status,
            subscription_tier: SubscriptionTier::Starter,
            subscription_trial_ends_at: trial_ends_at,
            default_billing_day: 5,
            currency: "XOF".to_string(),
            commission_bps: 0,
            first_property_at: None,
            first_property_id: None,
            first_lease_at: None,
            first_payment_at: None,
            activation_completed_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_trial_subscription_expires() {
        let now = Utc::now();
        let running = team(SubscriptionStatus::Trialing, Some(now + Duration::days(3)));
        let ended = team(SubscriptionStatus::Trialing, Some(now - Duration::days(1)));

        assert!(running.has_active_subscription(now));
        assert!(!ended.has_active_subscription(now));
    }

    #[test]
    fn test_paid_and_lapsed_subscriptions() {
        let now = Utc::now();
        assert!(team(SubscriptionStatus::Active, None).has_active_subscription(now));
        assert!(!team(SubscriptionStatus::PastDue, None).has_active_subscription(now));
        assert!(!team(SubscriptionStatus::Canceled, None).has_active_subscription(now));
    }

    #[test]
    fn test_personal_team_slug_format() {
        let user_id = Uuid::parse_str("3f2a9c1e-7b44-4d2a-9e0f-1c2d3e4f5a6b").unwrap();
        assert_eq!(personal_team_slug(user_id), "perso-3f2a9c1e");
    }

    #[test]
    fn test_subscription_status_serializes_snake_case() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
    }
}
