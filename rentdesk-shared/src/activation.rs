//! Activation stage tracking
//!
//! New teams move through four onboarding stages:
//!
//! | Stage | Reached when                 |
//! |-------|------------------------------|
//! | 1     | the team exists              |
//! | 2     | the first property is added  |
//! | 3     | the first lease is configured|
//! | 4     | the first payment is recorded|
//!
//! The stage is derived from milestone timestamps on the team row. Each
//! milestone is written once and never cleared, so deleting the property or
//! lease that unlocked a stage does not move the team back.
//!
//! Some modules stay soft-locked until a stage is reached: inventory and
//! maintenance need a configured lease, legal and accounting need a payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::team::Team;

/// Onboarding stage, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActivationStage {
    TeamCreated = 1,
    PropertyAdded = 2,
    LeaseConfigured = 3,
    FirstPayment = 4,
}

impl ActivationStage {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Share of onboarding done, 0 at stage 1 and 100 at stage 4
    pub fn progress_percent(self) -> u8 {
        match self {
            ActivationStage::TeamCreated => 0,
            ActivationStage::PropertyAdded => 33,
            ActivationStage::LeaseConfigured => 66,
            ActivationStage::FirstPayment => 100,
        }
    }
}

impl From<ActivationStage> for u8 {
    fn from(stage: ActivationStage) -> u8 {
        stage.number()
    }
}

impl TryFrom<u8> for ActivationStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ActivationStage::TeamCreated),
            2 => Ok(ActivationStage::PropertyAdded),
            3 => Ok(ActivationStage::LeaseConfigured),
            4 => Ok(ActivationStage::FirstPayment),
            other => Err(format!("invalid activation stage {other}")),
        }
    }
}

/// Events that advance activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    FirstProperty,
    FirstLease,
    FirstPayment,
}

/// Modules gated behind an activation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedModule {
    Inventory,
    Maintenance,
    Legal,
    Accounting,
}

impl GatedModule {
    pub const ALL: [GatedModule; 4] = [
        GatedModule::Inventory,
        GatedModule::Maintenance,
        GatedModule::Legal,
        GatedModule::Accounting,
    ];

    pub fn required_stage(self) -> ActivationStage {
        match self {
            GatedModule::Inventory | GatedModule::Maintenance => ActivationStage::LeaseConfigured,
            GatedModule::Legal | GatedModule::Accounting => ActivationStage::FirstPayment,
        }
    }

    pub fn is_unlocked_at(self, stage: ActivationStage) -> bool {
        stage >= self.required_stage()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("Team not found")]
    TeamNotFound,

    #[error("Activation is at stage {current}, stage {required} is required")]
    NotReady { current: u8, required: u8 },

    #[error("Module {module:?} unlocks at stage {required}")]
    ModuleLocked { module: GatedModule, required: u8 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Milestone timestamps copied off the team row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Milestones {
    pub first_property_at: Option<DateTime<Utc>>,
    pub first_lease_at: Option<DateTime<Utc>>,
    pub first_payment_at: Option<DateTime<Utc>>,
}

impl Milestones {
    pub fn from_team(team: &Team) -> Self {
        Self {
            first_property_at: team.first_property_at,
            first_lease_at: team.first_lease_at,
            first_payment_at: team.first_payment_at,
        }
    }

    /// Highest stage whose milestone has been reached
    pub fn stage(&self) -> ActivationStage {
        if self.first_payment_at.is_some() {
            ActivationStage::FirstPayment
        } else if self.first_lease_at.is_some() {
            ActivationStage::LeaseConfigured
        } else if self.first_property_at.is_some() {
            ActivationStage::PropertyAdded
        } else {
            ActivationStage::TeamCreated
        }
    }
}

/// Activation snapshot returned to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationStatus {
    pub team_id: Uuid,
    pub stage: ActivationStage,
    pub progress_percent: u8,
    pub first_property_id: Option<Uuid>,
    pub first_property_at: Option<DateTime<Utc>>,
    pub first_lease_at: Option<DateTime<Utc>>,
    pub first_payment_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub locked_modules: Vec<GatedModule>,
}

impl ActivationStatus {
    pub fn from_team(team: &Team) -> Self {
        let stage = Milestones::from_team(team).stage();

        Self {
            team_id: team.id,
            stage,
            progress_percent: stage.progress_percent(),
            first_property_id: team.first_property_id,
            first_property_at: team.first_property_at,
            first_lease_at: team.first_lease_at,
            first_payment_at: team.first_payment_at,
            completed_at: team.activation_completed_at,
            locked_modules: GatedModule::ALL
                .into_iter()
                .filter(|m| !m.is_unlocked_at(stage))
                .collect(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Fails with [`ActivationError::ModuleLocked`] if the module is not yet open
pub fn check_module(stage: ActivationStage, module: GatedModule) -> Result<(), ActivationError> {
    if module.is_unlocked_at(stage) {
        Ok(())
    } else {
        Err(ActivationError::ModuleLocked {
            module,
            required: module.required_stage().number(),
        })
    }
}

/// Fails with [`ActivationError::NotReady`] while `current` is below `required`
pub fn require_stage(
    current: ActivationStage,
    required: ActivationStage,
) -> Result<(), ActivationError> {
    if current >= required {
        Ok(())
    } else {
        Err(ActivationError::NotReady {
            current: current.number(),
            required: required.number(),
        })
    }
}

/// Records a milestone if it has not been reached before
///
/// `entity_id` is kept for the first property only.
///
/// # Returns
///
/// True if this call set the milestone; false if it was already set
pub async fn record_milestone(
    pool: &PgPool,
    team_id: Uuid,
    milestone: Milestone,
    entity_id: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let result = match milestone {
        Milestone::FirstProperty => {
            sqlx::query(
                r#"
                UPDATE teams
                SET first_property_at = NOW(), first_property_id = $2, updated_at = NOW()
                WHERE id = $1 AND first_property_at IS NULL
                "#,
            )
            .bind(team_id)
            .bind(entity_id)
            .execute(pool)
            .await?
        }
        Milestone::FirstLease => {
            sqlx::query(
                r#"
                UPDATE teams
                SET first_lease_at = NOW(), updated_at = NOW()
                WHERE id = $1 AND first_lease_at IS NULL
                "#,
            )
            .bind(team_id)
            .execute(pool)
            .await?
        }
        Milestone::FirstPayment => {
            sqlx::query(
                r#"
                UPDATE teams
                SET first_payment_at = NOW(), updated_at = NOW()
                WHERE id = $1 AND first_payment_at IS NULL
                "#,
            )
            .bind(team_id)
            .execute(pool)
            .await?
        }
    };

    let newly_set = result.rows_affected() > 0;
    if newly_set {
        tracing::info!(%team_id, ?milestone, "Activation milestone reached");
    }

    Ok(newly_set)
}

/// Loads the activation snapshot of a team
pub async fn get_activation_status(
    pool: &PgPool,
    team_id: Uuid,
) -> Result<ActivationStatus, ActivationError> {
    let team = Team::find_by_id(pool, team_id)
        .await?
        .ok_or(ActivationError::TeamNotFound)?;

    Ok(ActivationStatus::from_team(&team))
}

/// Marks onboarding as completed
///
/// Only allowed once stage 4 is reached. Completing twice keeps the first
/// completion time.
pub async fn complete_activation(
    pool: &PgPool,
    team_id: Uuid,
) -> Result<ActivationStatus, ActivationError> {
    let status = get_activation_status(pool, team_id).await?;
    require_stage(status.stage, ActivationStage::FirstPayment)?;

    if status.is_completed() {
        return Ok(status);
    }

    sqlx::query(
        r#"
        UPDATE teams
        SET activation_completed_at = COALESCE(activation_completed_at, NOW()), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(team_id)
    .execute(pool)
    .await?;

    tracing::info!(%team_id, "Activation completed");
    get_activation_status(pool, team_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_stage_from_milestones() {
        let now = Utc::now();
        let mut m = Milestones::default();
        assert_eq!(m.stage(), ActivationStage::TeamCreated);

        m.first_property_at = Some(now);
        assert_eq!(m.stage(), ActivationStage::PropertyAdded);

        m.first_lease_at = Some(now);
        assert_eq!(m.stage(), ActivationStage::LeaseConfigured);

        m.first_payment_at = Some(now);
        assert_eq!(m.stage(), ActivationStage::FirstPayment);
    }

    #[test]
    fn test_stage_uses_highest_milestone() {
        let m = Milestones {
            first_property_at: None,
            first_lease_at: Some(Utc::now() - Duration::days(1)),
            first_payment_at: None,
        };
        assert_eq!(m.stage(), ActivationStage::LeaseConfigured);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(ActivationStage::TeamCreated.progress_percent(), 0);
        assert_eq!(ActivationStage::PropertyAdded.progress_percent(), 33);
        assert_eq!(ActivationStage::LeaseConfigured.progress_percent(), 66);
        assert_eq!(ActivationStage::FirstPayment.progress_percent(), 100);
    }

    #[test]
    fn test_module_soft_locks() {
        assert!(check_module(ActivationStage::PropertyAdded, GatedModule::Inventory).is_err());
        assert!(check_module(ActivationStage::LeaseConfigured, GatedModule::Inventory).is_ok());
        assert!(check_module(ActivationStage::LeaseConfigured, GatedModule::Maintenance).is_ok());
        assert!(check_module(ActivationStage::LeaseConfigured, GatedModule::Accounting).is_err());
        assert!(check_module(ActivationStage::FirstPayment, GatedModule::Legal).is_ok());

        match check_module(ActivationStage::TeamCreated, GatedModule::Legal) {
            Err(ActivationError::ModuleLocked { module, required }) => {
                assert_eq!(module, GatedModule::Legal);
                assert_eq!(required, 4);
            }
            other => panic!("expected ModuleLocked, got {other:?}"),
        }
    }

    #[test]
    fn test_require_stage() {
        assert!(require_stage(ActivationStage::FirstPayment, ActivationStage::LeaseConfigured).is_ok());
        assert!(require_stage(ActivationStage::LeaseConfigured, ActivationStage::LeaseConfigured).is_ok());
        assert!(matches!(
            require_stage(ActivationStage::PropertyAdded, ActivationStage::FirstPayment),
            Err(ActivationError::NotReady { current: 2, required: 4 })
        ));
    }

    #[test]
    fn test_stage_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ActivationStage::LeaseConfigured).unwrap(), "3");
        let parsed: ActivationStage = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, ActivationStage::PropertyAdded);
        assert!(serde_json::from_str::<ActivationStage>("7").is_err());
    }
}
