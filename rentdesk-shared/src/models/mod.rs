/// Database models for Rentdesk
///
/// Every model owns the SQL that reads and writes its table. Handlers and the
/// worker go through these functions instead of issuing ad-hoc queries.
///
/// # Models
///
/// - `team`: Organizations, subscription state, activation milestones
/// - `team_member`: User-team memberships with roles and custom overrides
/// - `temporary_permission`: Time-boxed permission grants
/// - `access_request`: Requests for temporary permissions and their review
/// - `lease`: Leases and the tenant magic-link fields
/// - `rental_transaction`: Monthly rent ledger and reminder flags
/// - `tenant_access_log`: Tenant portal access trail
/// - `audit_log`: Team-level audit trail
///
/// # Example
///
/// ```no_run
/// use rentdesk_shared::models::team_member::TeamMember;
/// use rentdesk_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let memberships = TeamMember::list_active_by_user(&pool, Uuid::new_v4()).await?;
/// println!("{} active teams", memberships.len());
/// # Ok(())
/// # }
/// ```

pub mod access_request;
pub mod audit_log;
pub mod lease;
pub mod rental_transaction;
pub mod team;
pub mod team_member;
pub mod temporary_permission;
pub mod tenant_access_log;
