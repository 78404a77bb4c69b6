/// API route handlers
///
/// Handlers are organized by resource:
///
/// - `health`: Health check endpoint
/// - `cron`: Scheduled jobs (reminders, monthly rent records)
/// - `teams`: Active team, switching, membership
/// - `permissions`: Temporary grants and access requests
/// - `activation`: Onboarding stage
/// - `payments`: Payment confirmation
/// - `tenant`: Tenant portal magic links and sessions

pub mod activation;
pub mod cron;
pub mod health;
pub mod payments;
pub mod permissions;
pub mod teams;
pub mod tenant;
