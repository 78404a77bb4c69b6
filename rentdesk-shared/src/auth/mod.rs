/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: Access token validation
/// - [`principal`]: Bearer middleware and the [`principal::Principal`] extractor
/// - [`cookies`]: HMAC-signed cookies (`active_team`, `tenant_session`)
/// - [`team_context`]: Active team resolution
/// - [`permissions`]: Permission catalog and role defaults
/// - [`authorization`]: The guard combining role, overrides and grants
/// - [`tenant_token`]: Tenant portal magic links
/// - [`cron`]: Shared-secret check for scheduled endpoints
///
/// # Security Features
///
/// - **JWT Tokens**: HS256, issuer and expiry checked
/// - **Signed Cookies**: HMAC-SHA256, constant-time verification
/// - **Magic Links**: 256-bit random tokens, stored only as SHA-256 hashes

pub mod authorization;
pub mod cookies;
pub mod cron;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod team_context;
pub mod tenant_token;
