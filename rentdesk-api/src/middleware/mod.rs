/// Middleware and extractors for the API server
///
/// - `security`: security response headers
/// - `team`: resolves the caller's active team for handlers

pub mod security;
pub mod team;
