/// Tenant portal magic links
///
/// Tenants have no account. A team member issues a magic link for a lease;
/// the link carries a random 32-byte token (hex-encoded), and only its
/// SHA-256 hash is stored on the lease. Opening the link validates the token,
/// then the tenant confirms their last name before a session cookie is set.
///
/// # Token Format
///
/// ```text
/// 64 lowercase hex characters
/// ```
///
/// # Flow
///
/// 1. [`issue_link`] stores the hash, returns the raw token once
/// 2. [`validate_token`] resolves the token to its lease
/// 3. [`verify_identity`] checks the last name and marks the lease verified
/// 4. The API signs the raw token into the `tenant_session` cookie

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::lease::{Lease, LeaseStatus, TenantPortalLease};
use crate::models::tenant_access_log::{TenantAccessAction, TenantAccessLog};

/// Magic links stay valid for 7 days
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Failed identity checks tolerated per window
pub const MAX_FAILED_VERIFICATIONS: i64 = 5;

/// Window for counting failed identity checks, in minutes
pub const VERIFICATION_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum TenantTokenError {
    #[error("Invalid or unknown link")]
    Invalid,

    #[error("This link has expired")]
    Expired,

    #[error("The lease is no longer active")]
    LeaseInactive,

    #[error("Identity could not be verified")]
    IdentityMismatch,

    #[error("Too many verification attempts, try again later")]
    TooManyAttempts,

    #[error("Lease not found")]
    LeaseNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Generates a raw token: 32 random bytes, hex-encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of the raw token, hex-encoded, as stored on the lease
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Rejects anything that is not 64 hex characters before touching the DB
pub fn is_well_formed(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

/// Lowercases, strips accents and collapses punctuation to single spaces
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_char)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `last_name` matches the end of `full_name`
///
/// Comparison is case- and accent-insensitive and respects word boundaries,
/// so compound last names ("Ba Diallo") match while partial words do not.
pub fn last_name_matches(full_name: &str, last_name: &str) -> bool {
    let full = normalize_name(full_name);
    let last = normalize_name(last_name);

    if last.is_empty() || !full.ends_with(&last) {
        return false;
    }

    let prefix = &full[..full.len() - last.len()];
    prefix.is_empty() || prefix.ends_with(' ')
}

/// Issues a new magic link for a lease, revoking any previous one
///
/// # Returns
///
/// The raw token. It is not stored and cannot be recovered later.
pub async fn issue_link(
    pool: &PgPool,
    team_id: Uuid,
    lease_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(String, DateTime<Utc>), TenantTokenError> {
    let token = generate_token();
    let expires_at = now + Duration::days(TOKEN_TTL_DAYS);

    let updated = Lease::set_tenant_token(pool, team_id, lease_id, &hash_token(&token), expires_at)
        .await?;
    if !updated {
        return Err(TenantTokenError::LeaseNotFound);
    }

    TenantAccessLog::record(pool, Some(lease_id), TenantAccessAction::LinkCreated, None).await;
    tracing::info!(%lease_id, "Issued tenant magic link");

    Ok((token, expires_at))
}

/// Revokes a lease's magic link; existing sessions stop validating
pub async fn revoke_link(
    pool: &PgPool,
    team_id: Uuid,
    lease_id: Uuid,
) -> Result<(), TenantTokenError> {
    if !Lease::clear_tenant_token(pool, team_id, lease_id).await? {
        return Err(TenantTokenError::LeaseNotFound);
    }

    TenantAccessLog::record(pool, Some(lease_id), TenantAccessAction::LinkRevoked, None).await;
    Ok(())
}

fn check_portal_lease(
    lease: &TenantPortalLease,
    now: DateTime<Utc>,
) -> Result<(), TenantTokenError> {
    match lease.tenant_token_expires_at {
        Some(expires_at) if expires_at >= now => {}
        _ => return Err(TenantTokenError::Expired),
    }

    if lease.status != LeaseStatus::Active {
        return Err(TenantTokenError::LeaseInactive);
    }

    Ok(())
}

/// Resolves a raw token to its lease
///
/// Every outcome is written to the tenant access log.
pub async fn validate_token(
    pool: &PgPool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<TenantPortalLease, TenantTokenError> {
    if !is_well_formed(token) {
        TenantAccessLog::record(pool, None, TenantAccessAction::TokenRejected, Some("malformed"))
            .await;
        return Err(TenantTokenError::Invalid);
    }

    let Some(lease) = Lease::find_portal_lease_by_token_hash(pool, &hash_token(token)).await?
    else {
        TenantAccessLog::record(pool, None, TenantAccessAction::TokenRejected, Some("unknown"))
            .await;
        return Err(TenantTokenError::Invalid);
    };

    if let Err(e) = check_portal_lease(&lease, now) {
        let reason = match e {
            TenantTokenError::Expired => "expired",
            _ => "lease_inactive",
        };
        TenantAccessLog::record(pool, Some(lease.lease_id), TenantAccessAction::TokenRejected, Some(reason))
            .await;
        return Err(e);
    }

    Lease::touch_tenant_access(pool, lease.lease_id).await?;
    TenantAccessLog::record(pool, Some(lease.lease_id), TenantAccessAction::TokenValidated, None)
        .await;

    Ok(lease)
}

/// Confirms the tenant's last name for a validated token
///
/// Repeated failures within the window lock further attempts.
pub async fn verify_identity(
    pool: &PgPool,
    token: &str,
    last_name: &str,
    now: DateTime<Utc>,
) -> Result<TenantPortalLease, TenantTokenError> {
    let mut lease = validate_token(pool, token, now).await?;

    let since = now - Duration::minutes(VERIFICATION_WINDOW_MINUTES);
    let failures = TenantAccessLog::count_failed_verifications(pool, lease.lease_id, since).await?;
    if failures >= MAX_FAILED_VERIFICATIONS {
        tracing::warn!(lease_id = %lease.lease_id, failures, "Tenant verification locked");
        return Err(TenantTokenError::TooManyAttempts);
    }

    if !last_name_matches(&lease.tenant_name, last_name) {
        TenantAccessLog::record(
            pool,
            Some(lease.lease_id),
            TenantAccessAction::VerificationFailed,
            Some("last_name_mismatch"),
        )
        .await;
        return Err(TenantTokenError::IdentityMismatch);
    }

    Lease::mark_tenant_verified(pool, lease.lease_id).await?;
    TenantAccessLog::record(pool, Some(lease.lease_id), TenantAccessAction::IdentityVerified, None)
        .await;

    lease.tenant_token_verified = true;
    Ok(lease)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal_lease(status: LeaseStatus, expires_at: Option<DateTime<Utc>>) -> TenantPortalLease {
        TenantPortalLease {
            lease_id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            tenant_name: "Fatou Ndiaye".to_string(),
            tenant_email: None,
            property_title: Some("Appartement Plateau".to_string()),
            property_address: None,
            status,
            tenant_token_expires_at: expires_at,
            tenant_token_verified: false,
        }
    }

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        assert!(is_well_formed(&token));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_is_stable_and_differs_from_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_eq!(hash_token(&token).len(), 64);
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc"));
        assert!(!is_well_formed(&"z".repeat(64)));
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Sène-DIOP "), "sene diop");
        assert_eq!(normalize_name("Ndèye Coumba"), "ndeye coumba");
        assert_eq!(normalize_name("Ćelić"), "celic");
    }

    #[test]
    fn test_last_name_matching() {
        assert!(last_name_matches("Fatou Ndiaye", "ndiaye"));
        assert!(last_name_matches("Fatou Ndiaye", "NDIAYE"));
        assert!(last_name_matches("Aïssatou Ba Diallo", "ba diallo"));
        assert!(last_name_matches("Jean Sène", "sene"));
        assert!(last_name_matches("Sène", "Sène"));

        assert!(!last_name_matches("Fatou Ndiaye", "diaye"));
        assert!(!last_name_matches("Fatou Ndiaye", "Fatou"));
        assert!(!last_name_matches("Fatou Ndiaye", "   "));
    }

    #[test]
    fn test_portal_lease_checks() {
        let now = Utc::now();

        assert!(check_portal_lease(&portal_lease(LeaseStatus::Active, Some(now + Duration::days(1))), now).is_ok());
        assert!(matches!(
            check_portal_lease(&portal_lease(LeaseStatus::Active, Some(now - Duration::seconds(1))), now),
            Err(TenantTokenError::Expired)
        ));
        assert!(matches!(
            check_portal_lease(&portal_lease(LeaseStatus::Active, None), now),
            Err(TenantTokenError::Expired)
        ));
        assert!(matches!(
            check_portal_lease(&portal_lease(LeaseStatus::Terminated, Some(now + Duration::days(1))), now),
            Err(TenantTokenError::LeaseInactive)
        ));
    }
}
