/// Shared-secret authentication for scheduled endpoints
///
/// The scheduler calls cron routes with `Authorization: Bearer <CRON_SECRET>`.
/// When a secret is configured it is always enforced. Without one, cron
/// routes are open in development and closed in production.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::principal::{bearer_token, AuthError};

type HmacSha256 = Hmac<Sha256>;

const CRON_TAG_LABEL: &[u8] = b"rentdesk-cron";

fn cron_mac(key: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size")
}

/// True if `provided` equals `secret`, compared in constant time
///
/// Both values key an HMAC over the same label; the tags are compared with
/// `verify_slice`.
pub fn secrets_match(provided: &str, secret: &str) -> bool {
    let expected = cron_mac(secret).chain_update(CRON_TAG_LABEL).finalize().into_bytes();

    cron_mac(provided)
        .chain_update(CRON_TAG_LABEL)
        .verify_slice(&expected)
        .is_ok()
}

/// Checks the cron bearer secret
pub fn verify_cron_secret(
    headers: &HeaderMap,
    secret: Option<&str>,
    production: bool,
) -> Result<(), AuthError> {
    let Some(secret) = secret else {
        if production {
            tracing::error!("CRON_SECRET is not configured; rejecting cron call");
            return Err(AuthError::InvalidToken("Cron endpoint disabled".to_string()));
        }
        tracing::warn!("CRON_SECRET is not configured; allowing cron call in development");
        return Ok(());
    };

    let provided = bearer_token(headers)?;

    if !secrets_match(provided, secret) {
        return Err(AuthError::InvalidToken("Invalid cron secret".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {value}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_matching_secret_accepted() {
        assert!(verify_cron_secret(&bearer("s3cret"), Some("s3cret"), true).is_ok());
    }

    #[test]
    fn test_wrong_or_missing_secret_rejected() {
        assert!(verify_cron_secret(&bearer("nope"), Some("s3cret"), false).is_err());
        assert!(verify_cron_secret(&HeaderMap::new(), Some("s3cret"), false).is_err());
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cre", "s3cret"));
        assert!(!secrets_match("s3cret-and-more", "s3cret"));
        assert!(!secrets_match("", "s3cret"));
    }

    #[test]
    fn test_unconfigured_secret() {
        assert!(verify_cron_secret(&HeaderMap::new(), None, false).is_ok());
        assert!(verify_cron_secret(&bearer("anything"), None, true).is_err());
    }
}
