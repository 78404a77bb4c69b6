/// Signed cookies
///
/// Cookie values are signed with HMAC-SHA256 and carried as
/// `<value>.<hex signature>`. A value whose signature does not verify is
/// treated exactly like an absent cookie.
///
/// Two cookies use this scheme:
///
/// - `active_team`: the team the user last switched to (90 days)
/// - `tenant_session`: the tenant portal session (24 hours)

use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const ACTIVE_TEAM_COOKIE: &str = "active_team";

/// 90 days
pub const ACTIVE_TEAM_MAX_AGE_SECS: i64 = 90 * 24 * 60 * 60;

pub const TENANT_SESSION_COOKIE: &str = "tenant_session";

/// 24 hours
pub const TENANT_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CookieError {
    #[error("Cookie value is not signed")]
    Unsigned,

    #[error("Cookie signature is invalid")]
    BadSignature,
}

fn mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Signs a value, producing `<value>.<hex signature>`
pub fn sign(value: &str, secret: &str) -> String {
    let mut mac = mac(secret);
    mac.update(value.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("{value}.{signature}")
}

/// Verifies a signed value and returns the original
///
/// Verification is constant-time.
pub fn verify(signed: &str, secret: &str) -> Result<String, CookieError> {
    let (value, signature) = signed.rsplit_once('.').ok_or(CookieError::Unsigned)?;
    let signature = hex::decode(signature).map_err(|_| CookieError::BadSignature)?;

    let mut mac = mac(secret);
    mac.update(value.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| CookieError::BadSignature)?;

    Ok(value.to_string())
}

/// Reads a cookie by name from the `Cookie` request headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Attributes for a `Set-Cookie` header
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub max_age_secs: i64,
    pub secure: bool,
}

/// Builds a `Set-Cookie` value: HttpOnly, SameSite=Lax, Path=/
pub fn set_cookie_header(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!(
        "{name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        options.max_age_secs
    );
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds a `Set-Cookie` value that deletes the cookie
pub fn clear_cookie_header(name: &str, secure: bool) -> String {
    set_cookie_header(
        name,
        "",
        &CookieOptions {
            max_age_secs: 0,
            secure,
        },
    )
}

/// `Set-Cookie` value persisting the active team
pub fn active_team_cookie(team_id: Uuid, secret: &str, secure: bool) -> String {
    set_cookie_header(
        ACTIVE_TEAM_COOKIE,
        &sign(&team_id.to_string(), secret),
        &CookieOptions {
            max_age_secs: ACTIVE_TEAM_MAX_AGE_SECS,
            secure,
        },
    )
}

/// Reads and verifies the active team cookie
///
/// Missing, tampered or malformed cookies all yield `None`.
pub fn read_active_team(headers: &HeaderMap, secret: &str) -> Option<Uuid> {
    let raw = read_cookie(headers, ACTIVE_TEAM_COOKIE)?;

    match verify(raw, secret) {
        Ok(value) => Uuid::parse_str(&value).ok(),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring active team cookie");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "cookie-secret-at-least-32-bytes-long!!";

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_sign_and_verify() {
        let signed = sign("hello", SECRET);
        assert!(signed.starts_with("hello."));
        assert_eq!(verify(&signed, SECRET), Ok("hello".to_string()));
    }

    #[test]
    fn test_tampered_value_rejected() {
        let signed = sign("team-a", SECRET);
        let tampered = signed.replacen("team-a", "team-b", 1);

        assert_eq!(verify(&tampered, SECRET), Err(CookieError::BadSignature));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signed = sign("team-a", SECRET);
        assert_eq!(
            verify(&signed, "another-secret-at-least-32-bytes-long"),
            Err(CookieError::BadSignature)
        );
    }

    #[test]
    fn test_unsigned_value_rejected() {
        assert_eq!(verify("plainvalue", SECRET), Err(CookieError::Unsigned));
    }

    #[test]
    fn test_read_cookie_among_many() {
        let headers = headers_with_cookie("theme=dark; active_team=abc.def; lang=fr");
        assert_eq!(read_cookie(&headers, "active_team"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "lang"), Some("fr"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_active_team_cookie_round_trip() {
        let team_id = Uuid::new_v4();
        let set_cookie = active_team_cookie(team_id, SECRET, true);

        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        assert!(set_cookie.contains("Path=/"));
        assert!(set_cookie.contains("Max-Age=7776000"));
        assert!(set_cookie.ends_with("; Secure"));

        let pair = set_cookie.split(';').next().unwrap();
        let headers = headers_with_cookie(pair);
        assert_eq!(read_active_team(&headers, SECRET), Some(team_id));
    }

    #[test]
    fn test_forged_active_team_ignored() {
        let headers = headers_with_cookie(&format!("active_team={}", Uuid::new_v4()));
        assert_eq!(read_active_team(&headers, SECRET), None);
    }

    #[test]
    fn test_insecure_cookie_in_development() {
        let set_cookie = active_team_cookie(Uuid::new_v4(), SECRET, false);
        assert!(!set_cookie.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie() {
        let cleared = clear_cookie_header(TENANT_SESSION_COOKIE, false);
        assert!(cleared.starts_with("tenant_session=;"));
        assert!(cleared.contains("Max-Age=0"));
    }
}
