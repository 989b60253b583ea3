use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256, Sha512};

use crate::error::Error;

/// Generates a session identifier from 32 random bytes (43 URL-safe chars).
#[must_use]
pub fn generate_session_id() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates the `OAuth2` `state` parameter (16 random bytes, 22 chars).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a PKCE code verifier (RFC 7636, 64 chars).
#[must_use]
pub fn generate_code_verifier() -> String {
    let random_bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Generates a throwaway session secret for local runs.
#[must_use]
pub fn generate_ephemeral_secret() -> String {
    let random_bytes: [u8; 64] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Stretches a session secret of any length into the 64-byte cookie key.
///
/// # Errors
///
/// Returns [`Error::Config`] if the secret is empty.
pub fn cookie_key_from_secret(secret: &str) -> Result<Key, Error> {
    if secret.is_empty() {
        return Err(Error::Config("SESSION_SECRET must not be empty".into()));
    }
    let digest = Sha512::digest(secret.as_bytes());
    Key::try_from(digest.as_slice())
        .map_err(|_| Error::Config("could not derive cookie key from SESSION_SECRET".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_url_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), 43);
        assert!(is_url_safe(&id), "session id should be URL-safe: {id}");
    }

    #[test]
    fn test_state_and_verifier_lengths() {
        assert_eq!(generate_state().len(), 22);
        assert_eq!(generate_code_verifier().len(), 64);
    }

    #[test]
    fn test_code_challenge_deterministic() {
        assert_eq!(code_challenge("verifier"), code_challenge("verifier"));
        assert_ne!(code_challenge("verifier_1"), code_challenge("verifier_2"));
    }

    #[test]
    fn test_code_challenge_rfc7636_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_cookie_key_is_stable_per_secret() {
        let a = cookie_key_from_secret("short").unwrap();
        let b = cookie_key_from_secret("short").unwrap();
        let c = cookie_key_from_secret("other").unwrap();
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(cookie_key_from_secret(""), Err(Error::Config(_))));
    }
}
