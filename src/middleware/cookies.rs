use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::CookiePolicy;
use crate::types::SessionId;

const PKCE_COOKIE_NAME: &str = "oauth_pkce";
const STATE_COOKIE_NAME: &str = "oauth_state";

/// Short-lived cookies carrying the PKCE verifier and `state` to the callback.
///
/// Always `SameSite=Lax`: the provider's redirect back is a top-level
/// cross-site navigation, which `Lax` still lets through.
pub(super) fn login_flow_cookies(
    code_verifier: &str,
    state: &str,
    policy: CookiePolicy,
    auth_path: &str,
) -> (Cookie<'static>, Cookie<'static>) {
    let build = |name: &'static str, value: &str| {
        Cookie::build((name, value.to_string()))
            .http_only(true)
            .secure(policy.secure())
            .same_site(SameSite::Lax)
            .path(auth_path.to_string())
            .max_age(Duration::minutes(10))
            .build()
    };

    (build(PKCE_COOKIE_NAME, code_verifier), build(STATE_COOKIE_NAME, state))
}

pub(super) fn clear_login_flow_cookies(auth_path: &str) -> (Cookie<'static>, Cookie<'static>) {
    let clear = |name: &'static str| {
        Cookie::build((name, ""))
            .path(auth_path.to_string())
            .max_age(Duration::ZERO)
            .build()
    };

    (clear(PKCE_COOKIE_NAME), clear(STATE_COOKIE_NAME))
}

/// Session cookie with the policy's name, `Secure` and `SameSite` flags.
pub(super) fn session_cookie(id: &SessionId, policy: CookiePolicy, ttl: Duration) -> Cookie<'static> {
    Cookie::build((policy.cookie_name(), id.as_str().to_string()))
        .http_only(true)
        .secure(policy.secure())
        .same_site(policy.same_site())
        .path("/")
        .max_age(ttl)
        .build()
}

pub(super) fn clear_session_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").max_age(Duration::ZERO).build()
}

pub(super) fn pkce_verifier(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(PKCE_COOKIE_NAME).map(|c| c.value().to_string())
}

pub(super) fn oauth_state(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(STATE_COOKIE_NAME).map(|c| c.value().to_string())
}
