use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use super::cookies;
use super::guard::AuthUser;
use super::session::{Principal, ProviderTokens, Session};
use super::state::AppState;
use crate::oauth::{TokenResponse, UserInfo};

const AUTH_FAILED: &str = "auth_failed";

/// Authentication routes, relative to `/api/auth`.
///
/// - `GET /google`: start sign-in
/// - `GET /google/callback`: provider redirect target
/// - `GET /user`: current principal (login required)
/// - `POST /logout`: end the session (login required)
/// - `GET /dev-login`: only when enabled outside staging/production
pub fn auth_routes(dev_login_enabled: bool) -> Router<AppState> {
    let mut router = Router::new()
        .route("/google", get(login))
        .route("/google/callback", get(callback))
        .route("/user", get(current_user))
        .route("/logout", post(logout));

    if dev_login_enabled {
        router = router.route("/dev-login", get(dev_login));
    }

    router
}

// ── Login ──────────────────────────────────────────────────────────

async fn login(State(state): State<AppState>, jar: PrivateCookieJar) -> (PrivateCookieJar, Redirect) {
    let auth_req = state.client.authorization_url();

    let (verifier_cookie, state_cookie) = cookies::login_flow_cookies(
        &auth_req.code_verifier,
        &auth_req.state,
        state.config.cookie_policy(),
        &state.config.auth_path,
    );

    (
        jar.add(verifier_cookie).add(state_cookie),
        Redirect::to(&auth_req.url),
    )
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    State(state): State<AppState>,
    session: Session,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let (clear_verifier, clear_state) = cookies::clear_login_flow_cookies(&state.config.auth_path);
    let stored_state = cookies::oauth_state(&jar);
    let code_verifier = cookies::pkce_verifier(&jar);
    let jar = jar.remove(clear_verifier).remove(clear_state);

    match complete_login(&state, &session, params, stored_state, code_verifier).await {
        Ok(()) => (jar, Redirect::to(&state.config.success_redirect())).into_response(),
        Err(reason) => {
            tracing::warn!(reason, "Google sign-in failed");
            (jar, Redirect::to(&state.config.failure_redirect(AUTH_FAILED))).into_response()
        }
    }
}

/// Runs the callback edge; the error is a short reason for the log.
async fn complete_login(
    state: &AppState,
    session: &Session,
    params: CallbackParams,
    stored_state: Option<String>,
    code_verifier: Option<String>,
) -> Result<(), &'static str> {
    if let Some(error) = params.error {
        tracing::debug!(error = %error, "Provider returned an error");
        return Err("provider_error");
    }

    let code = params.code.ok_or("missing_code")?;
    let received_state = params.state.ok_or("state_mismatch")?;
    let stored_state = stored_state.ok_or("state_mismatch")?;
    if received_state != stored_state {
        return Err("state_mismatch");
    }
    let code_verifier = code_verifier.ok_or("missing_verifier")?;

    let tokens = state
        .client
        .exchange_code(&code, &code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            "token_exchange_failed"
        })?;

    let user_info = state
        .client
        .get_user_info(&tokens.access_token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Userinfo request failed");
            "userinfo_failed"
        })?;

    let user_id = state
        .accounts
        .resolve_dyn(&user_info, &tokens)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Account resolution failed");
            "account_resolution_failed"
        })?;

    let principal = Principal {
        id: user_id,
        email: user_info.email.clone().unwrap_or_default(),
        name: user_info.name.clone(),
        picture: user_info.picture.clone(),
    };
    if !principal.is_complete() {
        return Err("incomplete_identity");
    }

    session.login(
        principal,
        provider_tokens(&tokens),
        OffsetDateTime::now_utc() + state.config.session_ttl,
    );

    tracing::info!("Google sign-in successful");
    Ok(())
}

fn provider_tokens(tokens: &TokenResponse) -> ProviderTokens {
    ProviderTokens {
        access_token: Some(tokens.access_token.clone()),
        refresh_token: tokens.refresh_token.clone(),
        expires_at: tokens.expires_in.map(|secs| {
            OffsetDateTime::now_utc() + Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
        }),
    }
}

// ── Current user / logout ──────────────────────────────────────────

async fn current_user(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({ "user": user }))
}

async fn logout(AuthUser(_): AuthUser, session: Session) -> Json<Value> {
    session.destroy();
    tracing::info!("User logged out");
    Json(json!({ "message": "Logged out successfully" }))
}

// ── Dev Login ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DevLoginParams {
    email: Option<String>,
}

async fn dev_login(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<DevLoginParams>,
) -> Redirect {
    // Only registered when dev login is enabled outside staging/production
    let email = params
        .email
        .filter(|e| e.contains('@'))
        .unwrap_or_else(|| "dev@localhost".to_string());

    let info = UserInfo::new(format!("dev:{email}"))
        .with_email(email.clone())
        .with_name("Dev User");

    session.login(
        Principal {
            id: info.sub.clone().into(),
            email,
            name: info.name,
            picture: None,
        },
        ProviderTokens::default(),
        OffsetDateTime::now_utc() + state.config.session_ttl,
    );

    tracing::info!("Dev login successful");
    Redirect::to(&state.config.success_redirect())
}
