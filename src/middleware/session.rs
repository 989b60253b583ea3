use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header::FORWARDED};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::PrivateCookieJar;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::cookies;
use super::error::AuthError;
use super::state::AppState;
use crate::types::{SessionId, UserId};

/// The signed-in identity exposed to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl Principal {
    /// A login only counts once both the user id and the email are known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.email.trim().is_empty()
    }
}

/// Provider tokens kept for later delegated mail calls.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl std::fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| ".."))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| ".."))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Server-side session content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub principal: Principal,
    pub tokens: ProviderTokens,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Unchanged,
    Changed,
    Destroyed,
}

#[derive(Debug)]
struct Inner {
    id: Option<SessionId>,
    record: Option<SessionRecord>,
    change: Change,
    /// Id loaded from the cookie, deleted from the store when replaced.
    replaced: Option<SessionId>,
}

/// Per-request session handle, inserted by [`session_gate`].
///
/// Holds zero or one loaded [`SessionRecord`]. Mutations are written back
/// once the handler returns, and only when something actually changed.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    fn new(loaded: Option<(SessionId, SessionRecord)>) -> Self {
        let (id, record) = match loaded {
            Some((id, record)) => (Some(id), Some(record)),
            None => (None, None),
        };
        Self {
            inner: Arc::new(Mutex::new(Inner {
                id,
                record,
                change: Change::Unchanged,
                replaced: None,
            })),
        }
    }

    /// Anonymous handle, for handlers exercised without the gate.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub fn record(&self) -> Option<SessionRecord> {
        self.inner.lock().record.clone()
    }

    #[must_use]
    pub fn principal(&self) -> Option<Principal> {
        self.inner.lock().record.as_ref().map(|r| r.principal.clone())
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.lock().record.is_some()
    }

    /// Start a signed-in session.
    ///
    /// Always issues a fresh id so an identifier from before the login can
    /// never carry the new identity.
    pub fn login(&self, principal: Principal, tokens: ProviderTokens, expires_at: OffsetDateTime) {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.id.take() {
            inner.replaced.get_or_insert(old);
        }
        inner.id = Some(SessionId::generate());
        inner.record = Some(SessionRecord {
            principal,
            tokens,
            expires_at,
        });
        inner.change = Change::Changed;
    }

    /// Replace the stored provider tokens (e.g. after a refresh).
    pub fn set_tokens(&self, tokens: ProviderTokens) {
        let mut inner = self.inner.lock();
        let Some(record) = inner.record.as_mut() else {
            return;
        };
        if record.tokens != tokens {
            record.tokens = tokens;
            if inner.change == Change::Unchanged {
                inner.change = Change::Changed;
            }
        }
    }

    /// End the session; the record is deleted and the cookie cleared.
    pub fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.record = None;
        inner.change = Change::Destroyed;
    }

    fn take_outcome(&self) -> Outcome {
        let mut inner = self.inner.lock();
        let replaced = inner.replaced.take();
        let change = inner.change;
        match change {
            Change::Unchanged => Outcome::Unchanged,
            Change::Destroyed => Outcome::Destroyed {
                ids: inner.id.take().into_iter().chain(replaced).collect(),
            },
            Change::Changed => match (inner.id.clone(), inner.record.clone()) {
                (Some(id), Some(record)) => Outcome::Saved {
                    id,
                    record,
                    replaced,
                },
                _ => Outcome::Unchanged,
            },
        }
    }
}

enum Outcome {
    Unchanged,
    Saved {
        id: SessionId,
        record: SessionRecord,
        replaced: Option<SessionId>,
    },
    Destroyed {
        ids: Vec<SessionId>,
    },
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AuthError::Internal("session gate is not installed".into()))
    }
}

/// Whether the client-facing hop used TLS.
///
/// TLS terminates at the reverse proxy, so the forwarded protocol is trusted.
#[must_use]
pub fn is_secure_transport(headers: &HeaderMap) -> bool {
    if let Some(proto) = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        return proto
            .split(',')
            .next()
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("https"));
    }

    headers
        .get(FORWARDED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|first| {
            first.split(';').any(|pair| {
                pair.trim()
                    .split_once('=')
                    .is_some_and(|(k, v)| {
                        k.trim().eq_ignore_ascii_case("proto")
                            && v.trim().trim_matches('"').eq_ignore_ascii_case("https")
                    })
            })
        })
}

/// Session gate: attaches a [`Session`] to every request.
///
/// Looks up the cookie's id, drops expired records, refreshes the expiry of
/// live ones, and after the handler persists the session only if it changed.
pub async fn session_gate(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let policy = state.config.cookie_policy();
    let secure_transport = is_secure_transport(request.headers());

    let loaded = match jar.get(policy.cookie_name()) {
        Some(cookie) => load(&state, SessionId::from(cookie.value().to_string())).await?,
        None => None,
    };

    let session = Session::new(loaded);
    request.extensions_mut().insert(session.clone());

    let response = next.run(request).await;

    match session.take_outcome() {
        Outcome::Unchanged => Ok(response),
        Outcome::Destroyed { ids } => {
            for id in &ids {
                state
                    .sessions
                    .delete_dyn(id)
                    .await
                    .map_err(|e| AuthError::Store(e.to_string()))?;
            }
            let jar = jar.remove(cookies::clear_session_cookie(policy.cookie_name()));
            Ok((jar, response).into_response())
        }
        Outcome::Saved {
            id,
            record,
            replaced,
        } => {
            if let Some(old) = replaced {
                state
                    .sessions
                    .delete_dyn(&old)
                    .await
                    .map_err(|e| AuthError::Store(e.to_string()))?;
            }
            state
                .sessions
                .put_dyn(&id, record)
                .await
                .map_err(|e| AuthError::Store(e.to_string()))?;

            if policy.secure() && !secure_transport {
                tracing::warn!("Not issuing secure session cookie over an insecure connection");
                return Ok(response);
            }

            let cookie = cookies::session_cookie(&id, policy, state.config.session_ttl);
            Ok((jar.add(cookie), response).into_response())
        }
    }
}

async fn load(
    state: &AppState,
    id: SessionId,
) -> Result<Option<(SessionId, SessionRecord)>, AuthError> {
    let Some(mut record) = state
        .sessions
        .get_dyn(&id)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?
    else {
        return Ok(None);
    };

    let now = OffsetDateTime::now_utc();
    if record.is_expired_at(now) {
        state
            .sessions
            .delete_dyn(&id)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        return Ok(None);
    }

    let expires_at = now + state.config.session_ttl;
    state
        .sessions
        .touch_dyn(&id, expires_at)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;
    record.expires_at = expires_at;

    Ok(Some((id, record)))
}
