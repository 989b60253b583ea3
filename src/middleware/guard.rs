use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use super::error::AuthError;
use super::session::{Principal, Session};

/// Authenticated principal, for handlers that require a login.
///
/// Rejects with `401 {"error":"Unauthorized. Please log in."}` when there is
/// no session, the session expired, or it lacks a complete identity.
///
/// ```rust,ignore
/// async fn me(AuthUser(user): AuthUser) -> Json<Principal> {
///     Json(user)
/// }
///
/// // Known and anonymous callers both get through:
/// async fn landing(user: Option<AuthUser>) -> String {
///     match user {
///         Some(AuthUser(u)) => format!("Hello, {}", u.email),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

/// Checks the session attached by the gate. Only boolean signals are logged.
fn authenticate(parts: &Parts) -> Option<Principal> {
    if let Some(user) = parts.extensions.get::<AuthUser>() {
        return Some(user.0.clone());
    }

    let session = parts.extensions.get::<Session>();
    let principal = session
        .and_then(Session::principal)
        .filter(Principal::is_complete);

    tracing::debug!(
        has_session = session.is_some_and(Session::is_loaded),
        authenticated = principal.is_some(),
        "Auth check"
    );

    principal
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authenticate(parts).map(AuthUser).ok_or(AuthError::Unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(authenticate(parts).map(AuthUser))
    }
}

/// Guard for whole routers: rejects anonymous requests before the handler.
///
/// On success the [`AuthUser`] is stored in request extensions.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();
    let user = authenticate(&parts).ok_or(AuthError::Unauthenticated)?;
    parts.extensions.insert(AuthUser(user));
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Pass-through counterpart of [`require_auth`]; never rejects.
///
/// Handlers behind it read `Option<AuthUser>` to tell callers apart.
pub async fn optional_auth(request: Request, next: Next) -> Response {
    next.run(request).await
}
