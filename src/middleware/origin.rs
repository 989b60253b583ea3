use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, SET_COOKIE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::error::AuthError;
use super::state::AppState;

/// Origins allowed to make credentialed cross-origin requests.
///
/// Parsed once from `FRONTEND_URL` at startup. Matching is exact and
/// case-sensitive on the serialized origin (scheme, host and port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// No restriction configured.
    Any,
    Single(String),
    List(Vec<String>),
}

impl AllowedOrigins {
    /// A comma makes a list; any other non-blank value is a single origin.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains(',') {
            let origins: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if origins.is_empty() {
                Self::Any
            } else {
                Self::List(origins)
            }
        } else if raw.is_empty() {
            Self::Any
        } else {
            Self::Single(raw.to_string())
        }
    }

    /// Whether a request with this `Origin` may proceed.
    ///
    /// Requests without an origin (curl, server-to-server) are always allowed.
    #[must_use]
    pub fn permits(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        match self {
            Self::Any => true,
            Self::Single(allowed) => allowed == origin,
            Self::List(allowed) => allowed.iter().any(|o| o == origin),
        }
    }

    /// The origin used as the frontend base for redirects.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Single(origin) => Some(origin),
            Self::List(origins) => origins.first().map(String::as_str),
        }
    }
}

/// Rejects disallowed origins before any other layer sees the request.
///
/// Runs outside the CORS layer, so a rejection carries no CORS headers.
pub async fn reject_disallowed_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let permitted = match request.headers().get(ORIGIN) {
        None => true,
        Some(value) => value
            .to_str()
            .is_ok_and(|origin| state.config.allowed_origins.permits(Some(origin))),
    };

    if !permitted {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Origin rejected by CORS policy"
        );
        return Err(AuthError::OriginRejected);
    }

    Ok(next.run(request).await)
}

/// CORS response headers for permitted origins; also answers preflights.
///
/// The caller's origin is echoed back, never `*`, since credentials are enabled.
#[must_use]
pub fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let origins = Arc::new(origins.clone());
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|origin| origins.permits(Some(origin)))
        }))
        .allow_credentials(true)
        .allow_headers([
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            ACCEPT,
            AUTHORIZATION,
            SET_COOKIE,
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .expose_headers([SET_COOKIE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shapes() {
        assert_eq!(AllowedOrigins::parse(""), AllowedOrigins::Any);
        assert_eq!(AllowedOrigins::parse("   "), AllowedOrigins::Any);
        assert_eq!(
            AllowedOrigins::parse("https://app.example.com"),
            AllowedOrigins::Single("https://app.example.com".into())
        );
        assert_eq!(
            AllowedOrigins::parse("https://a.com, https://b.com ,"),
            AllowedOrigins::List(vec!["https://a.com".into(), "https://b.com".into()])
        );
        assert_eq!(AllowedOrigins::parse(" , "), AllowedOrigins::Any);
    }

    #[test]
    fn test_missing_origin_always_permitted() {
        for origins in [
            AllowedOrigins::Any,
            AllowedOrigins::parse("https://app.example.com"),
            AllowedOrigins::parse("https://a.com,https://b.com"),
        ] {
            assert!(origins.permits(None));
        }
    }

    #[test]
    fn test_single_origin_exact_match() {
        let origins = AllowedOrigins::parse("https://app.example.com");
        assert!(origins.permits(Some("https://app.example.com")));
        assert!(!origins.permits(Some("https://evil.example.com")));
        assert!(!origins.permits(Some("http://app.example.com")));
        assert!(!origins.permits(Some("https://app.example.com:8443")));
        assert!(!origins.permits(Some("https://APP.example.com")));
    }

    #[test]
    fn test_list_membership() {
        let origins = AllowedOrigins::parse("https://a.com,https://b.com");
        assert!(origins.permits(Some("https://a.com")));
        assert!(origins.permits(Some("https://b.com")));
        assert!(!origins.permits(Some("https://c.com")));
        assert!(!origins.permits(Some("https://a.com.evil.net")));
    }

    #[test]
    fn test_any_permits_everything() {
        assert!(AllowedOrigins::Any.permits(Some("https://whatever.example")));
    }

    #[test]
    fn test_primary_origin() {
        assert_eq!(AllowedOrigins::Any.primary(), None);
        assert_eq!(
            AllowedOrigins::parse("https://a.com,https://b.com").primary(),
            Some("https://a.com")
        );
    }
}
