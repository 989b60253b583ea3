use std::str::FromStr;

use axum_extra::extract::cookie::{Key, SameSite};
use time::Duration;
use url::Url;

use crate::error::Error;
use crate::middleware::AllowedOrigins;
use crate::oauth::OAuthConfig;
use crate::secret;

const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Deployment environment, from `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl Environment {
    /// Staging and production run behind TLS and serve a cross-site frontend.
    #[must_use]
    pub fn is_deployed(self) -> bool {
        matches!(self, Self::Staging | Self::Production)
    }

    #[must_use]
    pub fn cookie_policy(self) -> CookiePolicy {
        if self.is_deployed() {
            CookiePolicy::Strict
        } else {
            CookiePolicy::Relaxed
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "test" => Self::Test,
            _ => Self::Development,
        })
    }
}

/// Transport assumptions behind the session cookie.
///
/// The two policies use different cookie names, so a cookie issued under one
/// is never read (or re-issued) under the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookiePolicy {
    /// HTTPS only, sent on cross-site requests.
    Strict,
    /// Plain HTTP allowed, same-site navigation only.
    Relaxed,
}

impl CookiePolicy {
    #[must_use]
    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::Strict => "__Secure-sid",
            Self::Relaxed => "sid",
        }
    }

    #[must_use]
    pub fn secure(self) -> bool {
        matches!(self, Self::Strict)
    }

    #[must_use]
    pub fn same_site(self) -> SameSite {
        match self {
            Self::Strict => SameSite::None,
            Self::Relaxed => SameSite::Lax,
        }
    }
}

/// Server configuration.
///
/// Use [`from_env()`](AppConfig::from_env) for convention-based setup,
/// or [`new()`](AppConfig::new) with `with_*` methods for full control.
#[derive(Clone)]
pub struct AppConfig {
    pub(crate) oauth: OAuthConfig,
    pub(crate) environment: Environment,
    pub(crate) allowed_origins: AllowedOrigins,
    pub(crate) frontend_url: String,
    pub(crate) cookie_key: Key,
    pub(crate) session_ttl: Duration,
    pub(crate) port: u16,
    pub(crate) auth_path: String,
    pub(crate) success_path: String,
    pub(crate) failure_path: String,
    pub(crate) dev_login_enabled: bool,
}

impl AppConfig {
    /// Development defaults: any origin, relaxed cookies, ephemeral key.
    #[must_use]
    pub fn new(oauth: OAuthConfig) -> Self {
        Self {
            oauth,
            environment: Environment::Development,
            allowed_origins: AllowedOrigins::Any,
            frontend_url: DEFAULT_FRONTEND_URL.into(),
            cookie_key: Key::generate(),
            session_ttl: Duration::hours(24),
            port: 8080,
            auth_path: "/api/auth".into(),
            success_path: "/dashboard".into(),
            failure_path: "/login".into(),
            dev_login_enabled: false,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`
    /// - `GOOGLE_CALLBACK_URL` (must be a valid URL)
    /// - `SESSION_SECRET` when `APP_ENV` is `production` or `staging`
    ///
    /// # Optional env vars
    /// - `APP_ENV`: `production`, `staging`, `test` or `development` (default)
    /// - `FRONTEND_URL`: allowed origin, or comma-separated list of origins
    /// - `GOOGLE_AUTH_URL`, `GOOGLE_TOKEN_URL`, `GOOGLE_USERINFO_URL`: endpoint overrides
    /// - `PORT`: listen port (default 8080)
    /// - `DEV_AUTH`: `"1"` or `"true"` enables the dev-login route outside staging/production
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let environment: Environment = std::env::var("APP_ENV")
            .unwrap_or_default()
            .parse()
            .unwrap_or_default();

        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let callback_url = parse_url("GOOGLE_CALLBACK_URL", &required("GOOGLE_CALLBACK_URL")?)?;

        let mut oauth = OAuthConfig::new(client_id, client_secret, callback_url);
        if let Ok(raw) = std::env::var("GOOGLE_AUTH_URL") {
            oauth = oauth.with_auth_url(parse_url("GOOGLE_AUTH_URL", &raw)?);
        }
        if let Ok(raw) = std::env::var("GOOGLE_TOKEN_URL") {
            oauth = oauth.with_token_url(parse_url("GOOGLE_TOKEN_URL", &raw)?);
        }
        if let Ok(raw) = std::env::var("GOOGLE_USERINFO_URL") {
            oauth = oauth.with_userinfo_url(parse_url("GOOGLE_USERINFO_URL", &raw)?);
        }

        let session_secret = match std::env::var("SESSION_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if environment.is_deployed() => {
                return Err(Error::Config(
                    "SESSION_SECRET is required in staging and production".into(),
                ));
            }
            _ => {
                tracing::warn!("SESSION_SECRET not set; sessions will not survive a restart");
                secret::generate_ephemeral_secret()
            }
        };

        let port = match std::env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|e| Error::Config(format!("PORT: {e}")))?,
            Err(_) => 8080,
        };

        let dev_auth = matches!(std::env::var("DEV_AUTH").as_deref(), Ok("1") | Ok("true"));

        let origins = AllowedOrigins::parse(&std::env::var("FRONTEND_URL").unwrap_or_default());

        Ok(Self::new(oauth)
            .with_environment(environment)
            .with_allowed_origins(origins)
            .with_cookie_key(secret::cookie_key_from_secret(&session_secret)?)
            .with_port(port)
            .with_dev_login_enabled(dev_auth))
    }

    /// Also resets the frontend URL to the one implied by the origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.frontend_url = origins
            .primary()
            .unwrap_or(DEFAULT_FRONTEND_URL)
            .trim_end_matches('/')
            .to_string();
        self.allowed_origins = origins;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_dev_login_enabled(mut self, enabled: bool) -> Self {
        self.dev_login_enabled = enabled;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn cookie_policy(&self) -> CookiePolicy {
        self.environment.cookie_policy()
    }

    #[must_use]
    pub fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed_origins
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Dev login never runs where cookies are strict.
    #[must_use]
    pub fn dev_login_enabled(&self) -> bool {
        self.dev_login_enabled && !self.environment.is_deployed()
    }

    pub(crate) fn success_redirect(&self) -> String {
        format!("{}{}", self.frontend_url, self.success_path)
    }

    pub(crate) fn failure_redirect(&self, code: &str) -> String {
        format!(
            "{}{}?error={}",
            self.frontend_url,
            self.failure_path,
            urlencoding::encode(code)
        )
    }
}

fn required(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::Config(format!("{name} is required")))
}

fn parse_url(name: &str, raw: &str) -> Result<Url, Error> {
    raw.parse()
        .map_err(|e| Error::Config(format!("{name}: {e}")))
}
