use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::store::{DynSessionStore, SessionStore};
use super::traits::{AccountResolver, DynAccountResolver};
use crate::config::AppConfig;
use crate::oauth::AuthClient;

/// Shared state for the pipeline and the auth handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) config: Arc<AppConfig>,
    pub(crate) client: Arc<AuthClient>,
    pub(crate) sessions: Arc<dyn DynSessionStore>,
    pub(crate) accounts: Arc<dyn DynAccountResolver>,
}

impl AppState {
    pub fn new<S, A>(config: AppConfig, sessions: S, accounts: A) -> Self
    where
        S: SessionStore,
        A: AccountResolver,
    {
        let client = AuthClient::new(config.oauth.clone());
        Self {
            config: Arc::new(config),
            client: Arc::new(client),
            sessions: Arc::new(sessions),
            accounts: Arc::new(accounts),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.config.cookie_key.clone()
    }
}
