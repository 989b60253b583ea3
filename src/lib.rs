#![doc = include_str!("../README.md")]

pub mod app;
#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod observability;
pub mod secret;
pub mod types;

// Re-exports for convenient access
pub use app::build_router;
#[cfg(feature = "client")]
pub use client::ApiClient;
pub use config::{AppConfig, CookiePolicy, Environment};
pub use error::Error;
pub use middleware::{
    AccountResolver, AllowedOrigins, AppState, AuthError, AuthUser, MemorySessionStore,
    Principal, Session, SessionStore, SubjectAccountResolver,
};
pub use oauth::{AuthClient, OAuthConfig, TokenResponse, UserInfo};
pub use types::{SessionId, UserId};
