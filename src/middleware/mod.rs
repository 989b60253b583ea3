//! Request-path pieces of the API: origin policy, session gate and auth guard.
//!
//! Every request passes through them in a fixed order:
//! origin check → CORS headers → session gate → route guard → handler.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mailsort_gate::middleware::{AppState, MemorySessionStore, SubjectAccountResolver};
//!
//! let config = AppConfig::from_env()?;
//! let state = AppState::new(config, MemorySessionStore::new(), SubjectAccountResolver);
//!
//! // Routes nested here sit behind `require_auth`.
//! let api = Router::new().route("/categories", get(list_categories));
//! let app = mailsort_gate::build_router(state, api);
//! ```

mod cookies;
mod error;
mod guard;
mod origin;
mod routes;
mod session;
mod state;
mod store;
mod traits;

pub use error::AuthError;
pub(crate) use error::internal_error_response;
pub use guard::{AuthUser, optional_auth, require_auth};
pub use origin::{AllowedOrigins, cors_layer, reject_disallowed_origin};
pub use routes::auth_routes;
pub use session::{
    Principal, ProviderTokens, Session, SessionRecord, is_secure_transport, session_gate,
};
pub use state::AppState;
pub use store::{MemorySessionStore, SessionStore, StoreError};
pub use traits::{AccountResolver, ResolveError, SubjectAccountResolver};
