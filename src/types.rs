use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Application user identifier.
///
/// Produced by [`AccountResolver::resolve`](crate::middleware::AccountResolver::resolve)
/// during the OAuth callback. An empty id never counts as a completed login.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Opaque session identifier, the value carried by the session cookie.
///
/// No `Display`; identifiers must not end up in log lines.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh, unguessable identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::secret::generate_session_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionId(..)")
    }
}
