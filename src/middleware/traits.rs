use std::future::Future;
use std::pin::Pin;

use crate::oauth::{TokenResponse, UserInfo};
use crate::types::UserId;

/// Error type for resolver implementations.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-provided account management.
///
/// Called during the OAuth callback to find or create the signed-in user.
/// This is where the mail account and its provider tokens get persisted.
///
/// # Example
///
/// ```rust,ignore
/// impl AccountResolver for Accounts {
///     async fn resolve(&self, info: &UserInfo, tokens: &TokenResponse) -> Result<UserId, ResolveError> {
///         let user = self.repo.upsert_google_account(&info.sub, info.email.as_deref()).await?;
///         self.repo.save_tokens(&user.id, tokens).await?;
///         Ok(UserId::from(user.id.to_string()))
///     }
/// }
/// ```
pub trait AccountResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        user_info: &UserInfo,
        tokens: &TokenResponse,
    ) -> impl Future<Output = Result<UserId, ResolveError>> + Send;
}

/// Uses the provider's subject claim as the user id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectAccountResolver;

impl AccountResolver for SubjectAccountResolver {
    async fn resolve(
        &self,
        user_info: &UserInfo,
        _tokens: &TokenResponse,
    ) -> Result<UserId, ResolveError> {
        if user_info.sub.trim().is_empty() {
            return Err("provider returned an empty subject".into());
        }
        Ok(UserId::from(user_info.sub.clone()))
    }
}

/// Object-safe wrapper for [`AccountResolver`].
pub(crate) trait DynAccountResolver: Send + Sync {
    fn resolve_dyn<'a>(
        &'a self,
        user_info: &'a UserInfo,
        tokens: &'a TokenResponse,
    ) -> Pin<Box<dyn Future<Output = Result<UserId, ResolveError>> + Send + 'a>>;
}

impl<T: AccountResolver> DynAccountResolver for T {
    fn resolve_dyn<'a>(
        &'a self,
        user_info: &'a UserInfo,
        tokens: &'a TokenResponse,
    ) -> Pin<Box<dyn Future<Output = Result<UserId, ResolveError>> + Send + 'a>> {
        Box::pin(self.resolve(user_info, tokens))
    }
}
