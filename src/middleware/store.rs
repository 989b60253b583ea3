use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use time::OffsetDateTime;

use super::session::SessionRecord;
use crate::types::SessionId;

/// Error type for store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Session persistence, keyed by session id.
///
/// Each request touches at most one record, so implementations need no
/// cross-key locking. Concurrent writes to the same key may race; last write
/// wins.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
///         let raw: Option<String> = self.conn().await?.get(id.as_str()).await?;
///         Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?)
///     }
///     // ...
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a record. Expiry is checked by the caller.
    fn get(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send;

    /// Insert or replace a record.
    fn put(
        &self,
        id: &SessionId,
        record: SessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove a record. Removing a missing id is not an error.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Move a record's expiry without rewriting its content.
    fn touch(
        &self,
        id: &SessionId,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: SessionStore> SessionStore for Arc<T> {
    fn get(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<SessionRecord>, StoreError>> + Send {
        (**self).get(id)
    }

    fn put(
        &self,
        id: &SessionId,
        record: SessionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).put(id, record)
    }

    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).delete(id)
    }

    fn touch(
        &self,
        id: &SessionId,
        expires_at: OffsetDateTime,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).touch(id, expires_at)
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe wrapper for [`SessionStore`] (needed for `Arc<dyn>`).
pub(crate) trait DynSessionStore: Send + Sync {
    fn get_dyn<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, StoreError>>;

    fn put_dyn<'a>(
        &'a self,
        id: &'a SessionId,
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn delete_dyn<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<(), StoreError>>;

    fn touch_dyn<'a>(
        &'a self,
        id: &'a SessionId,
        expires_at: OffsetDateTime,
    ) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T: SessionStore> DynSessionStore for T {
    fn get_dyn<'a>(
        &'a self,
        id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionRecord>, StoreError>> {
        Box::pin(self.get(id))
    }

    fn put_dyn<'a>(
        &'a self,
        id: &'a SessionId,
        record: SessionRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.put(id, record))
    }

    fn delete_dyn<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.delete(id))
    }

    fn touch_dyn<'a>(
        &'a self,
        id: &'a SessionId,
        expires_at: OffsetDateTime,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.touch(id, expires_at))
    }
}

/// In-process store. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    records: DashMap<SessionId, SessionRecord>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every expired record; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired_at(now));
        before.saturating_sub(self.records.len())
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn put(&self, id: &SessionId, record: SessionRecord) -> Result<(), StoreError> {
        self.records.insert(id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.records.remove(id);
        Ok(())
    }

    async fn touch(&self, id: &SessionId, expires_at: OffsetDateTime) -> Result<(), StoreError> {
        if let Some(mut record) = self.records.get_mut(id) {
            record.expires_at = expires_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::session::{Principal, ProviderTokens};
    use crate::types::UserId;
    use time::Duration;

    fn record(expires_in: Duration) -> SessionRecord {
        SessionRecord {
            principal: Principal {
                id: UserId::from("u1".to_string()),
                email: "u1@example.com".into(),
                name: None,
                picture: None,
            },
            tokens: ProviderTokens::default(),
            expires_at: OffsetDateTime::now_utc() + expires_in,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();

        assert!(store.get(&id).await.unwrap().is_none());

        store.put(&id, record(Duration::hours(1))).await.unwrap();
        let found = store.get(&id).await.unwrap().unwrap();
        assert_eq!(found.principal.email, "u1@example.com");

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
        store.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_touch_moves_expiry_only() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.put(&id, record(Duration::minutes(1))).await.unwrap();

        let later = OffsetDateTime::now_utc() + Duration::hours(24);
        store.touch(&id, later).await.unwrap();

        let found = store.get(&id).await.unwrap().unwrap();
        assert_eq!(found.expires_at, later);
        assert_eq!(found.principal.id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_touch_missing_is_noop() {
        let store = MemorySessionStore::new();
        store
            .touch(&SessionId::generate(), OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemorySessionStore::new();
        store
            .put(&SessionId::generate(), record(Duration::hours(1)))
            .await
            .unwrap();
        store
            .put(&SessionId::generate(), record(-Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_purge_tolerates_concurrent_inserts() {
        let store = MemorySessionStore::new();
        for _ in 0..64 {
            store
                .records
                .insert(SessionId::generate(), record(-Duration::hours(1)));
        }

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..2_000 {
                    store
                        .records
                        .insert(SessionId::generate(), record(Duration::hours(1)));
                }
            });
            for _ in 0..200 {
                store.purge_expired();
            }
        });

        assert!(store.records.iter().all(|r| !r.is_expired_at(OffsetDateTime::now_utc())));
    }

    #[tokio::test]
    async fn test_dyn_wrapper_delegates() {
        let store: std::sync::Arc<dyn DynSessionStore> =
            std::sync::Arc::new(MemorySessionStore::new());
        let id = SessionId::generate();

        store.put_dyn(&id, record(Duration::hours(1))).await.unwrap();
        assert!(store.get_dyn(&id).await.unwrap().is_some());
        store.delete_dyn(&id).await.unwrap();
        assert!(store.get_dyn(&id).await.unwrap().is_none());
    }
}
