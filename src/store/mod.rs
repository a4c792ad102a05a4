//! Entity persistence
//!
//! Every tournament entity is stored as a JSON document in the `entities`
//! table, keyed by `(kind, id)`. Read-modify-write goes through
//! [`EntityStore::modify`], which serializes concurrent updates of the same
//! entity and only writes when the update succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::bracket::Bracket;
use crate::combat::Combat;
use crate::error::{EngineError, EngineResult};
use crate::pools::Pool;
use crate::roster::{Fighter, Team};
use crate::tatami::Tatami;

/// A storable tournament entity
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind tag in the `entities` table and in notifications
    const KIND: &'static str;

    fn id(&self) -> &str;
}

impl Entity for Team {
    const KIND: &'static str = "team";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Fighter {
    const KIND: &'static str = "fighter";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Combat {
    const KIND: &'static str = "combat";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Tatami {
    const KIND: &'static str = "tatami";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Pool {
    const KIND: &'static str = "pool";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Bracket {
    const KIND: &'static str = "bracket";

    fn id(&self) -> &str {
        &self.id
    }
}

type LockKey = (&'static str, String);

/// Entity storage with database backing
pub struct EntityStore {
    pool: SqlitePool,
    locks: parking_lot::Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityStore {
    /// Create a new entity store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, kind: &'static str, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry((kind, id.to_string()))
            .or_default()
            .clone()
    }

    /// Forget the lock of an entity nobody else is waiting on
    fn release_lock(&self, kind: &'static str, id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock();
        let key = (kind, id.to_string());
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    /// Get an entity by ID
    pub async fn get<T: Entity>(&self, id: &str) -> EngineResult<Option<T>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM entities WHERE kind = ? AND id = ?")
                .bind(T::KIND)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((body,)) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Get an entity by ID, failing with `NotFound`
    pub async fn require<T: Entity>(&self, id: &str) -> EngineResult<T> {
        self.get(id)
            .await?
            .ok_or_else(|| EngineError::not_found(T::KIND, id))
    }

    /// All entities of a kind, in creation order
    pub async fn list<T: Entity>(&self) -> EngineResult<Vec<T>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT body FROM entities WHERE kind = ? ORDER BY rowid")
                .bind(T::KIND)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(body,)| serde_json::from_str(&body).map_err(EngineError::from))
            .collect()
    }

    /// Insert a new entity; an existing ID is a validation error
    pub async fn create<T: Entity>(&self, entity: &T) -> EngineResult<()> {
        let body = serde_json::to_string(entity)?;

        let result = sqlx::query("INSERT INTO entities (kind, id, body) VALUES (?, ?, ?)")
            .bind(T::KIND)
            .bind(entity.id())
            .bind(&body)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                EngineError::validation(format!("{} {} already exists", T::KIND, entity.id())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite an existing entity
    pub async fn update<T: Entity>(&self, entity: &T) -> EngineResult<()> {
        let body = serde_json::to_string(entity)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        let result =
            sqlx::query("UPDATE entities SET body = ?, updated_at = ? WHERE kind = ? AND id = ?")
                .bind(&body)
                .bind(&updated_at)
                .bind(T::KIND)
                .bind(entity.id())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::not_found(T::KIND, entity.id()));
        }
        Ok(())
    }

    /// Insert or overwrite
    pub async fn save<T: Entity>(&self, entity: &T) -> EngineResult<()> {
        let body = serde_json::to_string(entity)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO entities (kind, id, body) VALUES (?, ?, ?)
            ON CONFLICT(kind, id) DO UPDATE SET body = excluded.body, updated_at = ?
            "#,
        )
        .bind(T::KIND)
        .bind(entity.id())
        .bind(&body)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete an entity; returns whether it existed
    pub async fn delete<T: Entity>(&self, id: &str) -> EngineResult<bool> {
        let lock = self.lock_for(T::KIND, id);
        let guard = lock.lock().await;

        let result = sqlx::query("DELETE FROM entities WHERE kind = ? AND id = ?")
            .bind(T::KIND)
            .bind(id)
            .execute(&self.pool)
            .await;

        drop(guard);
        self.release_lock(T::KIND, id, lock);
        Ok(result?.rows_affected() > 0)
    }

    /// Delete every entity of a kind; returns how many were removed
    pub async fn delete_all<T: Entity>(&self) -> EngineResult<u64> {
        let result = sqlx::query("DELETE FROM entities WHERE kind = ?")
            .bind(T::KIND)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Load, update and persist one entity while holding its lock.
    ///
    /// `f` runs on a copy; when it fails nothing is written and the stored
    /// entity stays as it was.
    pub async fn modify<T, R, F>(&self, id: &str, f: F) -> EngineResult<(T, R)>
    where
        T: Entity,
        F: FnOnce(&mut T) -> EngineResult<R>,
    {
        let lock = self.lock_for(T::KIND, id);
        let guard = lock.lock().await;

        let result = self.modify_locked(id, f).await;

        drop(guard);
        self.release_lock(T::KIND, id, lock);
        result
    }

    async fn modify_locked<T, R, F>(&self, id: &str, f: F) -> EngineResult<(T, R)>
    where
        T: Entity,
        F: FnOnce(&mut T) -> EngineResult<R>,
    {
        let mut entity: T = self.require(id).await?;
        let out = f(&mut entity)?;
        self.update(&entity).await?;
        Ok((entity, out))
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn store() -> EntityStore {
        let db = Database::new(None).await.unwrap();
        EntityStore::new(db.pool().clone())
    }

    fn team(id: &str) -> Team {
        Team::new(Some(id), &format!("Team {id}"), None).unwrap()
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let store = store().await;
        store.create(&team("a")).await.unwrap();
        store.create(&team("b")).await.unwrap();

        let got: Team = store.require("a").await.unwrap();
        assert_eq!(got.name, "Team a");
        assert!(store.get::<Team>("zz").await.unwrap().is_none());
        // same ID under another kind is a different entity
        assert!(store.get::<Fighter>("a").await.unwrap().is_none());

        let all: Vec<Team> = store.list().await.unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = store().await;
        store.create(&team("a")).await.unwrap();
        let err = store.create(&team("a")).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_modify_persists_on_success_only() {
        let store = store().await;
        store.create(&team("a")).await.unwrap();

        let (updated, _) = store
            .modify::<Team, _, _>("a", |t| {
                t.credit(3, 1);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.points, 3);

        let err = store
            .modify::<Team, (), _>("a", |t| {
                t.credit(100, 1);
                Err(EngineError::validation("rejected"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let stored: Team = store.require("a").await.unwrap();
        assert_eq!((stored.points, stored.wins), (3, 1));
    }

    #[tokio::test]
    async fn test_modify_missing_entity() {
        let store = store().await;
        let err = store
            .modify::<Team, (), _>("ghost", |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: "team", .. }));
    }

    #[tokio::test]
    async fn test_concurrent_modify_is_serialized() {
        let store = Arc::new(store().await);
        store.create(&team("a")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .modify::<Team, _, _>("a", |t| {
                        t.credit(1, 0);
                        Ok(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored: Team = store.require("a").await.unwrap();
        assert_eq!(stored.points, 20);
        assert_eq!(store.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store().await;
        store.create(&team("a")).await.unwrap();
        store.save(&team("b")).await.unwrap();
        assert!(store.delete::<Team>("a").await.unwrap());
        assert!(!store.delete::<Team>("a").await.unwrap());
        assert_eq!(store.delete_all::<Team>().await.unwrap(), 1);
        assert!(store.list::<Team>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_locks_are_released() {
        let store = store().await;
        store.create(&team("a")).await.unwrap();
        store
            .modify::<Team, _, _>("a", |t| {
                t.credit(3, 1);
                Ok(())
            })
            .await
            .unwrap();
        assert!(store
            .modify::<Team, _, _>("ghost", |_| Ok(()))
            .await
            .is_err());
        assert_eq!(store.tracked_locks(), 0);

        store.delete::<Team>("a").await.unwrap();
        assert_eq!(store.tracked_locks(), 0);
    }
}
