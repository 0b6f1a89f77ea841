use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{db::Db, store::StoreError};

pub const LESSON_COMPLETIONS: &str = "lessonCompletions";

pub fn last_viewed_key(course_id: &str) -> String {
    format!("lastViewedLesson_{}", course_id)
}

pub fn video_progress_key(lesson_id: &str) -> String {
    format!("videoProgress_{}", lesson_id)
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, learner: &str, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, learner: &str, key: &str, value: String) -> Result<(), StoreError>;
    async fn remove(&self, learner: &str, key: &str) -> Result<bool, StoreError>;
    /// Drops `key` for every learner; returns how many entries went away.
    async fn remove_everywhere(&self, key: &str) -> Result<u64, StoreError>;
    async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError>;
}

#[derive(Default)]
pub struct MemoryKv {
    // learner -> key -> value
    map: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, learner: &str, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.map.read().await;
        Ok(map.get(learner).and_then(|m| m.get(key)).cloned())
    }

    async fn set(&self, learner: &str, key: &str, value: String) -> Result<(), StoreError> {
        let mut map = self.map.write().await;
        map.entry(learner.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, learner: &str, key: &str) -> Result<bool, StoreError> {
        let mut map = self.map.write().await;
        Ok(map
            .get_mut(learner)
            .and_then(|m| m.remove(key))
            .is_some())
    }

    async fn remove_everywhere(&self, key: &str) -> Result<u64, StoreError> {
        let mut map = self.map.write().await;
        let mut n = 0;
        for entries in map.values_mut() {
            if entries.remove(key).is_some() {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let map = self.map.read().await;
        let mut out: Vec<(String, String)> = map
            .iter()
            .filter_map(|(learner, m)| m.get(key).map(|v| (learner.clone(), v.clone())))
            .collect();
        out.sort();
        Ok(out)
    }
}

pub struct PgKv {
    db: Db,
}

impl PgKv {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for PgKv {
    async fn get(&self, learner: &str, key: &str) -> Result<Option<String>, StoreError> {
        let v: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_entries WHERE learner_id=$1 AND key=$2")
                .bind(learner)
                .bind(key)
                .fetch_optional(&self.db)
                .await?;
        Ok(v)
    }

    async fn set(&self, learner: &str, key: &str, value: String) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (learner_id, key, value)
            VALUES ($1,$2,$3)
            ON CONFLICT (learner_id, key)
            DO UPDATE SET value=EXCLUDED.value, updated_at=now()
            "#,
        )
        .bind(learner)
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn remove(&self, learner: &str, key: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM kv_entries WHERE learner_id=$1 AND key=$2")
            .bind(learner)
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_everywhere(&self, key: &str) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM kv_entries WHERE key=$1")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected())
    }

    async fn entries(&self, key: &str) -> Result<Vec<(String, String)>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT learner_id, value FROM kv_entries WHERE key=$1 ORDER BY learner_id",
        )
        .bind(key)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_scoped_per_learner() {
        let kv = MemoryKv::new();
        kv.set("ann", "k", "1".into()).await.unwrap();
        kv.set("bob", "k", "2".into()).await.unwrap();
        assert_eq!(kv.get("ann", "k").await.unwrap().as_deref(), Some("1"));
        assert_eq!(kv.get("cat", "k").await.unwrap(), None);
        assert_eq!(
            kv.entries("k").await.unwrap(),
            vec![("ann".to_string(), "1".to_string()), ("bob".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn remove_everywhere_only_touches_that_key() {
        let kv = MemoryKv::new();
        kv.set("ann", &last_viewed_key("c1"), "l1".into()).await.unwrap();
        kv.set("bob", &last_viewed_key("c1"), "l2".into()).await.unwrap();
        kv.set("bob", &last_viewed_key("c2"), "l9".into()).await.unwrap();

        assert_eq!(kv.remove_everywhere(&last_viewed_key("c1")).await.unwrap(), 2);
        assert!(kv.entries(&last_viewed_key("c1")).await.unwrap().is_empty());
        assert_eq!(
            kv.get("bob", &last_viewed_key("c2")).await.unwrap().as_deref(),
            Some("l9")
        );
        assert!(!kv.remove("ann", "missing").await.unwrap());
    }

    #[test]
    fn key_formats() {
        assert_eq!(last_viewed_key("abc"), "lastViewedLesson_abc");
        assert_eq!(video_progress_key("l-1"), "videoProgress_l-1");
    }
}
