use async_trait::async_trait;
use sqlx::types::Json;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{db::Db, models::Course};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("course {0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Course>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Course>, StoreError>;
    /// Appends; fails with `Duplicate` when the id is taken.
    async fn insert(&self, course: Course) -> Result<(), StoreError>;
    async fn replace(&self, course: Course) -> Result<bool, StoreError>;
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;
}

#[derive(Default)]
pub struct MemoryCourseStore {
    courses: RwLock<Vec<Course>>,
}

impl MemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_courses(courses: Vec<Course>) -> Self {
        Self { courses: RwLock::new(courses) }
    }
}

#[async_trait]
impl CourseStore for MemoryCourseStore {
    async fn list(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses.read().await.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Course>, StoreError> {
        Ok(self.courses.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn insert(&self, course: Course) -> Result<(), StoreError> {
        let mut courses = self.courses.write().await;
        if courses.iter().any(|c| c.id == course.id) {
            return Err(StoreError::Duplicate(course.id));
        }
        courses.push(course);
        Ok(())
    }

    async fn replace(&self, course: Course) -> Result<bool, StoreError> {
        let mut courses = self.courses.write().await;
        match courses.iter_mut().find(|c| c.id == course.id) {
            Some(slot) => {
                *slot = course;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut courses = self.courses.write().await;
        match courses.iter().position(|c| c.id == id) {
            Some(idx) => {
                courses.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct PgCourseStore {
    db: Db,
}

impl PgCourseStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CourseStore for PgCourseStore {
    async fn list(&self) -> Result<Vec<Course>, StoreError> {
        let rows: Vec<(Json<Course>,)> =
            sqlx::query_as("SELECT doc FROM courses ORDER BY position")
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(|(doc,)| doc.0).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Course>, StoreError> {
        let row: Option<(Json<Course>,)> = sqlx::query_as("SELECT doc FROM courses WHERE id=$1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|(doc,)| doc.0))
    }

    async fn insert(&self, course: Course) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO courses (id, doc)
            VALUES ($1,$2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&course.id)
        .bind(Json(&course))
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Duplicate(course.id));
        }
        Ok(())
    }

    async fn replace(&self, course: Course) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE courses SET doc=$2, updated_at=now() WHERE id=$1")
            .bind(&course.id)
            .bind(Json(&course))
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM courses WHERE id=$1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
