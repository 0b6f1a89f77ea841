use crate::{
    models::Course,
    store::{CourseStore, StoreError},
};

const DEMO_COURSES: &str = include_str!("../data/demo_courses.json");

pub fn demo_courses() -> Result<Vec<Course>, serde_json::Error> {
    let mut courses: Vec<Course> = serde_json::from_str(DEMO_COURSES)?;
    for c in courses.iter_mut() {
        c.renumber_modules();
    }
    Ok(courses)
}

pub async fn seed_if_empty(store: &dyn CourseStore) -> Result<usize, StoreError> {
    if !store.list().await?.is_empty() {
        return Ok(0);
    }
    let courses = demo_courses()?;
    let n = courses.len();
    for c in courses {
        store.insert(c).await?;
    }
    tracing::info!(courses = n, "seeded demo catalog");
    Ok(n)
}
