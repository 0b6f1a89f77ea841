use std::{collections::BTreeMap, sync::Arc};

use crate::{
    kv::{self, KeyValueStore},
    models::Course,
    store::StoreError,
};

pub type Completions = BTreeMap<String, bool>;

/// Completion for every lesson of `course`: the stored flag when there is
/// one, else the lesson's default, else false.
pub fn merge_completions(course: &Course, stored: &Completions) -> Completions {
    course
        .lessons()
        .map(|l| {
            let done = stored
                .get(&l.id)
                .copied()
                .or(l.is_completed)
                .unwrap_or(false);
            (l.id.clone(), done)
        })
        .collect()
}

pub fn course_progress(course: &Course, completions: &Completions) -> u8 {
    let total = course.total_lessons();
    let done = course
        .lessons()
        .filter(|l| completions.get(&l.id).copied().unwrap_or(false))
        .count();
    percent(done, total)
}

pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((200 * done + total) / (2 * total)) as u8
}

/// Lesson to reopen a course at: the last viewed one if it still exists,
/// otherwise the first lesson of the first non-empty module.
pub fn resume_lesson<'a>(course: &'a Course, last_viewed: Option<&str>) -> Option<&'a str> {
    if let Some(id) = last_viewed {
        if let Some(l) = course.lessons().find(|l| l.id == id) {
            return Some(l.id.as_str());
        }
    }
    course.lessons().next().map(|l| l.id.as_str())
}

pub(crate) fn parse_completions(learner: &str, raw: &str) -> Completions {
    match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(learner, error = %e, "ignoring malformed lessonCompletions");
            Completions::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CourseState {
    pub completions: Completions,
    pub progress: u8,
    pub resume_lesson_id: Option<String>,
}

#[derive(Clone)]
pub struct Tracker {
    kv: Arc<dyn KeyValueStore>,
}

impl Tracker {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn completions(&self, learner: &str) -> Result<Completions, StoreError> {
        Ok(match self.kv.get(learner, kv::LESSON_COMPLETIONS).await? {
            Some(raw) => parse_completions(learner, &raw),
            None => Completions::new(),
        })
    }

    pub async fn course_state(
        &self,
        learner: &str,
        course: &Course,
    ) -> Result<CourseState, StoreError> {
        let stored = self.completions(learner).await?;
        let completions = merge_completions(course, &stored);
        let progress = course_progress(course, &completions);
        let last = self.kv.get(learner, &kv::last_viewed_key(&course.id)).await?;
        let resume_lesson_id = resume_lesson(course, last.as_deref()).map(str::to_string);
        Ok(CourseState { completions, progress, resume_lesson_id })
    }

    /// Marks one lesson and persists the merged map for the course. Returns
    /// the course's completion map and recomputed progress.
    pub async fn set_completion(
        &self,
        learner: &str,
        course: &Course,
        lesson_id: &str,
        completed: bool,
    ) -> Result<(Completions, u8), StoreError> {
        let mut stored = self.completions(learner).await?;
        let mut merged = merge_completions(course, &stored);
        merged.insert(lesson_id.to_string(), completed);
        // keep other courses' entries
        stored.extend(merged.iter().map(|(k, v)| (k.clone(), *v)));
        self.kv
            .set(learner, kv::LESSON_COMPLETIONS, serde_json::to_string(&stored)?)
            .await?;
        let progress = course_progress(course, &merged);
        tracing::info!(
            learner,
            course_id = %course.id,
            lesson_id,
            completed,
            progress,
            "completion updated"
        );
        Ok((merged, progress))
    }

    pub async fn record_last_viewed(
        &self,
        learner: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<(), StoreError> {
        self.kv
            .set(learner, &kv::last_viewed_key(course_id), lesson_id.to_string())
            .await
    }

    pub async fn video_position(
        &self,
        learner: &str,
        lesson_id: &str,
    ) -> Result<Option<f64>, StoreError> {
        let raw = self.kv.get(learner, &kv::video_progress_key(lesson_id)).await?;
        Ok(raw.and_then(|s| s.trim().parse::<f64>().ok()).filter(|p| p.is_finite() && *p >= 0.0))
    }

    pub async fn set_video_position(
        &self,
        learner: &str,
        lesson_id: &str,
        seconds: f64,
    ) -> Result<(), StoreError> {
        self.kv
            .set(learner, &kv::video_progress_key(lesson_id), seconds.to_string())
            .await
    }

    pub async fn all_completions(&self) -> Result<Vec<(String, Completions)>, StoreError> {
        let entries = self.kv.entries(kv::LESSON_COMPLETIONS).await?;
        Ok(entries
            .into_iter()
            .map(|(learner, raw)| {
                let map = parse_completions(&learner, &raw);
                (learner, map)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use serde_json::json;

    fn four_lesson_course() -> Course {
        serde_json::from_value(json!({
            "id": "c1", "title": "C", "description": "d",
            "modules": [
                { "id": "m1", "title": "M1", "lessons": [
                    { "id": "l1", "title": "1" }, { "id": "l2", "title": "2" }
                ]},
                { "id": "m-empty", "title": "Empty" },
                { "id": "m2", "title": "M2", "lessons": [
                    { "id": "l3", "title": "3" }, { "id": "l4", "title": "4", "isCompleted": true }
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn stored_flags_override_defaults() {
        let course = four_lesson_course();
        let stored = Completions::from([("l1".to_string(), true), ("l4".to_string(), false)]);
        let merged = merge_completions(&course, &stored);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged["l1"], true);
        assert_eq!(merged["l2"], false);
        assert_eq!(merged["l4"], false);

        let defaults = merge_completions(&course, &Completions::new());
        assert_eq!(defaults["l4"], true);
    }

    #[test]
    fn half_and_three_quarters() {
        let course = four_lesson_course();
        let mut c = Completions::from([
            ("l1".to_string(), true),
            ("l2".to_string(), true),
            ("l3".to_string(), false),
            ("l4".to_string(), false),
        ]);
        assert_eq!(course_progress(&course, &c), 50);
        c.insert("l3".into(), true);
        assert_eq!(course_progress(&course, &c), 75);
    }

    #[test]
    fn rounding_matches_half_up() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(7, 7), 100);
        for total in 1..40 {
            for done in 0..=total {
                let expect = (100.0 * done as f64 / total as f64).round() as u8;
                assert_eq!(percent(done, total), expect, "{done}/{total}");
            }
        }
    }

    #[test]
    fn entries_for_other_courses_do_not_count() {
        let course = four_lesson_course();
        let c = Completions::from([("elsewhere".to_string(), true)]);
        assert_eq!(course_progress(&course, &c), 0);
    }

    #[test]
    fn resume_prefers_existing_last_viewed() {
        let course = four_lesson_course();
        assert_eq!(resume_lesson(&course, Some("l3")), Some("l3"));
        assert_eq!(resume_lesson(&course, Some("gone")), Some("l1"));
        assert_eq!(resume_lesson(&course, None), Some("l1"));

        let mut empty = course.clone();
        empty.modules.iter_mut().for_each(|m| m.lessons.clear());
        assert_eq!(resume_lesson(&empty, None), None);
    }

    #[tokio::test]
    async fn toggles_persist_and_recompute() {
        let tracker = Tracker::new(Arc::new(MemoryKv::new()));
        let course = four_lesson_course();

        let state = tracker.course_state("ann", &course).await.unwrap();
        assert_eq!(state.progress, 25);

        let (_, p) = tracker.set_completion("ann", &course, "l1", true).await.unwrap();
        assert_eq!(p, 50);
        let (merged, p) = tracker.set_completion("ann", &course, "l4", false).await.unwrap();
        assert_eq!(p, 25);
        assert_eq!(merged["l4"], false);

        let state = tracker.course_state("ann", &course).await.unwrap();
        assert_eq!(state.progress, 25);
        assert_eq!(state.completions["l1"], true);
        // other learners are unaffected
        assert_eq!(tracker.course_state("bob", &course).await.unwrap().progress, 25);
    }

    #[tokio::test]
    async fn malformed_stored_map_is_treated_as_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("ann", crate::kv::LESSON_COMPLETIONS, "{not json".into())
            .await
            .unwrap();
        let tracker = Tracker::new(kv);
        assert!(tracker.completions("ann").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn video_positions_round_trip_per_lesson() {
        let tracker = Tracker::new(Arc::new(MemoryKv::new()));
        assert_eq!(tracker.video_position("ann", "l1").await.unwrap(), None);
        tracker.set_video_position("ann", "l1", 42.5).await.unwrap();
        assert_eq!(tracker.video_position("ann", "l1").await.unwrap(), Some(42.5));
        assert_eq!(tracker.video_position("ann", "l2").await.unwrap(), None);
    }
}
