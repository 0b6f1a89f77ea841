use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    models::Course,
    progress::{course_progress, merge_completions, Completions},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DropOffPoint {
    pub lesson_id: String,
    pub drop_off_rate: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course_id: String,
    pub total_students: usize,
    pub completion_rate: f64,
    pub average_progress: f64,
    pub module_completion_rates: BTreeMap<String, f64>,
    pub average_time_per_lesson: f64,
    pub drop_off_points: Vec<DropOffPoint>,
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

fn mean(xs: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = xs.fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn done(c: &Completions, lesson_id: &str) -> bool {
    c.get(lesson_id).copied().unwrap_or(false)
}

pub fn course_analytics(course: &Course, learners: &[(String, Completions)]) -> CourseAnalytics {
    let students: Vec<Completions> = learners
        .iter()
        .filter(|(_, stored)| course.lessons().any(|l| stored.contains_key(&l.id)))
        .map(|(_, stored)| merge_completions(course, stored))
        .collect();

    let progresses: Vec<u8> = students.iter().map(|c| course_progress(course, c)).collect();
    let finished = progresses.iter().filter(|p| **p == 100).count();

    let module_completion_rates = course
        .modules
        .iter()
        .map(|m| {
            let rate = mean(students.iter().map(|c| {
                let n = m.lessons.iter().filter(|l| done(c, &l.id)).count();
                pct(n, m.lessons.len())
            }));
            (m.id.clone(), rate)
        })
        .collect();

    let lessons: Vec<&str> = course.lessons().map(|l| l.id.as_str()).collect();
    let drop_off_points = lessons
        .windows(2)
        .map(|pair| {
            let reached: Vec<&Completions> = students.iter().filter(|c| done(c, pair[0])).collect();
            let dropped = reached.iter().filter(|c| !done(c, pair[1])).count();
            DropOffPoint {
                lesson_id: pair[1].to_string(),
                drop_off_rate: pct(dropped, reached.len()),
            }
        })
        .collect();

    CourseAnalytics {
        course_id: course.id.clone(),
        total_students: students.len(),
        completion_rate: pct(finished, students.len()),
        average_progress: mean(progresses.iter().map(|p| *p as f64)),
        module_completion_rates,
        average_time_per_lesson: mean(course.lessons().filter_map(|l| l.duration).map(f64::from)),
        drop_off_points,
    }
}
