mod common;

use axum::http::StatusCode;
use common::{get, put, seeded_app};
use serde_json::json;

const VR: &str = "/api/learners/ann/courses/ucat-verbal-reasoning-101";

#[tokio::test]
async fn course_view_merges_defaults_and_resumes_at_first_lesson() {
    let app = seeded_app(None);
    let (status, body) = get(&app, VR).await;
    assert_eq!(status, StatusCode::OK);
    // 3 of 5 lessons default to complete
    assert_eq!(body["progress"], 60);
    assert_eq!(body["course"]["progress"], 60);
    assert_eq!(body["completions"]["vr-lesson-1-1"], true);
    assert_eq!(body["completions"]["vr-lesson-1-3"], false);
    assert_eq!(body["resumeLessonId"], "vr-lesson-1-1");
}

#[tokio::test]
async fn viewing_a_lesson_moves_the_resume_point() {
    let app = seeded_app(None);
    let (status, body) = get(&app, &format!("{VR}/lessons/vr-lesson-1-3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["module"]["id"], "vr-module-1");
    assert_eq!(body["lesson"]["title"], "Identifying Assumptions");
    assert!(body.get("embedUrl").is_none());

    let (_, course) = get(&app, VR).await;
    assert_eq!(course["resumeLessonId"], "vr-lesson-1-3");

    // another learner still starts at the top
    let (_, other) = get(&app, "/api/learners/bob/courses/ucat-verbal-reasoning-101").await;
    assert_eq!(other["resumeLessonId"], "vr-lesson-1-1");
}

#[tokio::test]
async fn toggles_recompute_progress() {
    let app = seeded_app(None);
    let (status, body) = put(&app, &format!("{VR}/lessons/vr-lesson-1-3/completion"), json!({ "completed": true })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], 80);
    assert_eq!(body["completions"]["vr-lesson-1-3"], true);

    let (_, body) = put(&app, &format!("{VR}/lessons/vr-lesson-1-1/completion"), json!({ "completed": false })).await;
    assert_eq!(body["progress"], 60);

    let (_, view) = get(&app, VR).await;
    assert_eq!(view["progress"], 60);
    assert_eq!(view["completions"]["vr-lesson-1-1"], false);

    let (_, list) = get(&app, "/api/learners/ann/courses").await;
    let vr = list
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == "ucat-verbal-reasoning-101")
        .unwrap();
    assert_eq!(vr["progress"], 60);
}

#[tokio::test]
async fn unknown_lessons_are_not_found() {
    let app = seeded_app(None);
    let (status, body) = put(&app, &format!("{VR}/lessons/nope/completion"), json!({ "completed": true })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Resource not found");

    let (status, _) = get(&app, "/api/learners/ann/courses/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, "/api/courses/ucat-verbal-reasoning-101/lessons/qr-lesson-1-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn video_positions_feed_the_embed_start() {
    let app = seeded_app(None);
    let (_, body) = get(&app, &format!("{VR}/lessons/vr-lesson-1-1")).await;
    assert_eq!(body["embedUrl"], "https://www.youtube.com/embed/kf4j0Q8Lw0k");

    let (status, _) = put(&app, &format!("{VR}/lessons/vr-lesson-1-1/position"), json!({ "seconds": 95.4 })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, &format!("{VR}/lessons/vr-lesson-1-1")).await;
    assert_eq!(body["videoPosition"], 95.4);
    assert_eq!(body["embedUrl"], "https://www.youtube.com/embed/kf4j0Q8Lw0k?start=95");

    let (status, _) = put(&app, &format!("{VR}/lessons/vr-lesson-1-1/position"), json!({ "seconds": -1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_video_ids_produce_no_embed() {
    let app = seeded_app(None);
    let (status, body) = get(&app, &format!("{VR}/lessons/vr-lesson-2-2")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("embedUrl").is_none());
}
