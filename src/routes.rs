use axum::{
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    analytics::{course_analytics, CourseAnalytics},
    catalog::Catalog,
    embed::embed_for,
    error::{AppError, AppResult},
    kv::KeyValueStore,
    models::*,
    progress::{course_progress, merge_completions, Tracker},
    store::CourseStore,
};

// body rejections answer in the AppError shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
struct AppJson<T>(T);

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub tracker: Tracker,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CourseStore>,
        kv: Arc<dyn KeyValueStore>,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            catalog: Catalog::new(store, kv.clone()),
            tracker: Tracker::new(kv),
            admin_token: admin_token.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/courses", post(add_course))
        .route("/courses/:course_id", put(update_course).delete(delete_course))
        .route("/courses/:course_id/modules", put(replace_modules).post(add_module))
        .route("/courses/:course_id/modules/reorder", post(reorder_modules))
        .route("/courses/:course_id/modules/:module_id", delete(delete_module))
        .route("/courses/:course_id/modules/:module_id/duplicate", post(duplicate_module))
        .route("/courses/:course_id/modules/:module_id/lessons", post(create_lesson))
        .route("/courses/:course_id/modules/:module_id/lessons/reorder", post(reorder_lessons))
        .route("/courses/:course_id/lessons/:lesson_id", put(update_lesson).delete(delete_lesson))
        .route("/courses/:course_id/analytics", get(analytics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        // catalog
        .route("/api/courses", get(list_courses))
        .route("/api/courses/:course_id", get(get_course))
        .route("/api/courses/:course_id/lessons/:lesson_id", get(get_lesson))
        // learner state
        .route("/api/learners/:learner/courses", get(learner_courses))
        .route("/api/learners/:learner/courses/:course_id", get(learner_course))
        .route("/api/learners/:learner/courses/:course_id/lessons/:lesson_id", get(learner_lesson))
        .route(
            "/api/learners/:learner/courses/:course_id/lessons/:lesson_id/completion",
            put(set_completion),
        )
        .route(
            "/api/learners/:learner/courses/:course_id/lessons/:lesson_id/position",
            put(set_position),
        )
        .nest("/api/admin", admin)
        .with_state(state)
}

async fn require_admin(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.admin_token.as_deref() {
        let ok = matches!(&auth, Some(TypedHeader(a)) if a.token() == expected);
        if !ok {
            tracing::warn!(path = %req.uri().path(), "rejected admin request");
            return Err(AppError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

fn lesson_not_found(course_id: &str, lesson_id: &str) -> AppError {
    AppError::not_found(format!("lesson {} in course {}", lesson_id, course_id))
}

// --- catalog ---

async fn list_courses(State(st): State<AppState>) -> AppResult<Json<Vec<Course>>> {
    Ok(Json(st.catalog.list_courses().await?))
}

async fn get_course(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
) -> AppResult<Json<Course>> {
    st.catalog
        .get_course_by_id(&course_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("course {}", course_id)))
}

async fn get_lesson(
    State(st): State<AppState>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> AppResult<Json<LessonContext>> {
    st.catalog
        .get_lesson_by_id(&course_id, &lesson_id)
        .await?
        .map(Json)
        .ok_or_else(|| lesson_not_found(&course_id, &lesson_id))
}

// --- learner ---

async fn learner_courses(
    State(st): State<AppState>,
    Path(learner): Path<String>,
) -> AppResult<Json<Vec<Course>>> {
    let stored = st.tracker.completions(&learner).await?;
    let mut courses = st.catalog.list_courses().await?;
    for c in courses.iter_mut() {
        let merged = merge_completions(c, &stored);
        c.progress = Some(course_progress(c, &merged));
    }
    Ok(Json(courses))
}

async fn learner_course(
    State(st): State<AppState>,
    Path((learner, course_id)): Path<(String, String)>,
) -> AppResult<Json<CourseView>> {
    let mut course = st
        .catalog
        .get_course_by_id(&course_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("course {}", course_id)))?;
    let state = st.tracker.course_state(&learner, &course).await?;
    course.progress = Some(state.progress);
    Ok(Json(CourseView {
        course,
        completions: state.completions,
        progress: state.progress,
        resume_lesson_id: state.resume_lesson_id,
    }))
}

async fn learner_lesson(
    State(st): State<AppState>,
    Path((learner, course_id, lesson_id)): Path<(String, String, String)>,
) -> AppResult<Json<LessonView>> {
    let LessonContext { mut course, module, lesson } = st
        .catalog
        .get_lesson_by_id(&course_id, &lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(&course_id, &lesson_id))?;

    st.tracker.record_last_viewed(&learner, &course.id, &lesson.id).await?;
    let state = st.tracker.course_state(&learner, &course).await?;
    let video_position = st.tracker.video_position(&learner, &lesson.id).await?;
    let embed_url = lesson
        .video_url
        .as_deref()
        .and_then(|url| embed_for(url, video_position.or(lesson.last_position)))
        .map(|e| e.url);

    course.progress = Some(state.progress);
    Ok(Json(LessonView {
        course,
        module,
        lesson,
        completions: state.completions,
        progress: state.progress,
        embed_url,
        video_position,
    }))
}

async fn set_completion(
    State(st): State<AppState>,
    Path((learner, course_id, lesson_id)): Path<(String, String, String)>,
    AppJson(req): AppJson<CompletionReq>,
) -> AppResult<Json<CompletionView>> {
    let ctx = st
        .catalog
        .get_lesson_by_id(&course_id, &lesson_id)
        .await?
        .ok_or_else(|| lesson_not_found(&course_id, &lesson_id))?;
    let (completions, progress) = st
        .tracker
        .set_completion(&learner, &ctx.course, &lesson_id, req.completed)
        .await?;
    Ok(Json(CompletionView { completions, progress }))
}

async fn set_position(
    State(st): State<AppState>,
    Path((learner, course_id, lesson_id)): Path<(String, String, String)>,
    AppJson(req): AppJson<PositionReq>,
) -> AppResult<Json<serde_json::Value>> {
    if !req.seconds.is_finite() || req.seconds < 0.0 {
        return Err(AppError::invalid("seconds must be a non-negative number"));
    }
    if st.catalog.get_lesson_by_id(&course_id, &lesson_id).await?.is_none() {
        return Err(lesson_not_found(&course_id, &lesson_id));
    }
    st.tracker.set_video_position(&learner, &lesson_id, req.seconds).await?;
    Ok(Json(json!({ "lessonId": lesson_id, "seconds": req.seconds })))
}

// --- admin ---

async fn add_course(
    State(st): State<AppState>,
    AppJson(req): AppJson<CourseDetailsReq>,
) -> AppResult<(StatusCode, Json<Course>)> {
    let course = st.catalog.add_course(req).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<CourseDetailsReq>,
) -> AppResult<Json<Course>> {
    Ok(Json(st.catalog.update_course(&course_id, req).await?))
}

async fn delete_course(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
) -> AppResult<StatusCode> {
    if st.catalog.delete_course(&course_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("course {}", course_id)))
    }
}

async fn replace_modules(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
    AppJson(modules): AppJson<Vec<Module>>,
) -> AppResult<Json<Course>> {
    if !st.catalog.update_course_modules(&course_id, modules).await? {
        return Err(AppError::not_found(format!("course {}", course_id)));
    }
    get_course(State(st), Path(course_id)).await
}

async fn add_module(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<AddModuleReq>,
) -> AppResult<(StatusCode, Json<Module>)> {
    let module = st.catalog.add_module(&course_id, req).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn reorder_modules(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ReorderReq>,
) -> AppResult<Json<Vec<Module>>> {
    Ok(Json(st.catalog.reorder_modules(&course_id, req.from, req.to).await?))
}

async fn delete_module(
    State(st): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    if st.catalog.delete_module(&course_id, &module_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("module {} in course {}", module_id, course_id)))
    }
}

async fn duplicate_module(
    State(st): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> AppResult<(StatusCode, Json<Module>)> {
    st.catalog
        .duplicate_module(&course_id, &module_id)
        .await?
        .map(|m| (StatusCode::CREATED, Json(m)))
        .ok_or_else(|| AppError::not_found(format!("module {} in course {}", module_id, course_id)))
}

async fn create_lesson(
    State(st): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    AppJson(req): AppJson<LessonReq>,
) -> AppResult<(StatusCode, Json<Lesson>)> {
    let lesson = st.catalog.create_lesson(&course_id, &module_id, req).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn reorder_lessons(
    State(st): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
    AppJson(req): AppJson<ReorderReq>,
) -> AppResult<Json<Vec<Lesson>>> {
    Ok(Json(
        st.catalog
            .reorder_lessons(&course_id, &module_id, req.from, req.to)
            .await?,
    ))
}

async fn update_lesson(
    State(st): State<AppState>,
    Path((course_id, lesson_id)): Path<(String, String)>,
    AppJson(req): AppJson<LessonReq>,
) -> AppResult<Json<Lesson>> {
    Ok(Json(st.catalog.update_lesson(&course_id, &lesson_id, req).await?))
}

async fn delete_lesson(
    State(st): State<AppState>,
    Path((course_id, lesson_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    if st.catalog.delete_lesson(&course_id, &lesson_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(lesson_not_found(&course_id, &lesson_id))
    }
}

async fn analytics(
    State(st): State<AppState>,
    Path(course_id): Path<String>,
) -> AppResult<Json<CourseAnalytics>> {
    let course = st
        .catalog
        .get_course_by_id(&course_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("course {}", course_id)))?;
    let learners = st.tracker.all_completions().await?;
    Ok(Json(course_analytics(&course, &learners)))
}
