use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    kv::{self, KeyValueStore},
    models::{
        file_type_from_name, required, valid_module_title, AddModuleReq, Course, CourseDetailsReq,
        FileInfo, Lesson, LessonContext, LessonReq, Module, NewFileReq, MODULE_TITLE_MAX,
    },
    reorder::move_item,
    store::{CourseStore, StoreError},
    util::{fresh_id, slugify},
};

pub fn find_lesson<'a>(course: &'a Course, lesson_id: &str) -> Option<(&'a Module, &'a Lesson)> {
    course.modules.iter().find_map(|m| {
        m.lessons
            .iter()
            .find(|l| l.id == lesson_id)
            .map(|l| (m, l))
    })
}

fn find_lesson_mut<'a>(course: &'a mut Course, lesson_id: &str) -> Option<&'a mut Lesson> {
    course
        .modules
        .iter_mut()
        .flat_map(|m| m.lessons.iter_mut())
        .find(|l| l.id == lesson_id)
}

/// Inserts a copy of `module_id` right after it. The copy and each of its
/// lessons get fresh ids.
pub fn duplicate_in(course: &mut Course, module_id: &str) -> Option<Module> {
    let idx = course.modules.iter().position(|m| m.id == module_id)?;
    let mut copy = course.modules[idx].clone();
    copy.id = fresh_id("module");
    copy.title = format!("{} (Copy)", copy.title);
    for lesson in copy.lessons.iter_mut() {
        lesson.id = fresh_id("lesson");
    }
    course.modules.insert(idx + 1, copy.clone());
    course.renumber_modules();
    // position after renumbering
    copy.position = idx + 1;
    Some(copy)
}

fn files_from(req: Vec<NewFileReq>) -> AppResult<Vec<FileInfo>> {
    req.into_iter()
        .map(|f| -> AppResult<FileInfo> {
            let name = required(&f.name)
                .ok_or_else(|| AppError::invalid("file name is required"))?
                .to_string();
            let url = required(&f.url)
                .ok_or_else(|| AppError::invalid("file url is required"))?
                .to_string();
            let kind = f.kind.unwrap_or_else(|| file_type_from_name(&name));
            Ok(FileInfo {
                id: f.id.unwrap_or_else(|| fresh_id("file")),
                name,
                url,
                kind: Some(kind),
            })
        })
        .collect()
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.and_then(|s| required(&s).map(str::to_string))
}

fn apply_lesson(lesson: &mut Lesson, req: LessonReq) -> AppResult<()> {
    lesson.title = required(&req.title)
        .ok_or_else(|| AppError::invalid("lesson title is required"))?
        .to_string();
    lesson.video_url = non_blank(req.video_url);
    lesson.text_content = non_blank(req.text_content);
    lesson.transcript = non_blank(req.transcript);
    lesson.action_items = req
        .action_items
        .into_iter()
        .filter_map(|s| required(&s).map(str::to_string))
        .collect();
    lesson.files = files_from(req.files)?;
    lesson.is_completed = req.is_completed;
    lesson.duration = req.duration;
    lesson.content_type = req.content_type;
    Ok(())
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CourseStore>,
    kv: Arc<dyn KeyValueStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn CourseStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { store, kv }
    }

    pub async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.store.list().await
    }

    pub async fn get_course_by_id(&self, id: &str) -> Result<Option<Course>, StoreError> {
        self.store.get(id).await
    }

    pub async fn get_lesson_by_id(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonContext>, StoreError> {
        let Some(course) = self.store.get(course_id).await? else {
            return Ok(None);
        };
        let found = find_lesson(&course, lesson_id).map(|(m, l)| (m.clone(), l.clone()));
        Ok(found.map(|(module, lesson)| LessonContext { course, module, lesson }))
    }

    async fn require(&self, course_id: &str) -> AppResult<Course> {
        self.store
            .get(course_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("course {}", course_id)))
    }

    async fn save(&self, mut course: Course) -> Result<bool, StoreError> {
        course.updated_at = Some(Utc::now());
        self.store.replace(course).await
    }

    // stamps updatedAt and hands back exactly what was stored
    async fn save_existing(&self, mut course: Course) -> AppResult<Course> {
        course.updated_at = Some(Utc::now());
        if !self.store.replace(course.clone()).await? {
            return Err(AppError::not_found(format!("course {}", course.id)));
        }
        Ok(course)
    }

    pub async fn add_course(&self, req: CourseDetailsReq) -> AppResult<Course> {
        let title = required(&req.title)
            .ok_or_else(|| AppError::invalid("course title is required"))?
            .to_string();
        let description = required(&req.description)
            .ok_or_else(|| AppError::invalid("course description is required"))?
            .to_string();

        let slug = slugify(&title);
        let id = if slug.is_empty() {
            fresh_id("course")
        } else if self.store.get(&slug).await?.is_some() {
            fresh_id(&slug)
        } else {
            slug
        };

        let now = Utc::now();
        let course = Course {
            id,
            title,
            description,
            image_url: non_blank(req.image_url),
            instructor: non_blank(req.instructor),
            duration: non_blank(req.duration),
            modules: Vec::new(),
            progress: None,
            community_id: None,
            access_level: None,
            cover_image_url: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.store.insert(course.clone()).await?;
        tracing::info!(course_id = %course.id, "course created");
        Ok(course)
    }

    pub async fn update_course(&self, id: &str, req: CourseDetailsReq) -> AppResult<Course> {
        let mut course = self.require(id).await?;
        course.title = required(&req.title)
            .ok_or_else(|| AppError::invalid("course title is required"))?
            .to_string();
        course.description = required(&req.description)
            .ok_or_else(|| AppError::invalid("course description is required"))?
            .to_string();
        course.image_url = non_blank(req.image_url);
        course.instructor = non_blank(req.instructor);
        course.duration = non_blank(req.duration);
        let course = self.save_existing(course).await?;
        tracing::info!(course_id = %id, "course details updated");
        Ok(course)
    }

    pub async fn update_course_modules(
        &self,
        id: &str,
        modules: Vec<Module>,
    ) -> Result<bool, StoreError> {
        let Some(mut course) = self.store.get(id).await? else {
            return Ok(false);
        };
        course.modules = modules;
        course.renumber_modules();
        let ok = self.save(course).await?;
        tracing::info!(course_id = %id, ok, "course modules replaced");
        Ok(ok)
    }

    pub async fn delete_course(&self, id: &str) -> Result<bool, StoreError> {
        if !self.store.remove(id).await? {
            tracing::info!(course_id = %id, "delete requested for unknown course");
            return Ok(false);
        }
        let cleared = self.kv.remove_everywhere(&kv::last_viewed_key(id)).await?;
        tracing::info!(course_id = %id, cleared, "course deleted");
        Ok(true)
    }

    pub async fn add_module(&self, course_id: &str, req: AddModuleReq) -> AppResult<Module> {
        let title = valid_module_title(&req.title).ok_or_else(|| {
            AppError::invalid(format!(
                "module title must be 1 to {} characters",
                MODULE_TITLE_MAX
            ))
        })?;
        let mut course = self.require(course_id).await?;
        let module = Module {
            id: fresh_id("module"),
            title: title.to_string(),
            description: None,
            lessons: Vec::new(),
            position: course.modules.len(),
            is_published: req.is_published,
            unlock_level: None,
            unlock_date: None,
        };
        course.modules.push(module.clone());
        self.save_existing(course).await?;
        tracing::info!(course_id, module_id = %module.id, "module added");
        Ok(module)
    }

    pub async fn delete_module(
        &self,
        course_id: &str,
        module_id: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut course) = self.store.get(course_id).await? else {
            return Ok(false);
        };
        let before = course.modules.len();
        course.modules.retain(|m| m.id != module_id);
        if course.modules.len() == before {
            return Ok(false);
        }
        course.renumber_modules();
        let ok = self.save(course).await?;
        tracing::info!(course_id, module_id, "module deleted");
        Ok(ok)
    }

    pub async fn duplicate_module(
        &self,
        course_id: &str,
        module_id: &str,
    ) -> Result<Option<Module>, StoreError> {
        let Some(mut course) = self.store.get(course_id).await? else {
            return Ok(None);
        };
        let Some(copy) = duplicate_in(&mut course, module_id) else {
            return Ok(None);
        };
        if !self.save(course).await? {
            return Ok(None);
        }
        tracing::info!(course_id, module_id, copy_id = %copy.id, "module duplicated");
        Ok(Some(copy))
    }

    pub async fn reorder_modules(
        &self,
        course_id: &str,
        from: usize,
        to: usize,
    ) -> AppResult<Vec<Module>> {
        let mut course = self.require(course_id).await?;
        move_item(&mut course.modules, from, to)?;
        course.renumber_modules();
        let modules = course.modules.clone();
        self.save_existing(course).await?;
        tracing::info!(course_id, from, to, "modules reordered");
        Ok(modules)
    }

    pub async fn reorder_lessons(
        &self,
        course_id: &str,
        module_id: &str,
        from: usize,
        to: usize,
    ) -> AppResult<Vec<Lesson>> {
        let mut course = self.require(course_id).await?;
        let module = course
            .module_mut(module_id)
            .ok_or_else(|| AppError::not_found(format!("module {}", module_id)))?;
        move_item(&mut module.lessons, from, to)?;
        let lessons = module.lessons.clone();
        self.save_existing(course).await?;
        tracing::info!(course_id, module_id, from, to, "lessons reordered");
        Ok(lessons)
    }

    pub async fn create_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        req: LessonReq,
    ) -> AppResult<Lesson> {
        let mut course = self.require(course_id).await?;
        let module = course
            .module_mut(module_id)
            .ok_or_else(|| AppError::not_found(format!("module {}", module_id)))?;
        let mut lesson = Lesson {
            id: fresh_id("lesson"),
            title: String::new(),
            video_url: None,
            text_content: None,
            transcript: None,
            action_items: Vec::new(),
            files: Vec::new(),
            is_completed: None,
            duration: None,
            last_position: None,
            content_type: None,
        };
        apply_lesson(&mut lesson, req)?;
        module.lessons.push(lesson.clone());
        self.save_existing(course).await?;
        tracing::info!(course_id, module_id, lesson_id = %lesson.id, "lesson created");
        Ok(lesson)
    }

    pub async fn update_lesson(
        &self,
        course_id: &str,
        lesson_id: &str,
        req: LessonReq,
    ) -> AppResult<Lesson> {
        let mut course = self.require(course_id).await?;
        let lesson = find_lesson_mut(&mut course, lesson_id)
            .ok_or_else(|| AppError::not_found(format!("lesson {}", lesson_id)))?;
        apply_lesson(lesson, req)?;
        let updated = lesson.clone();
        self.save_existing(course).await?;
        tracing::info!(course_id, lesson_id, "lesson updated");
        Ok(updated)
    }

    pub async fn delete_lesson(
        &self,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<bool, StoreError> {
        let Some(mut course) = self.store.get(course_id).await? else {
            return Ok(false);
        };
        let mut removed = false;
        for m in course.modules.iter_mut() {
            let before = m.lessons.len();
            m.lessons.retain(|l| l.id != lesson_id);
            removed |= m.lessons.len() != before;
        }
        if !removed {
            return Ok(false);
        }
        let ok = self.save(course).await?;
        tracing::info!(course_id, lesson_id, "lesson deleted");
        Ok(ok)
    }
}
