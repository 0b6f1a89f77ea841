use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Text,
    Mixed,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub video_url: Option<String>,
    pub text_content: Option<String>,
    pub transcript: Option<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileInfo>,
    pub is_completed: Option<bool>,
    pub duration: Option<u32>, // seconds
    pub last_position: Option<f64>,
    pub content_type: Option<ContentType>,
}

impl Lesson {
    pub fn kind(&self) -> ContentType {
        if let Some(ct) = self.content_type {
            return ct;
        }
        match (self.video_url.is_some(), self.text_content.is_some()) {
            (true, true) => ContentType::Mixed,
            (true, false) => ContentType::Video,
            _ => ContentType::Text,
        }
    }
}

fn default_published() -> bool {
    true
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub position: usize,
    #[serde(default = "default_published")]
    pub is_published: bool,
    pub unlock_level: Option<u32>,
    pub unlock_date: Option<DateTime<Utc>>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub instructor: Option<String>,
    pub duration: Option<String>, // free text, e.g. "12 hours"
    #[serde(default)]
    pub modules: Vec<Module>,
    // derived; never read back as a source of truth
    pub progress: Option<u8>,
    pub community_id: Option<String>,
    pub access_level: Option<String>,
    pub cover_image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    pub fn module_mut(&mut self, module_id: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.id == module_id)
    }

    /// Rewrites every module's `position` to its index.
    pub fn renumber_modules(&mut self) {
        for (i, m) in self.modules.iter_mut().enumerate() {
            m.position = i;
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonContext {
    pub course: Course,
    pub module: Module,
    pub lesson: Lesson,
}

// --- admin requests ---

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetailsReq {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub instructor: Option<String>,
    pub duration: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AddModuleReq {
    pub title: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReorderReq {
    pub from: usize,
    pub to: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewFileReq {
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonReq {
    pub title: String,
    pub video_url: Option<String>,
    pub text_content: Option<String>,
    pub transcript: Option<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub files: Vec<NewFileReq>,
    pub is_completed: Option<bool>,
    pub duration: Option<u32>,
    pub content_type: Option<ContentType>,
}

// --- learner requests / views ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CompletionReq {
    pub completed: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PositionReq {
    pub seconds: f64,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course: Course,
    pub completions: BTreeMap<String, bool>,
    pub progress: u8,
    pub resume_lesson_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub course: Course,
    pub module: Module,
    pub lesson: Lesson,
    pub completions: BTreeMap<String, bool>,
    pub progress: u8,
    pub embed_url: Option<String>,
    pub video_position: Option<f64>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompletionView {
    pub completions: BTreeMap<String, bool>,
    pub progress: u8,
}

// --- validators ---

pub const MODULE_TITLE_MAX: usize = 50;

pub fn required(v: &str) -> Option<&str> {
    let t = v.trim();
    (!t.is_empty()).then_some(t)
}

pub fn valid_module_title(v: &str) -> Option<&str> {
    required(v).filter(|t| t.chars().count() <= MODULE_TITLE_MAX)
}

pub fn file_type_from_name(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "file".into(),
    }
}
