use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name for rendered documents; falls back to the email.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub video_url: String,
    /// Video length in whole seconds.
    pub video_duration: i32,
    /// 1-based position within the course; strictly increasing.
    pub lesson_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct QuizMarker {
    pub id: Uuid,
    pub lesson_id: Uuid,
    /// Seconds into the lesson video at which the question fires.
    pub timestamp: i32,
    pub question: String,
    pub options: Json<Vec<QuizOption>>,
}

/// One immutable telemetry sample. Append-only; rows are never updated.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ViewingLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub current_time: i32,
    pub max_viewed_time: i32,
    pub playback_rate: f64,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewViewingLog {
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub current_time: i32,
    /// Already merged against history: never lower than any prior row.
    pub max_viewed_time: i32,
    pub playback_rate: f64,
    pub is_visible: bool,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_marker_id: Uuid,
    pub selected_option: i32,
    pub is_correct: bool,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub user_id: Uuid,
    pub quiz_marker_id: Uuid,
    pub selected_option: i32,
    pub is_correct: bool,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    /// 0..=100, monotonically non-decreasing in normal operation.
    pub progress: f64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Certificate {
    /// Synthesized identifier, e.g. `CERT-1735689600000-a1b2c3d4`.
    pub id: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub pdf_url: String,
    pub issued_at: DateTime<Utc>,
}

// --- wire DTOs ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatReq {
    pub lesson_id: Uuid,
    pub current_time: f64,
    pub max_viewed_time: f64,
    pub playback_rate: f64,
    pub is_visible: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResp {
    pub lesson_progress: f64,
    pub course_progress: f64,
    pub max_viewed_time: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitReq {
    pub quiz_marker_id: Uuid,
    pub selected_option: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmitResp {
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewind_to: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReq {
    pub course_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResp {
    pub certificate_id: String,
    pub pdf_url: String,
}

/// Quiz marker as exposed to the player: option texts only, answers withheld.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QuizMarkerView {
    pub id: Uuid,
    pub timestamp: i32,
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub video_url: String,
    pub video_duration: i32,
    pub lesson_order: i32,
    pub quiz_markers: Vec<QuizMarkerView>,
    /// Resume position from the most recent telemetry sample.
    pub current_time: i32,
    pub max_viewed_time: i32,
    pub lesson_progress: f64,
}

/// One lesson's place in the Locked/Unlocked/Completed walk, as shown in a
/// course progress summary.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LessonStateView {
    pub id: Uuid,
    pub lesson_order: i32,
    pub state: crate::gating::LessonState,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressView {
    pub course_id: Uuid,
    pub progress: f64,
    pub total_watch_time: i64,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub quizzes_passed: usize,
    pub quizzes_total: usize,
    pub lessons: Vec<LessonStateView>,
    pub completed_at: Option<DateTime<Utc>>,
}
