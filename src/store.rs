//! Durable storage seam. The engine talks to a `Store` trait object so the
//! grading, gating, ingestion, and certification logic is independent of the
//! Postgres wiring.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Certificate, Course, Enrollment, Lesson, NewQuizAttempt, NewViewingLog, QuizMarker, User,
    ViewingLog,
};

pub mod pg;

#[cfg(test)]
pub mod memory;

/// Outcome of a certificate insert attempt. `Conflict` means another request
/// won the (user, course) uniqueness race first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateInsert {
    Inserted,
    Conflict,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Resolves a session bearer token to its user, if the session is live.
    async fn user_for_token(&self, token: &str) -> Result<Option<User>>;

    async fn course(&self, id: Uuid) -> Result<Option<Course>>;

    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>>;

    /// All lessons of a course, ordered by `lesson_order` ascending.
    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>>;

    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>>;

    /// Highest `max_viewed_time` ever recorded for (user, lesson); 0 if none.
    /// Served from the per-lesson aggregate, not by scanning the log.
    async fn lesson_max_viewed(&self, user_id: Uuid, lesson_id: Uuid) -> Result<i32>;

    /// Most recent telemetry sample for (user, lesson), for resume position.
    async fn latest_sample(&self, user_id: Uuid, lesson_id: Uuid) -> Result<Option<ViewingLog>>;

    /// Appends one viewing-log row and folds its `max_viewed_time` into the
    /// per-lesson aggregate, atomically. The aggregate only ever grows.
    async fn record_sample(&self, log: &NewViewingLog) -> Result<()>;

    /// Persists recomputed course progress. `completed_at` is only ever set
    /// if currently unset; it is never cleared or changed here.
    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: f64,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn quiz_marker(&self, id: Uuid) -> Result<Option<QuizMarker>>;

    /// Markers of a lesson, ordered by timestamp ascending.
    async fn lesson_markers(&self, lesson_id: Uuid) -> Result<Vec<QuizMarker>>;

    async fn record_quiz_attempt(&self, attempt: &NewQuizAttempt) -> Result<()>;

    async fn has_correct_attempt(&self, user_id: Uuid, marker_id: Uuid) -> Result<bool>;

    async fn certificate(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Certificate>>;

    /// Inserts the certificate, reporting `Conflict` when the (user, course)
    /// uniqueness constraint rejects a concurrent duplicate.
    async fn insert_certificate(&self, cert: &Certificate) -> Result<CertificateInsert>;

    /// Forces the enrollment to its terminal state: progress 100 and a
    /// completion timestamp (kept if already set).
    async fn mark_enrollment_completed(&self, user_id: Uuid, course_id: Uuid) -> Result<()>;
}
