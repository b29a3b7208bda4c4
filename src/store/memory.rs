//! In-memory `Store` used by the engine test suites. Mirrors the relational
//! semantics of the Postgres implementation, including the GREATEST fold on
//! the per-lesson aggregate and the certificate uniqueness constraint.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Certificate, Course, Enrollment, Lesson, NewQuizAttempt, NewViewingLog, QuizAttempt,
    QuizMarker, QuizOption, User, ViewingLog,
};
use crate::store::{CertificateInsert, Store};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: HashMap<String, Uuid>,
    courses: Vec<Course>,
    lessons: Vec<Lesson>,
    markers: Vec<QuizMarker>,
    viewing_logs: Vec<ViewingLog>,
    attempts: Vec<QuizAttempt>,
    lesson_progress: HashMap<(Uuid, Uuid), i32>,
    enrollments: Vec<Enrollment>,
    certificates: Vec<Certificate>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: Option<&str>, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.map(Into::into),
            email: email.into(),
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn add_session(&self, user_id: Uuid, token: &str) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(token.into(), user_id);
    }

    pub fn add_course(&self, title: &str) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            title: title.into(),
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().courses.push(course.clone());
        course
    }

    pub fn add_lesson(&self, course_id: Uuid, order: i32, duration: i32) -> Lesson {
        let lesson = Lesson {
            id: Uuid::new_v4(),
            course_id,
            title: format!("Lesson {order}"),
            video_url: format!("/videos/lesson-{order}.mp4"),
            video_duration: duration,
            lesson_order: order,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().lessons.push(lesson.clone());
        lesson
    }

    pub fn add_marker(
        &self,
        lesson_id: Uuid,
        timestamp: i32,
        question: &str,
        options: Vec<QuizOption>,
    ) -> QuizMarker {
        let marker = QuizMarker {
            id: Uuid::new_v4(),
            lesson_id,
            timestamp,
            question: question.into(),
            options: Json(options),
        };
        self.inner.lock().unwrap().markers.push(marker.clone());
        marker
    }

    pub fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Enrollment {
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            progress: 0.0,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .unwrap()
            .enrollments
            .push(enrollment.clone());
        enrollment
    }

    pub fn viewing_log_count(&self) -> usize {
        self.inner.lock().unwrap().viewing_logs.len()
    }

    pub fn certificate_count(&self) -> usize {
        self.inner.lock().unwrap().certificates.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        let user_id = match inner.sessions.get(token) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn course(&self, id: Uuid) -> Result<Option<Course>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.lessons.iter().find(|l| l.id == id).cloned())
    }

    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let inner = self.inner.lock().unwrap();
        let mut lessons: Vec<Lesson> = inner
            .lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.lesson_order);
        Ok(lessons)
    }

    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn lesson_max_viewed(&self, user_id: Uuid, lesson_id: Uuid) -> Result<i32> {
        let inner = self.inner.lock().unwrap();
        Ok(*inner
            .lesson_progress
            .get(&(user_id, lesson_id))
            .unwrap_or(&0))
    }

    async fn latest_sample(&self, user_id: Uuid, lesson_id: Uuid) -> Result<Option<ViewingLog>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .viewing_logs
            .iter()
            .filter(|v| v.user_id == user_id && v.lesson_id == lesson_id)
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn record_sample(&self, log: &NewViewingLog) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.viewing_logs.push(ViewingLog {
            id: Uuid::new_v4(),
            user_id: log.user_id,
            lesson_id: log.lesson_id,
            current_time: log.current_time,
            max_viewed_time: log.max_viewed_time,
            playback_rate: log.playback_rate,
            is_visible: log.is_visible,
            created_at: Utc::now(),
        });
        let entry = inner
            .lesson_progress
            .entry((log.user_id, log.lesson_id))
            .or_insert(0);
        *entry = (*entry).max(log.max_viewed_time);
        Ok(())
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: f64,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
        {
            e.progress = progress;
            if e.completed_at.is_none() {
                e.completed_at = completed_at;
            }
        }
        Ok(())
    }

    async fn quiz_marker(&self, id: Uuid) -> Result<Option<QuizMarker>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.markers.iter().find(|m| m.id == id).cloned())
    }

    async fn lesson_markers(&self, lesson_id: Uuid) -> Result<Vec<QuizMarker>> {
        let inner = self.inner.lock().unwrap();
        let mut markers: Vec<QuizMarker> = inner
            .markers
            .iter()
            .filter(|m| m.lesson_id == lesson_id)
            .cloned()
            .collect();
        markers.sort_by_key(|m| m.timestamp);
        Ok(markers)
    }

    async fn record_quiz_attempt(&self, attempt: &NewQuizAttempt) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts.push(QuizAttempt {
            id: Uuid::new_v4(),
            user_id: attempt.user_id,
            quiz_marker_id: attempt.quiz_marker_id,
            selected_option: attempt.selected_option,
            is_correct: attempt.is_correct,
            attempted_at: Utc::now(),
        });
        Ok(())
    }

    async fn has_correct_attempt(&self, user_id: Uuid, marker_id: Uuid) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attempts
            .iter()
            .any(|a| a.user_id == user_id && a.quiz_marker_id == marker_id && a.is_correct))
    }

    async fn certificate(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Certificate>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .certificates
            .iter()
            .find(|c| c.user_id == user_id && c.course_id == course_id)
            .cloned())
    }

    async fn insert_certificate(&self, cert: &Certificate) -> Result<CertificateInsert> {
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner
            .certificates
            .iter()
            .any(|c| c.user_id == cert.user_id && c.course_id == cert.course_id);
        if duplicate {
            return Ok(CertificateInsert::Conflict);
        }
        inner.certificates.push(cert.clone());
        Ok(CertificateInsert::Inserted)
    }

    async fn mark_enrollment_completed(&self, user_id: Uuid, course_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(e) = inner
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
        {
            e.progress = 100.0;
            if e.completed_at.is_none() {
                e.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}
