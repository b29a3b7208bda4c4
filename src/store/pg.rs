use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::Db;
use crate::error::Result;
use crate::models::{
    Certificate, Course, Enrollment, Lesson, NewQuizAttempt, NewViewingLog, QuizMarker, User,
    ViewingLog,
};
use crate::store::{CertificateInsert, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user_for_token(&self, token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.name, u.email, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND (s.expires_at IS NULL OR s.expires_at > now())
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn course(&self, id: Uuid) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lesson)
    }

    async fn course_lessons(&self, course_id: Uuid) -> Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(
            "SELECT * FROM lessons WHERE course_id = $1 ORDER BY lesson_order ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lessons)
    }

    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(enrollment)
    }

    async fn lesson_max_viewed(&self, user_id: Uuid, lesson_id: Uuid) -> Result<i32> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT max_viewed_time FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2",
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(max.unwrap_or(0))
    }

    async fn latest_sample(&self, user_id: Uuid, lesson_id: Uuid) -> Result<Option<ViewingLog>> {
        let log = sqlx::query_as::<_, ViewingLog>(
            r#"
            SELECT * FROM viewing_logs
            WHERE user_id = $1 AND lesson_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(log)
    }

    async fn record_sample(&self, log: &NewViewingLog) -> Result<()> {
        // Log append and aggregate fold commit together so the aggregate can
        // never lag behind a row that is already durable.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO viewing_logs
                (id, user_id, lesson_id, "current_time", max_viewed_time, playback_rate, is_visible)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(log.lesson_id)
        .bind(log.current_time)
        .bind(log.max_viewed_time)
        .bind(log.playback_rate)
        .bind(log.is_visible)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO lesson_progress (user_id, lesson_id, max_viewed_time)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, lesson_id)
            DO UPDATE SET
                max_viewed_time = GREATEST(lesson_progress.max_viewed_time, EXCLUDED.max_viewed_time),
                updated_at = now()
            "#,
        )
        .bind(log.user_id)
        .bind(log.lesson_id)
        .bind(log.max_viewed_time)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: f64,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrollments
            SET progress = $3, completed_at = COALESCE(completed_at, $4)
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn quiz_marker(&self, id: Uuid) -> Result<Option<QuizMarker>> {
        let marker = sqlx::query_as::<_, QuizMarker>(
            r#"SELECT id, lesson_id, "timestamp", question, options FROM quiz_markers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(marker)
    }

    async fn lesson_markers(&self, lesson_id: Uuid) -> Result<Vec<QuizMarker>> {
        let markers = sqlx::query_as::<_, QuizMarker>(
            r#"
            SELECT id, lesson_id, "timestamp", question, options
            FROM quiz_markers
            WHERE lesson_id = $1
            ORDER BY "timestamp" ASC
            "#,
        )
        .bind(lesson_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(markers)
    }

    async fn record_quiz_attempt(&self, attempt: &NewQuizAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, user_id, quiz_marker_id, selected_option, is_correct)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(attempt.quiz_marker_id)
        .bind(attempt.selected_option)
        .bind(attempt.is_correct)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_correct_attempt(&self, user_id: Uuid, marker_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM quiz_attempts
                WHERE user_id = $1 AND quiz_marker_id = $2 AND is_correct
            )
            "#,
        )
        .bind(user_id)
        .bind(marker_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn certificate(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Certificate>> {
        let cert = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cert)
    }

    async fn insert_certificate(&self, cert: &Certificate) -> Result<CertificateInsert> {
        let res = sqlx::query(
            r#"
            INSERT INTO certificates (id, user_id, course_id, pdf_url, issued_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&cert.id)
        .bind(cert.user_id)
        .bind(cert.course_id)
        .bind(&cert.pdf_url)
        .bind(cert.issued_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(CertificateInsert::Inserted),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(CertificateInsert::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn mark_enrollment_completed(&self, user_id: Uuid, course_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE enrollments
            SET progress = 100, completed_at = COALESCE(completed_at, now())
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
