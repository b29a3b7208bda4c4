//! Certification Validator & Issuer: aggregates evidence across every lesson
//! of a course and issues a certificate exactly once.
//!
//! Concurrent issuance is safe without a lock: the (user, course) uniqueness
//! constraint on certificates resolves the race, and the loser falls back to
//! the idempotent read.

use anyhow::anyhow;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, IntegrityViolation, Result};
use crate::models::{Certificate, User};
use crate::renderer::{CertificateData, CertificateRenderer, DocumentStore};
use crate::store::{CertificateInsert, Store};

/// Fraction of the summed lesson durations that must have been watched.
pub const REQUIRED_WATCH_RATIO: f64 = 0.95;

pub async fn issue(
    store: &dyn Store,
    renderer: &dyn CertificateRenderer,
    documents: &dyn DocumentStore,
    user: &User,
    course_id: Uuid,
) -> Result<Certificate> {
    // Idempotent: a second request returns the original certificate.
    if let Some(existing) = store.certificate(user.id, course_id).await? {
        return Ok(existing);
    }

    let course = store
        .course(course_id)
        .await?
        .ok_or(Error::NotFound("course"))?;
    if store.enrollment(user.id, course_id).await?.is_none() {
        return Err(Error::NotEnrolled);
    }

    let lessons = store.course_lessons(course_id).await?;

    // Every marker in the course needs a correct attempt; the scan stops at
    // the first unmet question and names it.
    for lesson in &lessons {
        for marker in store.lesson_markers(lesson.id).await? {
            if !store.has_correct_attempt(user.id, marker.id).await? {
                return Err(Error::Integrity(IntegrityViolation::MissingQuiz {
                    missing_quiz: marker.question,
                }));
            }
        }
    }

    // Watch-time sufficiency over the folded maxima, not raw samples.
    let total_required: i64 = lessons.iter().map(|l| i64::from(l.video_duration)).sum();
    let mut total_watched: i64 = 0;
    for lesson in &lessons {
        total_watched += i64::from(store.lesson_max_viewed(user.id, lesson.id).await?);
    }
    if (total_watched as f64) < REQUIRED_WATCH_RATIO * total_required as f64 {
        let watched_percentage =
            (total_watched as f64 / total_required as f64 * 100.0).round() as i64;
        return Err(Error::Integrity(IntegrityViolation::InsufficientWatchTime {
            watched_percentage,
            required_percentage: (REQUIRED_WATCH_RATIO * 100.0).round() as i64,
        }));
    }

    let issued_at = Utc::now();
    let certificate_id = format!(
        "CERT-{}-{}",
        issued_at.timestamp_millis(),
        &user.id.simple().to_string()[..8]
    );

    let document = renderer
        .render(&CertificateData {
            learner_name: user.display_name().to_string(),
            course_title: course.title.clone(),
            completion_date: issued_at,
            certificate_id: certificate_id.clone(),
        })
        .await?;
    let pdf_url = documents
        .put(&format!("{certificate_id}.pdf"), &document)
        .await?;

    let certificate = Certificate {
        id: certificate_id,
        user_id: user.id,
        course_id,
        pdf_url,
        issued_at,
    };

    match store.insert_certificate(&certificate).await? {
        CertificateInsert::Inserted => {
            // Covers the case where aggregate progress had not reached
            // exactly 100 due to per-lesson rounding.
            store.mark_enrollment_completed(user.id, course_id).await?;
            tracing::info!(
                user = %user.id,
                course = %course_id,
                certificate = %certificate.id,
                "certificate issued"
            );
            Ok(certificate)
        }
        CertificateInsert::Conflict => store
            .certificate(user.id, course_id)
            .await?
            .ok_or_else(|| Error::Internal(anyhow!("certificate conflict without a stored row"))),
    }
}
