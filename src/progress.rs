//! Progress Ingestion Service: the authoritative, idempotent fold of one
//! telemetry sample into durable per-lesson and per-course progress.
//!
//! Correctness under duplicate, reordered, or concurrent delivery comes
//! entirely from the max() merge against recorded history; no sequencing is
//! assumed.

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{HeartbeatReq, HeartbeatResp, NewViewingLog, User};
use crate::store::Store;

/// Per-lesson completion fraction in 0.0..=1.0.
pub fn completion_fraction(max_viewed: i32, duration: i32) -> f64 {
    if duration <= 0 {
        return 0.0;
    }
    (f64::from(max_viewed) / f64::from(duration)).min(1.0)
}

pub async fn ingest_heartbeat(
    store: &dyn Store,
    user: &User,
    req: &HeartbeatReq,
) -> Result<HeartbeatResp> {
    // Server-side rate enforcement. The client guard is a deterrent only;
    // this check is the binding one.
    if req.playback_rate != 1.0 {
        tracing::warn!(
            user = %user.id,
            rate = req.playback_rate,
            "playback rate manipulation detected"
        );
        return Err(Error::Validation("playback rate must be 1.0".into()));
    }

    let lesson = store
        .lesson(req.lesson_id)
        .await?
        .ok_or(Error::NotFound("lesson"))?;
    if store.enrollment(user.id, lesson.course_id).await?.is_none() {
        return Err(Error::NotEnrolled);
    }

    let previous_max = store.lesson_max_viewed(user.id, lesson.id).await?;
    let reported = (req.max_viewed_time.floor() as i32).max(0);
    let new_max = reported.max(previous_max);

    store
        .record_sample(&NewViewingLog {
            user_id: user.id,
            lesson_id: lesson.id,
            current_time: (req.current_time.floor() as i32).max(0),
            max_viewed_time: new_max,
            playback_rate: req.playback_rate,
            is_visible: req.is_visible,
        })
        .await?;

    let lesson_progress = completion_fraction(new_max, lesson.video_duration) * 100.0;

    // Course rollup: mean of per-lesson fractions, each from its own
    // aggregate. O(lessons) per heartbeat.
    let lessons = store.course_lessons(lesson.course_id).await?;
    let mut sum = 0.0;
    for l in &lessons {
        let max = if l.id == lesson.id {
            new_max
        } else {
            store.lesson_max_viewed(user.id, l.id).await?
        };
        sum += completion_fraction(max, l.video_duration);
    }
    let course_progress = sum / lessons.len() as f64 * 100.0;

    // completed_at is set once and never cleared by later, lower
    // recomputations.
    let completed_at = (course_progress >= 100.0).then(Utc::now);
    store
        .update_enrollment_progress(user.id, lesson.course_id, course_progress, completed_at)
        .await?;

    Ok(HeartbeatResp {
        lesson_progress,
        course_progress,
        max_viewed_time: new_max,
    })
}
