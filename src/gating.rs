//! Lesson Gating Evaluator: a pure read-time decision over state the
//! ingestion service and quiz gate already recorded.
//!
//! Completion has one canonical definition used everywhere gating decisions
//! are made: video watched to at least 99% of its duration, and every quiz
//! marker of the lesson answered correctly at least once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Lesson;
use crate::quiz;
use crate::store::Store;

pub const COMPLETION_WATCH_RATIO: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonState {
    Locked,
    Unlocked,
    Completed,
}

/// Result of a lesson access request. A locked lesson is never an error;
/// the request is corrected to the first not-yet-completed lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect { lesson_id: Uuid },
}

pub async fn lesson_completed(store: &dyn Store, user_id: Uuid, lesson: &Lesson) -> Result<bool> {
    let max_viewed = store.lesson_max_viewed(user_id, lesson.id).await?;
    if f64::from(max_viewed) < COMPLETION_WATCH_RATIO * f64::from(lesson.video_duration) {
        return Ok(false);
    }
    quiz::lesson_quiz_complete(store, user_id, lesson.id).await
}

/// Decides whether the requested lesson may be served. The first lesson is
/// always unlocked for an enrollee; lesson i requires lesson i-1 completed,
/// so the unlocked frontier is the first not-yet-completed lesson in order.
pub async fn evaluate_access(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
    lesson_id: Uuid,
) -> Result<Access> {
    let lessons = store.course_lessons(course_id).await?;
    let requested = lessons
        .iter()
        .position(|l| l.id == lesson_id)
        .ok_or(Error::NotFound("lesson"))?;

    for (i, lesson) in lessons.iter().enumerate() {
        if i == requested {
            return Ok(Access::Granted);
        }
        if !lesson_completed(store, user_id, lesson).await? {
            // `lesson` is the frontier and the requested one lies beyond it.
            return Ok(Access::Redirect {
                lesson_id: lesson.id,
            });
        }
    }
    Ok(Access::Granted)
}

/// Per-lesson state, derived for progress summaries.
pub async fn lesson_state(
    store: &dyn Store,
    user_id: Uuid,
    lessons: &[Lesson],
    index: usize,
) -> Result<LessonState> {
    let lesson = &lessons[index];
    if lesson_completed(store, user_id, lesson).await? {
        return Ok(LessonState::Completed);
    }
    if index == 0 {
        return Ok(LessonState::Unlocked);
    }
    if lesson_completed(store, user_id, &lessons[index - 1]).await? {
        Ok(LessonState::Unlocked)
    } else {
        Ok(LessonState::Locked)
    }
}
