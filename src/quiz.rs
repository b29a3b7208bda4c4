//! Quiz Gate: grades one answer, records the attempt, and computes the
//! corrective rewind point for incorrect answers.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{NewQuizAttempt, QuizSubmitReq, QuizSubmitResp, User};
use crate::store::Store;

/// Lead-in before the marker to which an incorrect answer rewinds.
pub const REWIND_LEAD_SECS: i32 = 30;

pub async fn submit_answer(
    store: &dyn Store,
    user: &User,
    req: &QuizSubmitReq,
) -> Result<QuizSubmitResp> {
    let marker = store
        .quiz_marker(req.quiz_marker_id)
        .await?
        .ok_or(Error::NotFound("quiz marker"))?;

    let selected = usize::try_from(req.selected_option)
        .ok()
        .and_then(|i| marker.options.0.get(i))
        .ok_or_else(|| Error::Validation("invalid option index".into()))?;

    // Grading consults only the selected option's own flag.
    let is_correct = selected.is_correct;

    // Every attempt is recorded, enabling the "has ever answered correctly"
    // check used by gating and certification.
    store
        .record_quiz_attempt(&NewQuizAttempt {
            user_id: user.id,
            quiz_marker_id: marker.id,
            selected_option: req.selected_option,
            is_correct,
        })
        .await?;

    let rewind_to = (!is_correct).then(|| (marker.timestamp - REWIND_LEAD_SECS).max(0));
    Ok(QuizSubmitResp {
        is_correct,
        rewind_to,
    })
}

/// True when every quiz marker of the lesson has at least one correct
/// attempt by this user. Order of answering is irrelevant.
pub async fn lesson_quiz_complete(
    store: &dyn Store,
    user_id: Uuid,
    lesson_id: Uuid,
) -> Result<bool> {
    for marker in store.lesson_markers(lesson_id).await? {
        if !store.has_correct_attempt(user_id, marker.id).await? {
            return Ok(false);
        }
    }
    Ok(true)
}
