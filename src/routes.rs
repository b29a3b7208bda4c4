use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;
use crate::renderer::{CertificateRenderer, DocumentStore};
use crate::session::AuthUser;
use crate::store::Store;
use crate::{certificate, gating, progress, quiz};

/// Per-request context: storage and the certificate collaborators. Handlers
/// receive it explicitly; nothing is held at module scope.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub renderer: Arc<dyn CertificateRenderer>,
    pub documents: Arc<dyn DocumentStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // telemetry ingestion
        .route("/api/heartbeat", post(heartbeat))
        // quiz gate
        .route("/api/quiz/submit", post(submit_quiz))
        // certification
        .route("/api/certificates/generate", post(generate_certificate))
        // gated lesson access + progress read model
        .route("/api/courses/:course_id/lessons/:lesson_id", get(lesson))
        .route("/api/courses/:course_id/progress", get(course_progress))
        .with_state(state)
}

async fn heartbeat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<HeartbeatReq>,
) -> Result<Json<HeartbeatResp>> {
    let resp = progress::ingest_heartbeat(state.store.as_ref(), &user, &req).await?;
    Ok(Json(resp))
}

async fn submit_quiz(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<QuizSubmitReq>,
) -> Result<Json<QuizSubmitResp>> {
    let resp = quiz::submit_answer(state.store.as_ref(), &user, &req).await?;
    Ok(Json(resp))
}

async fn generate_certificate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CertificateReq>,
) -> Result<Json<CertificateResp>> {
    let cert = certificate::issue(
        state.store.as_ref(),
        state.renderer.as_ref(),
        state.documents.as_ref(),
        &user,
        req.course_id,
    )
    .await?;
    Ok(Json(CertificateResp {
        certificate_id: cert.id,
        pdf_url: cert.pdf_url,
    }))
}

/// Serves a lesson if unlocked; a locked request is corrected with a 303 to
/// the first not-yet-completed lesson.
async fn lesson(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> Result<Response> {
    let store = state.store.as_ref();
    if store.course(course_id).await?.is_none() {
        return Err(Error::NotFound("course"));
    }
    if store.enrollment(user.id, course_id).await?.is_none() {
        return Err(Error::NotEnrolled);
    }

    match gating::evaluate_access(store, user.id, course_id, lesson_id).await? {
        gating::Access::Redirect { lesson_id: target } => Ok(Redirect::to(&format!(
            "/api/courses/{course_id}/lessons/{target}"
        ))
        .into_response()),
        gating::Access::Granted => {
            let lesson = store
                .lesson(lesson_id)
                .await?
                .ok_or(Error::NotFound("lesson"))?;
            let markers = store.lesson_markers(lesson.id).await?;
            let resume = store.latest_sample(user.id, lesson.id).await?;
            let max_viewed = store.lesson_max_viewed(user.id, lesson.id).await?;

            let view = LessonView {
                id: lesson.id,
                course_id: lesson.course_id,
                title: lesson.title,
                video_url: lesson.video_url,
                video_duration: lesson.video_duration,
                lesson_order: lesson.lesson_order,
                quiz_markers: markers
                    .into_iter()
                    .map(|m| QuizMarkerView {
                        id: m.id,
                        timestamp: m.timestamp,
                        question: m.question,
                        options: m.options.0.into_iter().map(|o| o.text).collect(),
                    })
                    .collect(),
                current_time: resume.map(|r| r.current_time).unwrap_or(0),
                max_viewed_time: max_viewed,
                lesson_progress: progress::completion_fraction(
                    max_viewed,
                    lesson.video_duration,
                ) * 100.0,
            };
            Ok(Json(view).into_response())
        }
    }
}

async fn course_progress(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseProgressView>> {
    let store = state.store.as_ref();
    if store.course(course_id).await?.is_none() {
        return Err(Error::NotFound("course"));
    }
    let enrollment = store
        .enrollment(user.id, course_id)
        .await?
        .ok_or(Error::NotEnrolled)?;

    let lessons = store.course_lessons(course_id).await?;
    let mut total_watch_time: i64 = 0;
    let mut fraction_sum = 0.0;
    let mut completed_lessons = 0;
    let mut quizzes_total = 0;
    let mut quizzes_passed = 0;
    let mut states = Vec::with_capacity(lessons.len());

    for (index, lesson) in lessons.iter().enumerate() {
        let max = store.lesson_max_viewed(user.id, lesson.id).await?;
        total_watch_time += i64::from(max);
        fraction_sum += progress::completion_fraction(max, lesson.video_duration);
        let state = gating::lesson_state(store, user.id, &lessons, index).await?;
        if state == gating::LessonState::Completed {
            completed_lessons += 1;
        }
        states.push(LessonStateView {
            id: lesson.id,
            lesson_order: lesson.lesson_order,
            state,
        });
        for marker in store.lesson_markers(lesson.id).await? {
            quizzes_total += 1;
            if store.has_correct_attempt(user.id, marker.id).await? {
                quizzes_passed += 1;
            }
        }
    }

    let progress = if lessons.is_empty() {
        0.0
    } else {
        fraction_sum / lessons.len() as f64 * 100.0
    };

    Ok(Json(CourseProgressView {
        course_id,
        progress,
        total_watch_time,
        completed_lessons,
        total_lessons: lessons.len(),
        quizzes_passed,
        quizzes_total,
        lessons: states,
        completed_at: enrollment.completed_at,
    }))
}
