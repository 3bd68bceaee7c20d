use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    estimator::exercise_estimate_or_fallback,
    state::AppState,
    store::{DayRange, ExerciseLogRecord, NewExerciseLog, StoreError},
};

// --- public routers ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/exercises", get(list_exercises).post(create_exercise))
        .route("/exercises/:id", delete(delete_exercise))
}

// --- dto ---

#[derive(Debug, Deserialize)]
pub struct CreateExerciseRequest {
    pub description: String,
    pub duration_minutes: i32,
}

/// POST /exercises reply. Recommendations come from the estimate and are
/// not persisted with the entry.
#[derive(Debug, Serialize)]
pub struct CreateExerciseResponse {
    pub entry: ExerciseLogRecord,
    pub recommendations: Vec<String>,
}

/// GET /exercises query. `from`/`to` are inclusive `YYYY-MM-DD` days;
/// either end may be omitted.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

// --- handlers ---

#[instrument(skip(state, payload))]
pub async fn create_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateExerciseRequest>,
) -> Result<(StatusCode, HeaderMap, Json<CreateExerciseResponse>), (StatusCode, String)> {
    let description = payload.description.trim().to_owned();
    if description.is_empty() {
        warn!(%user_id, "rejected exercise entry with blank description");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "description must not be empty".into(),
        ));
    }
    if payload.duration_minutes <= 0 {
        warn!(%user_id, duration_minutes = payload.duration_minutes, "rejected exercise entry");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "duration_minutes must be a positive integer".into(),
        ));
    }

    // Body weight sharpens the burn estimate but logging must not depend
    // on a profile existing.
    let weight_kg = match state.store.get_profile(user_id).await {
        Ok(profile) => profile.and_then(|p| p.weight_kg),
        Err(e) => {
            warn!(error = %e, %user_id, "profile lookup failed, estimating without body weight");
            None
        }
    };

    let estimate = exercise_estimate_or_fallback(
        state.estimator.as_ref(),
        &description,
        Some(payload.duration_minutes),
        weight_kg,
    )
    .await;

    let entry = NewExerciseLog {
        description,
        exercise_type: estimate.exercise_type,
        duration_minutes: payload.duration_minutes,
        intensity: estimate.intensity,
        calories_burned: estimate.calories_burned,
        confidence: estimate.confidence,
    };
    let record = state
        .store
        .insert_exercise(user_id, entry)
        .await
        .map_err(internal)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        format!("/api/v1/exercises/{}", record.id).parse().unwrap(),
    );

    info!(
        %user_id,
        exercise_id = %record.id,
        calories_burned = record.calories_burned,
        "exercise logged"
    );
    Ok((
        StatusCode::CREATED,
        headers,
        Json(CreateExerciseResponse {
            entry: record,
            recommendations: estimate.recommendations,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_exercises(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<ExerciseLogRecord>>, (StatusCode, String)> {
    let range = DayRange::parse(q.from.as_deref(), q.to.as_deref())
        .map_err(|message| (StatusCode::UNPROCESSABLE_ENTITY, message))?;

    let entries = state
        .store
        .list_exercise(user_id, range, q.limit.clamp(1, 100), q.offset.max(0))
        .await
        .map_err(internal)?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn delete_exercise(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.delete_exercise(user_id, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound) => {
            Err((StatusCode::NOT_FOUND, "Exercise entry not found".into()))
        }
        Err(e) => Err(internal(e)),
    }
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
