use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    goals::MacroTargets,
    state::AppState,
    store::{parse_day, ExerciseDayTotals, FoodDayTotals},
};

// --- public routers ---

pub fn router() -> Router<AppState> {
    Router::new().route("/summary", get(get_summary))
}

// --- dto ---

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// `YYYY-MM-DD`; defaults to the current UTC day.
    pub date: Option<String>,
}

/// One UTC calendar day of intake, burn and goals.
#[derive(Debug, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub food: FoodDayTotals,
    pub exercise: ExerciseDayTotals,
    /// Calories consumed minus calories burned.
    pub net_calories: f64,
    pub targets: MacroTargets,
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<DailySummary>, (StatusCode, String)> {
    let day = match q.date.as_deref() {
        Some(value) => {
            parse_day(value).map_err(|message| (StatusCode::UNPROCESSABLE_ENTITY, message))?
        }
        None => OffsetDateTime::now_utc().date(),
    };

    let food = state
        .store
        .food_day_totals(user_id, day)
        .await
        .map_err(internal)?;
    let exercise = state
        .store
        .exercise_day_totals(user_id, day)
        .await
        .map_err(internal)?;
    let targets = state
        .store
        .get_profile(user_id)
        .await
        .map_err(internal)?
        .map(|profile| profile.targets())
        .unwrap_or_default();

    Ok(Json(DailySummary {
        date: day.to_string(),
        food,
        exercise,
        net_calories: food.calories - exercise.calories_burned,
        targets,
    }))
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
