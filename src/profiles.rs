use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    goals::{calculate_targets, ActivityLevel, FitnessGoal, GoalInput, MacroTargets, Sex},
    state::AppState,
    store::{ProfileRecord, ProfileUpdate},
};

// --- public routers ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/goals", get(get_goals))
}

// --- dto ---

/// PUT /profile body. The row is replaced as a whole, so an omitted field
/// clears its column. The four goal columns are recomputed here and cannot
/// be set by the client.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<FitnessGoal>,
}

impl UpdateProfileRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(age) = self.age {
            if age <= 0 {
                return Err("age must be a positive integer".into());
            }
        }
        if let Some(height) = self.height_cm {
            if !height.is_finite() || height <= 0.0 {
                return Err("height_cm must be a positive number".into());
            }
        }
        if let Some(weight) = self.weight_kg {
            if !weight.is_finite() || weight <= 0.0 {
                return Err("weight_kg must be a positive number".into());
            }
        }
        Ok(())
    }

    fn goal_input(&self) -> GoalInput {
        GoalInput {
            age: self.age,
            sex: self.sex,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: self.activity_level,
            goal: self.goal,
        }
    }
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileRecord>, (StatusCode, String)> {
    match state.store.get_profile(user_id).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Profile not set up yet".into())),
        Err(e) => Err(internal(e)),
    }
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileRecord>, (StatusCode, String)> {
    if let Err(message) = payload.validate() {
        warn!(%user_id, %message, "rejected profile update");
        return Err((StatusCode::UNPROCESSABLE_ENTITY, message));
    }

    let targets = calculate_targets(&payload.goal_input());
    let update = ProfileUpdate {
        age: payload.age,
        sex: payload.sex,
        height_cm: payload.height_cm,
        weight_kg: payload.weight_kg,
        activity_level: payload.activity_level,
        goal: payload.goal,
        daily_calorie_goal: targets.tdee,
        protein_goal_g: targets.protein_g,
        carbs_goal_g: targets.carbs_g,
        fat_goal_g: targets.fat_g,
    };

    let profile = state
        .store
        .upsert_profile(user_id, update)
        .await
        .map_err(internal)?;

    info!(%user_id, daily_calorie_goal = profile.daily_calorie_goal, "profile saved");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MacroTargets>, (StatusCode, String)> {
    let targets = state
        .store
        .get_profile(user_id)
        .await
        .map_err(internal)?
        .map(|profile| profile.targets())
        .unwrap_or_default();
    Ok(Json(targets))
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
