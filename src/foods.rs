use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    estimator::food_estimate_or_fallback,
    state::AppState,
    store::{DayRange, FoodLogRecord, MealType, NewFoodLog, StoreError},
};

// --- public routers ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/foods", get(list_foods).post(create_food))
        .route("/foods/:id", delete(delete_food))
}

// --- dto ---

#[derive(Debug, Deserialize)]
pub struct CreateFoodRequest {
    pub description: String,
    pub meal_type: MealType,
}

/// GET /foods query. `from`/`to` are inclusive `YYYY-MM-DD` days; either
/// end may be omitted.
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
pub async fn create_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateFoodRequest>,
) -> Result<(StatusCode, HeaderMap, Json<FoodLogRecord>), (StatusCode, String)> {
    let description = payload.description.trim().to_owned();
    if description.is_empty() {
        warn!(%user_id, "rejected food entry with blank description");
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "description must not be empty".into(),
        ));
    }

    let estimate = food_estimate_or_fallback(state.estimator.as_ref(), &description).await;
    let breakdown = if estimate.breakdown.is_empty() {
        None
    } else {
        Some(serde_json::to_value(&estimate.breakdown).map_err(internal)?)
    };

    let entry = NewFoodLog {
        description,
        meal_type: payload.meal_type,
        calories: estimate.calories,
        protein_g: estimate.protein_g,
        carbs_g: estimate.carbs_g,
        fat_g: estimate.fat_g,
        fiber_g: estimate.fiber_g,
        sugar_g: estimate.sugar_g,
        sodium_mg: estimate.sodium_mg,
        confidence: estimate.confidence,
        breakdown,
    };
    let record = state
        .store
        .insert_food(user_id, entry)
        .await
        .map_err(internal)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::LOCATION,
        format!("/api/v1/foods/{}", record.id).parse().unwrap(),
    );

    info!(%user_id, food_id = %record.id, calories = record.calories, "food logged");
    Ok((StatusCode::CREATED, headers, Json(record)))
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<FoodLogRecord>>, (StatusCode, String)> {
    let range = DayRange::parse(q.from.as_deref(), q.to.as_deref())
        .map_err(|message| (StatusCode::UNPROCESSABLE_ENTITY, message))?;

    let entries = state
        .store
        .list_food(user_id, range, q.limit.clamp(1, 100), q.offset.max(0))
        .await
        .map_err(internal)?;
    Ok(Json(entries))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.delete_food(user_id, id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(StoreError::NotFound) => {
            Err((StatusCode::NOT_FOUND, "Food entry not found".into()))
        }
        Err(e) => Err(internal(e)),
    }
}

fn internal<E: std::error::Error>(e: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_query() -> ListQuery {
        ListQuery {
            from: None,
            to: None,
            limit: 20,
            offset: 0,
        }
    }

    async fn log_food(state: &AppState, user_id: Uuid, description: &str) -> FoodLogRecord {
        let (_, _, Json(record)) = create_food(
            State(state.clone()),
            AuthUser(user_id),
            Json(CreateFoodRequest {
                description: description.into(),
                meal_type: MealType::Lunch,
            }),
        )
        .await
        .unwrap();
        record
    }

    #[tokio::test]
    async fn create_logs_the_estimated_meal() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();

        let (status, headers, Json(record)) = create_food(
            State(state),
            AuthUser(user_id),
            Json(CreateFoodRequest {
                description: "  chicken burrito with rice  ".into(),
                meal_type: MealType::Dinner,
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(record.description, "chicken burrito with rice");
        assert_eq!(record.meal_type, MealType::Dinner);
        assert_eq!(record.calories, 430.0);
        assert_eq!(record.protein_g, 22.0);
        assert_eq!(record.confidence, 0.9);
        assert!(record.breakdown.is_some());

        let location = headers
            .get(axum::http::header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert_eq!(location, format!("/api/v1/foods/{}", record.id));
    }

    #[tokio::test]
    async fn create_rejects_blank_descriptions() {
        let state = AppState::fake();
        let err = create_food(
            State(state),
            AuthUser(Uuid::new_v4()),
            Json(CreateFoodRequest {
                description: "   ".into(),
                meal_type: MealType::Snack,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_honours_the_range() {
        let state = AppState::fake();
        let user_id = Uuid::new_v4();

        log_food(&state, user_id, "oatmeal").await;
        let second = log_food(&state, user_id, "salad").await;

        let Json(entries) = list_foods(State(state.clone()), AuthUser(user_id), Query(default_query()))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second.id);

        let future = ListQuery {
            from: Some("2099-01-01".into()),
            ..default_query()
        };
        let Json(entries) = list_foods(State(state.clone()), AuthUser(user_id), Query(future))
            .await
            .unwrap();
        assert!(entries.is_empty());

        let first_page = ListQuery {
            limit: 1,
            ..default_query()
        };
        let Json(entries) = list_foods(State(state), AuthUser(user_id), Query(first_page))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn list_rejects_malformed_dates() {
        let state = AppState::fake();
        let query = ListQuery {
            from: Some("01/06/2025".into()),
            ..default_query()
        };
        let err = list_foods(State(state), AuthUser(Uuid::new_v4()), Query(query))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let state = AppState::fake();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let record = log_food(&state, owner, "protein shake").await;

        let err = delete_food(State(state.clone()), AuthUser(stranger), Path(record.id))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let status = delete_food(State(state.clone()), AuthUser(owner), Path(record.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = delete_food(State(state), AuthUser(owner), Path(record.id))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
