use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::store::{ExerciseType, Intensity};

pub mod llm;

pub use llm::LlmEstimator;

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("estimator API key is not configured")]
    NotConfigured,
    #[error("estimator request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("estimator API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("malformed estimator response: {0}")]
    Malformed(String),
}

/// One component of an estimated meal, e.g. "grilled chicken breast".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodBreakdownItem {
    pub name: String,
    pub calories: f64,
}

/// Estimated nutrition for a free-text meal description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEstimate {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub confidence: f64,
    pub breakdown: Vec<FoodBreakdownItem>,
}

impl FoodEstimate {
    /// Placeholder served when estimation fails. Confidence 0 marks the
    /// entry as unestimated.
    pub fn fallback() -> Self {
        Self {
            calories: 250.0,
            protein_g: 10.0,
            carbs_g: 30.0,
            fat_g: 10.0,
            fiber_g: None,
            sugar_g: None,
            sodium_mg: None,
            confidence: 0.0,
            breakdown: Vec::new(),
        }
    }
}

/// One activity within an estimated workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseBreakdownItem {
    pub activity: String,
    pub calories_burned: f64,
}

/// Estimated calorie burn for a free-text workout description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEstimate {
    pub calories_burned: f64,
    pub exercise_type: ExerciseType,
    pub intensity: Intensity,
    pub confidence: f64,
    pub breakdown: Vec<ExerciseBreakdownItem>,
    pub recommendations: Vec<String>,
}

impl ExerciseEstimate {
    pub fn fallback() -> Self {
        Self {
            calories_burned: 200.0,
            exercise_type: ExerciseType::Other,
            intensity: Intensity::Moderate,
            confidence: 0.0,
            breakdown: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Estimation Service contract. Implementations may fail or return garbage;
/// callers that must not block on estimation go through the `_or_fallback`
/// wrappers instead of calling these directly.
#[async_trait]
pub trait NutritionEstimator: Send + Sync {
    async fn estimate_food(&self, description: &str) -> Result<FoodEstimate, EstimatorError>;

    async fn estimate_exercise(
        &self,
        description: &str,
        duration_minutes: Option<i32>,
        weight_kg: Option<f64>,
    ) -> Result<ExerciseEstimate, EstimatorError>;
}

/// Estimates a meal, substituting [`FoodEstimate::fallback`] on any failure.
pub async fn food_estimate_or_fallback(
    estimator: &dyn NutritionEstimator,
    description: &str,
) -> FoodEstimate {
    match estimator.estimate_food(description).await {
        Ok(estimate) => estimate,
        Err(e) => {
            warn!(error = %e, "food estimation failed, using fallback values");
            FoodEstimate::fallback()
        }
    }
}

/// Estimates a workout, substituting [`ExerciseEstimate::fallback`] on any
/// failure.
pub async fn exercise_estimate_or_fallback(
    estimator: &dyn NutritionEstimator,
    description: &str,
    duration_minutes: Option<i32>,
    weight_kg: Option<f64>,
) -> ExerciseEstimate {
    match estimator
        .estimate_exercise(description, duration_minutes, weight_kg)
        .await
    {
        Ok(estimate) => estimate,
        Err(e) => {
            warn!(error = %e, "exercise estimation failed, using fallback values");
            ExerciseEstimate::fallback()
        }
    }
}
