use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::EstimatorConfig;
use crate::store::{ExerciseType, Intensity};

use super::{
    EstimatorError, ExerciseBreakdownItem, ExerciseEstimate, FoodBreakdownItem, FoodEstimate,
    NutritionEstimator,
};

const CONNECT_TIMEOUT_SECS: u64 = 10;

const FOOD_SYSTEM_PROMPT: &str = "You are a nutrition estimation service. \
Reply with a single JSON object and nothing else, using exactly these keys: \
calories (kcal), protein_g, carbs_g, fat_g (grams, all numbers), \
fiber_g, sugar_g, sodium_mg (numbers; omit when unknown), \
confidence (number between 0 and 1), \
breakdown (array of {\"name\", \"calories\"} objects, one per component). \
Estimate realistic values for the meal the user describes.";

const EXERCISE_SYSTEM_PROMPT: &str = "You are a workout estimation service. \
Reply with a single JSON object and nothing else, using exactly these keys: \
calories_burned (kcal, number), \
exercise_type (one of: cardio, strength, flexibility, sports, other), \
intensity (one of: light, moderate, vigorous, high), \
confidence (number between 0 and 1), \
breakdown (array of {\"activity\", \"calories_burned\"} objects), \
recommendations (array of short strings). \
Estimate realistic values for the workout the user describes.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Estimation Service client for any OpenAI-compatible chat-completions
/// endpoint. Without an API key every call reports
/// [`EstimatorError::NotConfigured`] and the fallback values serve.
pub struct LlmEstimator {
    client: Client,
    config: EstimatorConfig,
}

impl LlmEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self, EstimatorError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Sends one system+user exchange and returns the first choice's content.
    async fn complete(&self, system: &'static str, user: String) -> Result<String, EstimatorError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(EstimatorError::NotConfigured);
        };

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_owned(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens: 512,
            stream: false,
        };

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EstimatorError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| EstimatorError::Malformed(format!("response envelope: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EstimatorError::Malformed("response has no message content".into()))?;

        debug!(model = %self.config.model, chars = content.len(), "received estimator completion");
        Ok(content)
    }
}

#[async_trait]
impl NutritionEstimator for LlmEstimator {
    #[instrument(skip(self, description))]
    async fn estimate_food(&self, description: &str) -> Result<FoodEstimate, EstimatorError> {
        let user = format!("Estimate the nutrition of this meal: {description}");
        let content = self.complete(FOOD_SYSTEM_PROMPT, user).await?;
        parse_food_content(&content)
    }

    #[instrument(skip(self, description))]
    async fn estimate_exercise(
        &self,
        description: &str,
        duration_minutes: Option<i32>,
        weight_kg: Option<f64>,
    ) -> Result<ExerciseEstimate, EstimatorError> {
        let mut user = format!("Estimate the calories burned by this workout: {description}");
        if let Some(minutes) = duration_minutes {
            user.push_str(&format!(" Duration: {minutes} minutes."));
        }
        if let Some(weight) = weight_kg {
            user.push_str(&format!(" Body weight: {weight} kg."));
        }
        let content = self.complete(EXERCISE_SYSTEM_PROMPT, user).await?;
        parse_exercise_content(&content)
    }
}

// Raw wire shapes: everything optional so validation, not deserialization,
// decides what counts as malformed.

#[derive(Debug, Deserialize)]
struct RawFoodEstimate {
    calories: Option<f64>,
    protein_g: Option<f64>,
    carbs_g: Option<f64>,
    fat_g: Option<f64>,
    fiber_g: Option<f64>,
    sugar_g: Option<f64>,
    sodium_mg: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    breakdown: Vec<RawFoodBreakdownItem>,
}

#[derive(Debug, Deserialize)]
struct RawFoodBreakdownItem {
    name: Option<String>,
    calories: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawExerciseEstimate {
    calories_burned: Option<f64>,
    exercise_type: Option<String>,
    intensity: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    breakdown: Vec<RawExerciseBreakdownItem>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawExerciseBreakdownItem {
    activity: Option<String>,
    calories_burned: Option<f64>,
}

fn required_amount(value: Option<f64>, field: &str) -> Result<f64, EstimatorError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(v) => Err(EstimatorError::Malformed(format!(
            "{field} must be a non-negative number, got {v}"
        ))),
        None => Err(EstimatorError::Malformed(format!("missing field {field}"))),
    }
}

fn optional_amount(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

fn clamp_confidence(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn required_category<T>(value: Option<String>, field: &str) -> Result<T, EstimatorError>
where
    T: std::str::FromStr<Err = String>,
{
    let raw = value.ok_or_else(|| EstimatorError::Malformed(format!("missing field {field}")))?;
    raw.trim()
        .to_lowercase()
        .parse()
        .map_err(EstimatorError::Malformed)
}

fn parse_food_content(content: &str) -> Result<FoodEstimate, EstimatorError> {
    let json = extract_json(content)?;
    let raw: RawFoodEstimate = serde_json::from_str(&json)
        .map_err(|e| EstimatorError::Malformed(format!("food estimate shape: {e}")))?;

    let breakdown = raw
        .breakdown
        .into_iter()
        .filter_map(|item| {
            let name = item.name?;
            let calories = item.calories.filter(|c| c.is_finite() && *c >= 0.0)?;
            Some(FoodBreakdownItem { name, calories })
        })
        .collect();

    Ok(FoodEstimate {
        calories: required_amount(raw.calories, "calories")?,
        protein_g: required_amount(raw.protein_g, "protein_g")?,
        carbs_g: required_amount(raw.carbs_g, "carbs_g")?,
        fat_g: required_amount(raw.fat_g, "fat_g")?,
        fiber_g: optional_amount(raw.fiber_g),
        sugar_g: optional_amount(raw.sugar_g),
        sodium_mg: optional_amount(raw.sodium_mg),
        confidence: clamp_confidence(raw.confidence),
        breakdown,
    })
}

fn parse_exercise_content(content: &str) -> Result<ExerciseEstimate, EstimatorError> {
    let json = extract_json(content)?;
    let raw: RawExerciseEstimate = serde_json::from_str(&json)
        .map_err(|e| EstimatorError::Malformed(format!("exercise estimate shape: {e}")))?;

    let breakdown = raw
        .breakdown
        .into_iter()
        .filter_map(|item| {
            let activity = item.activity?;
            let calories_burned = item.calories_burned.filter(|c| c.is_finite() && *c >= 0.0)?;
            Some(ExerciseBreakdownItem {
                activity,
                calories_burned,
            })
        })
        .collect();

    Ok(ExerciseEstimate {
        calories_burned: required_amount(raw.calories_burned, "calories_burned")?,
        exercise_type: required_category::<ExerciseType>(raw.exercise_type, "exercise_type")?,
        intensity: required_category::<Intensity>(raw.intensity, "intensity")?,
        confidence: clamp_confidence(raw.confidence),
        breakdown,
        recommendations: raw.recommendations,
    })
}

/// Pulls the JSON object out of model output that may wrap it in prose or
/// a code fence.
fn extract_json(response: &str) -> Result<String, EstimatorError> {
    if serde_json::from_str::<serde_json::Value>(response).is_ok() {
        return Ok(response.to_owned());
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            let candidate = &response[start..=end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Ok(candidate.to_owned());
            }
        }
    }

    if let Some(start) = response.find("```json") {
        let rest = &response[start + 7..];
        if let Some(end) = rest.find("```") {
            return extract_json(rest[..end].trim());
        }
    }

    Err(EstimatorError::Malformed(
        "no JSON object in model output".into(),
    ))
}
