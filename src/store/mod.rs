use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::goals::{ActivityLevel, FitnessGoal, MacroTargets, Sex};

#[cfg(test)]
pub mod memory;
pub mod pg;

#[cfg(test)]
pub use memory::MemoryStore;
pub use pg::PgStore;

/// Which meal of the day a food entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl std::str::FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            "snack" => Ok(MealType::Snack),
            other => Err(format!("unknown meal type: {other}")),
        }
    }
}

/// Broad category of a logged workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Cardio,
    Strength,
    Flexibility,
    Sports,
    Other,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Cardio => "cardio",
            ExerciseType::Strength => "strength",
            ExerciseType::Flexibility => "flexibility",
            ExerciseType::Sports => "sports",
            ExerciseType::Other => "other",
        }
    }
}

impl std::str::FromStr for ExerciseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardio" => Ok(ExerciseType::Cardio),
            "strength" => Ok(ExerciseType::Strength),
            "flexibility" => Ok(ExerciseType::Flexibility),
            "sports" => Ok(ExerciseType::Sports),
            "other" => Ok(ExerciseType::Other),
            other => Err(format!("unknown exercise type: {other}")),
        }
    }
}

/// Perceived effort of a logged workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Light,
    Moderate,
    Vigorous,
    High,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Light => "light",
            Intensity::Moderate => "moderate",
            Intensity::Vigorous => "vigorous",
            Intensity::High => "high",
        }
    }
}

impl std::str::FromStr for Intensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Intensity::Light),
            "moderate" => Ok(Intensity::Moderate),
            "vigorous" => Ok(Intensity::Vigorous),
            "high" => Ok(Intensity::High),
            other => Err(format!("unknown intensity: {other}")),
        }
    }
}

/// A user's profile row. The four goal columns are derived from the inputs
/// by the profile handler on every write and are never set by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub user_id: Uuid,
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<FitnessGoal>,
    pub daily_calorie_goal: i32,
    pub protein_goal_g: i32,
    pub carbs_goal_g: i32,
    pub fat_goal_g: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProfileRecord {
    /// The stored goal columns as one value.
    pub fn targets(&self) -> MacroTargets {
        MacroTargets {
            tdee: self.daily_calorie_goal,
            protein_g: self.protein_goal_g,
            carbs_g: self.carbs_goal_g,
            fat_g: self.fat_goal_g,
        }
    }
}

/// Full replacement value for a profile write, including the recomputed
/// goal columns.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<FitnessGoal>,
    pub daily_calorie_goal: i32,
    pub protein_goal_g: i32,
    pub carbs_goal_g: i32,
    pub fat_goal_g: i32,
}

/// A logged meal with its estimated nutrition. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLogRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub meal_type: MealType,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub confidence: f64,
    pub breakdown: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert value for a food entry; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewFoodLog {
    pub description: String,
    pub meal_type: MealType,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub confidence: f64,
    pub breakdown: Option<serde_json::Value>,
}

/// A logged workout with its estimated calorie burn. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseLogRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub exercise_type: ExerciseType,
    pub duration_minutes: i32,
    pub intensity: Intensity,
    pub calories_burned: f64,
    pub confidence: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert value for an exercise entry; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewExerciseLog {
    pub description: String,
    pub exercise_type: ExerciseType,
    pub duration_minutes: i32,
    pub intensity: Intensity,
    pub calories_burned: f64,
    pub confidence: f64,
}

/// Nutrition consumed over one calendar day, summed over its food entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct FoodDayTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Calories burned over one calendar day, summed over its exercise entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct ExerciseDayTotals {
    pub calories_burned: f64,
}

/// Inclusive range of UTC calendar days for listing calls. Either end may
/// be open.
#[derive(Debug, Clone, Copy, Default)]
pub struct DayRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DayRange {
    /// Builds a range from optional `YYYY-MM-DD` query values.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let from = from.map(parse_day).transpose()?;
        let to = to.map(parse_day).transpose()?;
        Ok(Self { from, to })
    }

    /// Half-open UTC timestamp window covering the range.
    pub fn bounds(&self) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
        let start = self.from.map(|d| d.midnight().assume_utc());
        let end = self
            .to
            .and_then(|d| d.next_day())
            .map(|d| d.midnight().assume_utc());
        (start, end)
    }
}

/// Parses a `YYYY-MM-DD` calendar day.
pub fn parse_day(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|_| format!("invalid calendar day: {value}"))
}

/// Half-open UTC timestamp window `[00:00, next 00:00)` for one calendar day.
pub fn day_bounds(day: Date) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_utc();
    let end = day
        .next_day()
        .map_or(OffsetDateTime::new_utc(Date::MAX, time::Time::MIDNIGHT), |d| {
            d.midnight().assume_utc()
        });
    (start, end)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence contract for profile, food-log and exercise-log records.
///
/// Every call is scoped by the owner's `user_id`: implementations must never
/// return, modify or delete another user's records, so a foreign id behaves
/// exactly like a missing one.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, StoreError>;

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError>;

    async fn insert_food(
        &self,
        user_id: Uuid,
        entry: NewFoodLog,
    ) -> Result<FoodLogRecord, StoreError>;

    /// The owner's food entries, newest first.
    async fn list_food(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FoodLogRecord>, StoreError>;

    async fn delete_food(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    async fn food_day_totals(&self, user_id: Uuid, day: Date)
        -> Result<FoodDayTotals, StoreError>;

    async fn insert_exercise(
        &self,
        user_id: Uuid,
        entry: NewExerciseLog,
    ) -> Result<ExerciseLogRecord, StoreError>;

    /// The owner's exercise entries, newest first.
    async fn list_exercise(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExerciseLogRecord>, StoreError>;

    async fn delete_exercise(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError>;

    async fn exercise_day_totals(
        &self,
        user_id: Uuid,
        day: Date,
    ) -> Result<ExerciseDayTotals, StoreError>;
}
