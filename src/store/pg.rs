use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    day_bounds, DayRange, ExerciseDayTotals, ExerciseLogRecord, FoodDayTotals, FoodLogRecord,
    NewExerciseLog, NewFoodLog, ProfileRecord, ProfileUpdate, RecordStore, StoreError,
};

/// Postgres-backed record store. Every statement filters on `user_id`, which
/// is what enforces the per-owner visibility rule.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(column: &str, message: String) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.into(),
        source: message.into(),
    }
}

fn parse_col<T>(column: &str, value: String) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e| decode_err(column, e))
}

fn parse_opt<T>(column: &str, value: Option<String>) -> Result<Option<T>, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    value.map(|s| parse_col(column, s)).transpose()
}

// Category columns are TEXT in the schema, so rows come back with plain
// strings and get parsed into the typed records here.

#[derive(FromRow)]
struct ProfileRow {
    user_id: Uuid,
    age: Option<i32>,
    sex: Option<String>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    activity_level: Option<String>,
    goal: Option<String>,
    daily_calorie_goal: i32,
    protein_goal_g: i32,
    carbs_goal_g: i32,
    fat_goal_g: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl ProfileRow {
    fn into_record(self) -> Result<ProfileRecord, sqlx::Error> {
        Ok(ProfileRecord {
            user_id: self.user_id,
            age: self.age,
            sex: parse_opt("sex", self.sex)?,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: parse_opt("activity_level", self.activity_level)?,
            goal: parse_opt("goal", self.goal)?,
            daily_calorie_goal: self.daily_calorie_goal,
            protein_goal_g: self.protein_goal_g,
            carbs_goal_g: self.carbs_goal_g,
            fat_goal_g: self.fat_goal_g,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FoodLogRow {
    id: Uuid,
    user_id: Uuid,
    description: String,
    meal_type: String,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fat_g: f64,
    fiber_g: Option<f64>,
    sugar_g: Option<f64>,
    sodium_mg: Option<f64>,
    confidence: f64,
    breakdown: Option<serde_json::Value>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl FoodLogRow {
    fn into_record(self) -> Result<FoodLogRecord, sqlx::Error> {
        Ok(FoodLogRecord {
            id: self.id,
            user_id: self.user_id,
            description: self.description,
            meal_type: parse_col("meal_type", self.meal_type)?,
            calories: self.calories,
            protein_g: self.protein_g,
            carbs_g: self.carbs_g,
            fat_g: self.fat_g,
            fiber_g: self.fiber_g,
            sugar_g: self.sugar_g,
            sodium_mg: self.sodium_mg,
            confidence: self.confidence,
            breakdown: self.breakdown,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ExerciseLogRow {
    id: Uuid,
    user_id: Uuid,
    description: String,
    exercise_type: String,
    duration_minutes: i32,
    intensity: String,
    calories_burned: f64,
    confidence: f64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl ExerciseLogRow {
    fn into_record(self) -> Result<ExerciseLogRecord, sqlx::Error> {
        Ok(ExerciseLogRecord {
            id: self.id,
            user_id: self.user_id,
            description: self.description,
            exercise_type: parse_col("exercise_type", self.exercise_type)?,
            duration_minutes: self.duration_minutes,
            intensity: parse_col("intensity", self.intensity)?,
            calories_burned: self.calories_burned,
            confidence: self.confidence,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, age, sex, height_cm, weight_kg, activity_level, goal,
                   daily_calorie_goal, protein_goal_g, carbs_goal_g, fat_goal_g,
                   created_at, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ProfileRow::into_record).transpose()?)
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (user_id, age, sex, height_cm, weight_kg, activity_level, goal,
                                  daily_calorie_goal, protein_goal_g, carbs_goal_g, fat_goal_g)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                age = EXCLUDED.age,
                sex = EXCLUDED.sex,
                height_cm = EXCLUDED.height_cm,
                weight_kg = EXCLUDED.weight_kg,
                activity_level = EXCLUDED.activity_level,
                goal = EXCLUDED.goal,
                daily_calorie_goal = EXCLUDED.daily_calorie_goal,
                protein_goal_g = EXCLUDED.protein_goal_g,
                carbs_goal_g = EXCLUDED.carbs_goal_g,
                fat_goal_g = EXCLUDED.fat_goal_g,
                updated_at = now()
            RETURNING user_id, age, sex, height_cm, weight_kg, activity_level, goal,
                      daily_calorie_goal, protein_goal_g, carbs_goal_g, fat_goal_g,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(update.age)
        .bind(update.sex.map(|v| v.as_str()))
        .bind(update.height_cm)
        .bind(update.weight_kg)
        .bind(update.activity_level.map(|v| v.as_str()))
        .bind(update.goal.map(|v| v.as_str()))
        .bind(update.daily_calorie_goal)
        .bind(update.protein_goal_g)
        .bind(update.carbs_goal_g)
        .bind(update.fat_goal_g)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_record()?)
    }

    async fn insert_food(
        &self,
        user_id: Uuid,
        entry: NewFoodLog,
    ) -> Result<FoodLogRecord, StoreError> {
        let row = sqlx::query_as::<_, FoodLogRow>(
            r#"
            INSERT INTO food_logs (user_id, description, meal_type, calories, protein_g,
                                   carbs_g, fat_g, fiber_g, sugar_g, sodium_mg, confidence,
                                   breakdown)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, user_id, description, meal_type, calories, protein_g, carbs_g,
                      fat_g, fiber_g, sugar_g, sodium_mg, confidence, breakdown,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&entry.description)
        .bind(entry.meal_type.as_str())
        .bind(entry.calories)
        .bind(entry.protein_g)
        .bind(entry.carbs_g)
        .bind(entry.fat_g)
        .bind(entry.fiber_g)
        .bind(entry.sugar_g)
        .bind(entry.sodium_mg)
        .bind(entry.confidence)
        .bind(&entry.breakdown)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_record()?)
    }

    async fn list_food(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FoodLogRecord>, StoreError> {
        let (start, end) = range.bounds();
        let rows = sqlx::query_as::<_, FoodLogRow>(
            r#"
            SELECT id, user_id, description, meal_type, calories, protein_g, carbs_g,
                   fat_g, fiber_g, sugar_g, sodium_mg, confidence, breakdown,
                   created_at, updated_at
            FROM food_logs
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| r.into_record().map_err(StoreError::from))
            .collect()
    }

    async fn delete_food(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM food_logs WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn food_day_totals(
        &self,
        user_id: Uuid,
        day: Date,
    ) -> Result<FoodDayTotals, StoreError> {
        let (start, end) = day_bounds(day);
        let totals = sqlx::query_as::<_, FoodDayTotals>(
            r#"
            SELECT COALESCE(SUM(calories), 0)  AS calories,
                   COALESCE(SUM(protein_g), 0) AS protein_g,
                   COALESCE(SUM(carbs_g), 0)   AS carbs_g,
                   COALESCE(SUM(fat_g), 0)     AS fat_g
            FROM food_logs
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    async fn insert_exercise(
        &self,
        user_id: Uuid,
        entry: NewExerciseLog,
    ) -> Result<ExerciseLogRecord, StoreError> {
        let row = sqlx::query_as::<_, ExerciseLogRow>(
            r#"
            INSERT INTO exercise_logs (user_id, description, exercise_type, duration_minutes,
                                       intensity, calories_burned, confidence)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, description, exercise_type, duration_minutes, intensity,
                      calories_burned, confidence, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&entry.description)
        .bind(entry.exercise_type.as_str())
        .bind(entry.duration_minutes)
        .bind(entry.intensity.as_str())
        .bind(entry.calories_burned)
        .bind(entry.confidence)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_record()?)
    }

    async fn list_exercise(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExerciseLogRecord>, StoreError> {
        let (start, end) = range.bounds();
        let rows = sqlx::query_as::<_, ExerciseLogRow>(
            r#"
            SELECT id, user_id, description, exercise_type, duration_minutes, intensity,
                   calories_burned, confidence, created_at, updated_at
            FROM exercise_logs
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at < $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| r.into_record().map_err(StoreError::from))
            .collect()
    }

    async fn delete_exercise(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(r#"DELETE FROM exercise_logs WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn exercise_day_totals(
        &self,
        user_id: Uuid,
        day: Date,
    ) -> Result<ExerciseDayTotals, StoreError> {
        let (start, end) = day_bounds(day);
        let totals = sqlx::query_as::<_, ExerciseDayTotals>(
            r#"
            SELECT COALESCE(SUM(calories_burned), 0) AS calories_burned
            FROM exercise_logs
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }
}
