use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    day_bounds, DayRange, ExerciseDayTotals, ExerciseLogRecord, FoodDayTotals, FoodLogRecord,
    NewExerciseLog, NewFoodLog, ProfileRecord, ProfileUpdate, RecordStore, StoreError,
};

/// In-memory record store honouring the same per-owner contract as
/// [`PgStore`](super::PgStore). Backs `AppState::fake()` and the contract
/// tests below.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    profiles: HashMap<Uuid, ProfileRecord>,
    foods: Vec<FoodLogRecord>,
    exercises: Vec<ExerciseLogRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("store lock poisoned")
    }
}

fn in_window(at: OffsetDateTime, start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> bool {
    start.map_or(true, |s| at >= s) && end.map_or(true, |e| at < e)
}

fn page<T>(mut items: Vec<T>, limit: i64, offset: i64) -> Vec<T>
where
    T: Clone,
{
    let offset = offset.max(0) as usize;
    let limit = limit.max(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(..offset);
    items.truncate(limit);
    items
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, StoreError> {
        Ok(self.read().profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> Result<ProfileRecord, StoreError> {
        let mut inner = self.write();
        let now = OffsetDateTime::now_utc();
        let created_at = inner
            .profiles
            .get(&user_id)
            .map_or(now, |existing| existing.created_at);
        let record = ProfileRecord {
            user_id,
            age: update.age,
            sex: update.sex,
            height_cm: update.height_cm,
            weight_kg: update.weight_kg,
            activity_level: update.activity_level,
            goal: update.goal,
            daily_calorie_goal: update.daily_calorie_goal,
            protein_goal_g: update.protein_goal_g,
            carbs_goal_g: update.carbs_goal_g,
            fat_goal_g: update.fat_goal_g,
            created_at,
            updated_at: now,
        };
        inner.profiles.insert(user_id, record.clone());
        Ok(record)
    }

    async fn insert_food(
        &self,
        user_id: Uuid,
        entry: NewFoodLog,
    ) -> Result<FoodLogRecord, StoreError> {
        let now = OffsetDateTime::now_utc();
        let record = FoodLogRecord {
            id: Uuid::new_v4(),
            user_id,
            description: entry.description,
            meal_type: entry.meal_type,
            calories: entry.calories,
            protein_g: entry.protein_g,
            carbs_g: entry.carbs_g,
            fat_g: entry.fat_g,
            fiber_g: entry.fiber_g,
            sugar_g: entry.sugar_g,
            sodium_mg: entry.sodium_mg,
            confidence: entry.confidence,
            breakdown: entry.breakdown,
            created_at: now,
            updated_at: now,
        };
        self.write().foods.push(record.clone());
        Ok(record)
    }

    async fn list_food(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FoodLogRecord>, StoreError> {
        let (start, end) = range.bounds();
        let mut matches: Vec<FoodLogRecord> = self
            .read()
            .foods
            .iter()
            .filter(|f| f.user_id == user_id && in_window(f.created_at, start, end))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(matches, limit, offset))
    }

    async fn delete_food(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write();
        let position = inner
            .foods
            .iter()
            .position(|f| f.id == id && f.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        inner.foods.remove(position);
        Ok(())
    }

    async fn food_day_totals(
        &self,
        user_id: Uuid,
        day: Date,
    ) -> Result<FoodDayTotals, StoreError> {
        let (start, end) = day_bounds(day);
        let inner = self.read();
        let mut totals = FoodDayTotals::default();
        for entry in inner
            .foods
            .iter()
            .filter(|f| f.user_id == user_id && in_window(f.created_at, Some(start), Some(end)))
        {
            totals.calories += entry.calories;
            totals.protein_g += entry.protein_g;
            totals.carbs_g += entry.carbs_g;
            totals.fat_g += entry.fat_g;
        }
        Ok(totals)
    }

    async fn insert_exercise(
        &self,
        user_id: Uuid,
        entry: NewExerciseLog,
    ) -> Result<ExerciseLogRecord, StoreError> {
        let now = OffsetDateTime::now_utc();
        let record = ExerciseLogRecord {
            id: Uuid::new_v4(),
            user_id,
            description: entry.description,
            exercise_type: entry.exercise_type,
            duration_minutes: entry.duration_minutes,
            intensity: entry.intensity,
            calories_burned: entry.calories_burned,
            confidence: entry.confidence,
            created_at: now,
            updated_at: now,
        };
        self.write().exercises.push(record.clone());
        Ok(record)
    }

    async fn list_exercise(
        &self,
        user_id: Uuid,
        range: DayRange,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExerciseLogRecord>, StoreError> {
        let (start, end) = range.bounds();
        let mut matches: Vec<ExerciseLogRecord> = self
            .read()
            .exercises
            .iter()
            .filter(|e| e.user_id == user_id && in_window(e.created_at, start, end))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(matches, limit, offset))
    }

    async fn delete_exercise(&self, user_id: Uuid, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write();
        let position = inner
            .exercises
            .iter()
            .position(|e| e.id == id && e.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        inner.exercises.remove(position);
        Ok(())
    }

    async fn exercise_day_totals(
        &self,
        user_id: Uuid,
        day: Date,
    ) -> Result<ExerciseDayTotals, StoreError> {
        let (start, end) = day_bounds(day);
        let inner = self.read();
        let mut totals = ExerciseDayTotals::default();
        for entry in inner
            .exercises
            .iter()
            .filter(|e| e.user_id == user_id && in_window(e.created_at, Some(start), Some(end)))
        {
            totals.calories_burned += entry.calories_burned;
        }
        Ok(totals)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Rewrites an entry's created timestamp so tests can place it on an
    /// earlier calendar day.
    fn backdate_food(&self, id: Uuid, created_at: OffsetDateTime) {
        let mut inner = self.write();
        let entry = inner
            .foods
            .iter_mut()
            .find(|f| f.id == id)
            .expect("food entry to backdate");
        entry.created_at = created_at;
        entry.updated_at = created_at;
    }

    fn backdate_exercise(&self, id: Uuid, created_at: OffsetDateTime) {
        let mut inner = self.write();
        let entry = inner
            .exercises
            .iter_mut()
            .find(|e| e.id == id)
            .expect("exercise entry to backdate");
        entry.created_at = created_at;
        entry.updated_at = created_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::{ActivityLevel, FitnessGoal, Sex};
    use crate::store::{ExerciseType, Intensity, MealType};
    use time::Duration;

    fn food(description: &str, calories: f64) -> NewFoodLog {
        NewFoodLog {
            description: description.into(),
            meal_type: MealType::Lunch,
            calories,
            protein_g: 10.0,
            carbs_g: 20.0,
            fat_g: 5.0,
            fiber_g: None,
            sugar_g: None,
            sodium_mg: None,
            confidence: 0.8,
            breakdown: None,
        }
    }

    fn exercise(description: &str, burned: f64) -> NewExerciseLog {
        NewExerciseLog {
            description: description.into(),
            exercise_type: ExerciseType::Cardio,
            duration_minutes: 30,
            intensity: Intensity::Moderate,
            calories_burned: burned,
            confidence: 0.7,
        }
    }

    fn profile_update(weight_kg: f64) -> ProfileUpdate {
        ProfileUpdate {
            age: Some(25),
            sex: Some(Sex::Male),
            height_cm: Some(180.0),
            weight_kg: Some(weight_kg),
            activity_level: Some(ActivityLevel::Moderate),
            goal: Some(FitnessGoal::LoseWeight),
            daily_calorie_goal: 2298,
            protein_goal_g: 160,
            carbs_goal_g: 252,
            fat_goal_g: 72,
        }
    }

    #[tokio::test]
    async fn records_of_one_user_are_invisible_to_another() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let meal = store.insert_food(alice, food("omelette", 320.0)).await.unwrap();
        let run = store.insert_exercise(alice, exercise("run", 250.0)).await.unwrap();

        assert!(store
            .list_food(bob, DayRange::default(), 20, 0)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .list_exercise(bob, DayRange::default(), 20, 0)
            .await
            .unwrap()
            .is_empty());

        // A foreign id must be indistinguishable from a missing one.
        assert!(matches!(
            store.delete_food(bob, meal.id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete_exercise(bob, run.id).await,
            Err(StoreError::NotFound)
        ));

        let today = OffsetDateTime::now_utc().date();
        assert_eq!(
            store.food_day_totals(bob, today).await.unwrap(),
            FoodDayTotals::default()
        );

        // The owner still sees everything.
        assert_eq!(store.list_food(alice, DayRange::default(), 20, 0).await.unwrap().len(), 1);
        store.delete_food(alice, meal.id).await.unwrap();
    }

    #[tokio::test]
    async fn day_totals_sum_entries_and_are_idempotent() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let today = OffsetDateTime::now_utc().date();

        store.insert_food(user, food("porridge", 300.0)).await.unwrap();
        store.insert_food(user, food("salad", 150.0)).await.unwrap();
        let old = store.insert_food(user, food("pizza", 900.0)).await.unwrap();
        store.backdate_food(old.id, OffsetDateTime::now_utc() - Duration::days(1));

        let totals = store.food_day_totals(user, today).await.unwrap();
        assert_eq!(totals.calories, 450.0);
        assert_eq!(totals.protein_g, 20.0);
        assert_eq!(totals.carbs_g, 40.0);
        assert_eq!(totals.fat_g, 10.0);

        // Reading again must not change the answer.
        assert_eq!(store.food_day_totals(user, today).await.unwrap(), totals);

        let yesterday = today.previous_day().unwrap();
        assert_eq!(
            store.food_day_totals(user, yesterday).await.unwrap().calories,
            900.0
        );
    }

    #[tokio::test]
    async fn exercise_day_totals_sum_calories_burned() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let today = OffsetDateTime::now_utc().date();

        store.insert_exercise(user, exercise("run", 250.0)).await.unwrap();
        store.insert_exercise(user, exercise("lift", 180.0)).await.unwrap();
        let old = store.insert_exercise(user, exercise("swim", 400.0)).await.unwrap();
        store.backdate_exercise(old.id, OffsetDateTime::now_utc() - Duration::days(2));

        let totals = store.exercise_day_totals(user, today).await.unwrap();
        assert_eq!(totals.calories_burned, 430.0);
        assert_eq!(store.exercise_day_totals(user, today).await.unwrap(), totals);
    }

    #[tokio::test]
    async fn listing_filters_by_day_range() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let today = OffsetDateTime::now_utc().date();
        let yesterday = today.previous_day().unwrap();

        store.insert_food(user, food("today's lunch", 500.0)).await.unwrap();
        let old = store.insert_food(user, food("yesterday's dinner", 700.0)).await.unwrap();
        store.backdate_food(old.id, OffsetDateTime::now_utc() - Duration::days(1));

        let just_today = DayRange {
            from: Some(today),
            to: Some(today),
        };
        let entries = store.list_food(user, just_today, 20, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "today's lunch");

        let just_yesterday = DayRange {
            from: Some(yesterday),
            to: Some(yesterday),
        };
        let entries = store.list_food(user, just_yesterday, 20, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, old.id);

        let both = DayRange {
            from: Some(yesterday),
            to: Some(today),
        };
        assert_eq!(store.list_food(user, both, 20, 0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listing_orders_newest_first_and_paginates() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        let mut ids = Vec::new();
        for i in 0..3 {
            let entry = store
                .insert_food(user, food(&format!("meal {i}"), 100.0))
                .await
                .unwrap();
            ids.push(entry.id);
        }

        let all = store.list_food(user, DayRange::default(), 20, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let first_page = store.list_food(user, DayRange::default(), 2, 0).await.unwrap();
        let second_page = store.list_food(user, DayRange::default(), 2, 2).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(second_page.len(), 1);
        let mut seen: Vec<Uuid> = first_page
            .iter()
            .chain(second_page.iter())
            .map(|e| e.id)
            .collect();
        seen.sort();
        ids.sort();
        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let entry = store.insert_food(user, food("toast", 120.0)).await.unwrap();

        store.delete_food(user, entry.id).await.unwrap();
        assert!(matches!(
            store.delete_food(user, entry.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn profile_upsert_keeps_created_at_and_replaces_fields() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        assert!(store.get_profile(user).await.unwrap().is_none());

        let first = store.upsert_profile(user, profile_update(80.0)).await.unwrap();
        assert_eq!(first.weight_kg, Some(80.0));
        assert_eq!(first.daily_calorie_goal, 2298);

        let second = store.upsert_profile(user, profile_update(82.5)).await.unwrap();
        assert_eq!(second.weight_kg, Some(82.5));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        let fetched = store.get_profile(user).await.unwrap().unwrap();
        assert_eq!(fetched.weight_kg, Some(82.5));
    }
}
