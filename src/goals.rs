use serde::{Deserialize, Serialize};

/// Biological-sex category. Only `Male` selects the male branch of the
/// Mifflin-St Jeor formula; every other category uses the non-male branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

/// Activity level, ordered from least to most active.
///
/// `high` is accepted on the wire as a legacy alias of `active`; both map to
/// the same 1.725 multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    #[serde(alias = "high")]
    Active,
    VeryActive,
}

/// What the user is trying to do with their weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    LoseWeight,
    MaintainWeight,
    GainWeight,
    BuildMuscle,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Other => "other",
        }
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            "other" => Ok(Sex::Other),
            other => Err(format!("unknown sex category: {other}")),
        }
    }
}

impl ActivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl std::str::FromStr for ActivityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sedentary" => Ok(ActivityLevel::Sedentary),
            "light" => Ok(ActivityLevel::Light),
            "moderate" => Ok(ActivityLevel::Moderate),
            // "high" is the spelling an earlier activity table used.
            "active" | "high" => Ok(ActivityLevel::Active),
            "very_active" => Ok(ActivityLevel::VeryActive),
            other => Err(format!("unknown activity level: {other}")),
        }
    }
}

impl FitnessGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessGoal::LoseWeight => "lose_weight",
            FitnessGoal::MaintainWeight => "maintain_weight",
            FitnessGoal::GainWeight => "gain_weight",
            FitnessGoal::BuildMuscle => "build_muscle",
        }
    }
}

impl std::str::FromStr for FitnessGoal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lose_weight" => Ok(FitnessGoal::LoseWeight),
            "maintain_weight" => Ok(FitnessGoal::MaintainWeight),
            "gain_weight" => Ok(FitnessGoal::GainWeight),
            "build_muscle" => Ok(FitnessGoal::BuildMuscle),
            other => Err(format!("unknown fitness goal: {other}")),
        }
    }
}

/// Inputs for the goal calculation. A fresh account has an incomplete
/// profile, so every field is optional; absence is a normal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalInput {
    pub age: Option<i32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<FitnessGoal>,
}

/// Daily energy and macronutrient targets, all rounded to whole units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub tdee: i32,
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fat_g: i32,
}

/// Basal Metabolic Rate via Mifflin-St Jeor (1990).
///
/// male: `10·weight + 6.25·height − 5·age + 5`, otherwise `− 161`.
pub fn mifflin_st_jeor(weight_kg: f64, height_cm: f64, age: i32, sex: Sex) -> f64 {
    let offset = match sex {
        Sex::Male => 5.0,
        _ => -161.0,
    };
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age) + offset
}

/// Fixed activity-factor table (McArdle et al.).
pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::Active => 1.725,
        ActivityLevel::VeryActive => 1.9,
    }
}

/// Calorie adjustment applied on top of maintenance TDEE.
pub fn goal_adjustment(goal: FitnessGoal) -> f64 {
    match goal {
        FitnessGoal::LoseWeight => -500.0,
        FitnessGoal::GainWeight | FitnessGoal::BuildMuscle => 500.0,
        FitnessGoal::MaintainWeight => 0.0,
    }
}

/// Converts a profile into daily energy and macro targets.
///
/// Pure and infallible: if any required input is missing the result is the
/// zeroed `MacroTargets`, which is a defined fallback rather than an error.
///
/// Protein is 2 g/kg and fat 0.9 g/kg of body weight; carbs fill whatever
/// calories remain after both. All roundings are half away from zero
/// (`f64::round`), and the grams that feed back into the carb remainder are
/// the already-rounded integers.
pub fn calculate_targets(input: &GoalInput) -> MacroTargets {
    let (Some(age), Some(sex), Some(height_cm), Some(weight_kg), Some(level), Some(goal)) = (
        input.age,
        input.sex,
        input.height_cm,
        input.weight_kg,
        input.activity_level,
        input.goal,
    ) else {
        return MacroTargets::default();
    };

    let bmr = mifflin_st_jeor(weight_kg, height_cm, age, sex);
    let tdee = bmr * activity_multiplier(level) + goal_adjustment(goal);

    let protein_g = (2.0 * weight_kg).round() as i32;
    let fat_g = (0.9 * weight_kg).round() as i32;
    let remaining = tdee - f64::from(protein_g) * 4.0 - f64::from(fat_g) * 9.0;
    let carbs_g = (remaining / 4.0).round() as i32;

    MacroTargets {
        tdee: tdee.round() as i32,
        protein_g,
        carbs_g,
        fat_g,
    }
}
