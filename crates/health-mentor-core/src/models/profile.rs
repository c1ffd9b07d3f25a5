// ABOUTME: Normalized user health profile built from loosely typed store records
// ABOUTME: Applies safe defaults, permissive boolean parsing, and BMI computation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::{fields, profile_defaults};

/// Raw document as stored: a JSON object with heterogeneous value types
pub type Record = Map<String, Value>;

bitflags! {
    /// Medical conditions a user can flag on their profile
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MedicalConditions: u8 {
        /// `has_hypertension`
        const HYPERTENSION = 1 << 0;
        /// `has_diabetes`
        const DIABETES = 1 << 1;
        /// `has_heart_condition`
        const HEART_CONDITION = 1 << 2;
        /// `has_asthma`
        const ASTHMA = 1 << 3;
        /// `has_high_cholesterol`
        const HIGH_CHOLESTEROL = 1 << 4;
        /// `has_thyroid_disorder`
        const THYROID_DISORDER = 1 << 5;
    }
}

impl MedicalConditions {
    /// Record field, display label and flag, in rendering order
    pub const CATALOG: [(&'static str, &'static str, Self); 6] = [
        ("has_hypertension", "hypertension", Self::HYPERTENSION),
        ("has_diabetes", "diabetes", Self::DIABETES),
        ("has_heart_condition", "heart condition", Self::HEART_CONDITION),
        ("has_asthma", "asthma", Self::ASTHMA),
        ("has_high_cholesterol", "high cholesterol", Self::HIGH_CHOLESTEROL),
        ("has_thyroid_disorder", "thyroid disorder", Self::THYROID_DISORDER),
    ];

    /// Read every condition flag from a raw record
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self::CATALOG
            .iter()
            .filter(|(field, _, _)| parse_bool(record.get(*field)))
            .fold(Self::empty(), |acc, (_, _, flag)| acc | *flag)
    }

    /// Display labels of the set flags, in catalog order
    #[must_use]
    pub fn labels(self) -> Vec<&'static str> {
        Self::CATALOG
            .iter()
            .filter(|(_, _, flag)| self.contains(*flag))
            .map(|(_, label, _)| *label)
            .collect()
    }
}

/// Daily numeric targets shown to the mentor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTargets {
    /// Calories (kcal)
    pub calories: u32,
    /// Steps
    pub steps: u32,
    /// Distance (km)
    pub distance_km: f64,
    /// Active minutes
    pub active_minutes: u32,
    /// Protein (g)
    pub protein_g: u32,
    /// Carbohydrates (g)
    pub carbs_g: u32,
    /// Fats (g)
    pub fats_g: u32,
}

impl Default for DailyTargets {
    fn default() -> Self {
        Self {
            calories: profile_defaults::DAILY_CALORIES,
            steps: profile_defaults::DAILY_STEPS,
            distance_km: profile_defaults::DAILY_DISTANCE_KM,
            active_minutes: profile_defaults::DAILY_ACTIVE_MINUTES,
            protein_g: profile_defaults::DAILY_PROTEIN_G,
            carbs_g: profile_defaults::DAILY_CARBS_G,
            fats_g: profile_defaults::DAILY_FATS_G,
        }
    }
}

/// A user's health profile with every field resolved to a usable value.
///
/// Optional free-text and goal fields stay `None` when absent; the prompt
/// composer owns the fallback wording for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier
    pub user_id: String,
    /// Age in years
    pub age: u32,
    /// Gender label
    pub gender: String,
    /// Weight in kilograms
    pub weight_kg: f64,
    /// Height in centimeters
    pub height_cm: f64,
    /// Activity level label
    pub activity_level: String,
    /// Flagged medical conditions
    pub conditions: MedicalConditions,
    /// Free-text conditions not covered by the flags
    pub other_conditions: Option<String>,
    /// Known allergies
    pub allergies: Option<String>,
    /// Current medications
    pub medications: Option<String>,
    /// Goal type (weight loss, muscle gain, ...)
    pub goal_type: Option<String>,
    /// Goal intensity
    pub goal_intensity: Option<String>,
    /// Target weight in kilograms
    pub target_weight_kg: Option<f64>,
    /// Free-text fitness goals
    pub fitness_goals: Option<String>,
    /// Daily targets
    pub daily_targets: DailyTargets,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::from_record(&Record::new())
    }
}

impl UserProfile {
    /// Normalize a merged user/profile record.
    ///
    /// Never fails: a missing, null, empty or zero value takes its default, and
    /// values of the wrong type are treated as missing.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        let user_id = record
            .get(fields::USER_ID)
            .and_then(text_value)
            .unwrap_or_else(|| profile_defaults::USER_ID.to_owned());

        Self {
            age: int_field(record, "age").unwrap_or(profile_defaults::AGE),
            gender: text_field(record, "gender")
                .unwrap_or_else(|| profile_defaults::GENDER.to_owned()),
            weight_kg: float_field(record, "weight_kg").unwrap_or(profile_defaults::WEIGHT_KG),
            height_cm: float_field(record, "height_cm").unwrap_or(profile_defaults::HEIGHT_CM),
            activity_level: text_field(record, "activity_level")
                .unwrap_or_else(|| profile_defaults::ACTIVITY_LEVEL.to_owned()),
            conditions: MedicalConditions::from_record(record),
            other_conditions: text_field(record, "other_conditions"),
            allergies: text_field(record, "allergies"),
            medications: text_field(record, "medications"),
            goal_type: text_field(record, "goal_type"),
            goal_intensity: text_field(record, "goal_intensity"),
            target_weight_kg: float_field(record, "target_weight_kg"),
            fitness_goals: text_field(record, "fitness_goals"),
            daily_targets: DailyTargets {
                calories: int_field(record, "daily_calorie_goal")
                    .unwrap_or(profile_defaults::DAILY_CALORIES),
                steps: int_field(record, "daily_step_goal")
                    .unwrap_or(profile_defaults::DAILY_STEPS),
                distance_km: float_field(record, "daily_distance_goal")
                    .unwrap_or(profile_defaults::DAILY_DISTANCE_KM),
                active_minutes: int_field(record, "daily_active_minutes_goal")
                    .unwrap_or(profile_defaults::DAILY_ACTIVE_MINUTES),
                protein_g: int_field(record, "daily_protein_goal")
                    .unwrap_or(profile_defaults::DAILY_PROTEIN_G),
                carbs_g: int_field(record, "daily_carbs_goal")
                    .unwrap_or(profile_defaults::DAILY_CARBS_G),
                fats_g: int_field(record, "daily_fats_goal")
                    .unwrap_or(profile_defaults::DAILY_FATS_G),
            },
            user_id,
        }
    }

    /// Body mass index, or exactly `0.0` when weight or height is not positive
    #[must_use]
    pub fn bmi(&self) -> f64 {
        if self.weight_kg > 0.0 && self.height_cm > 0.0 {
            let height_m = self.height_cm / 100.0;
            self.weight_kg / (height_m * height_m)
        } else {
            0.0
        }
    }

    /// Flag labels followed by `other_conditions`, in rendering order
    #[must_use]
    pub fn active_conditions(&self) -> Vec<String> {
        let mut conditions: Vec<String> = self
            .conditions
            .labels()
            .into_iter()
            .map(str::to_owned)
            .collect();
        if let Some(other) = &self.other_conditions {
            conditions.push(other.clone());
        }
        conditions
    }
}

/// Permissive truthiness shared by every boolean profile field.
///
/// `true`, the integer `1`, and the case-insensitive strings `"true"`, `"1"`
/// and `"yes"` are true. Everything else, including `null`, other integers and
/// floats, is false.
#[must_use]
pub fn parse_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        Some(Value::String(text)) => {
            let lowered = text.to_lowercase();
            matches!(lowered.as_str(), "true" | "1" | "yes")
        }
        _ => false,
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_field(record: &Record, key: &str) -> Option<String> {
    record.get(key).and_then(text_value)
}

fn number_value(key: &str, value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    if parsed.is_none() && !value.is_null() {
        debug!(field = key, "ignoring non-numeric profile value");
    }
    parsed.filter(|number| number.is_finite() && *number != 0.0)
}

fn float_field(record: &Record, key: &str) -> Option<f64> {
    record
        .get(key)
        .and_then(|value| number_value(key, value))
        .map(|number| number.max(0.0))
}

fn int_field(record: &Record, key: &str) -> Option<u32> {
    float_field(record, key)
        .map(|number| number.round().min(f64::from(u32::MAX)) as u32)
        .filter(|number| *number != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_parse_bool_truth_table() {
        for truthy in [json!(true), json!("true"), json!("1"), json!("yes"), json!(1)] {
            assert!(parse_bool(Some(&truthy)), "{truthy} should be true");
        }
        for falsy in [json!(false), json!("false"), json!("0"), Value::Null, json!(2)] {
            assert!(!parse_bool(Some(&falsy)), "{falsy} should be false");
        }
        assert!(!parse_bool(None));
    }

    #[test]
    fn test_parse_bool_is_case_insensitive() {
        assert!(parse_bool(Some(&json!("TRUE"))));
        assert!(parse_bool(Some(&json!("Yes"))));
        assert!(!parse_bool(Some(&json!("on"))));
        assert!(!parse_bool(Some(&json!(1.5))));
    }

    #[test]
    fn test_empty_record_gets_defaults() {
        let profile = UserProfile::from_record(&Record::new());

        assert_eq!(profile.user_id, "Unknown");
        assert_eq!(profile.age, 0);
        assert_eq!(profile.gender, "Not specified");
        assert_eq!(profile.activity_level, "Moderate");
        assert!(profile.conditions.is_empty());
        assert!(profile.allergies.is_none());
        assert!(profile.target_weight_kg.is_none());
        assert_eq!(profile.daily_targets, DailyTargets::default());
    }

    #[test]
    fn test_zero_and_empty_values_fall_back() {
        let profile = UserProfile::from_record(&record(json!({
            "gender": "",
            "daily_calorie_goal": 0,
            "daily_distance_goal": null,
            "target_weight_kg": 0,
            "allergies": ""
        })));

        assert_eq!(profile.gender, "Not specified");
        assert_eq!(profile.daily_targets.calories, 2000);
        assert!((profile.daily_targets.distance_km - 5.0).abs() < f64::EPSILON);
        assert!(profile.target_weight_kg.is_none());
        assert!(profile.allergies.is_none());
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let profile = UserProfile::from_record(&record(json!({
            "age": "34",
            "weight_kg": "70.5",
            "daily_step_goal": "12000",
            "height_cm": "tall"
        })));

        assert_eq!(profile.age, 34);
        assert!((profile.weight_kg - 70.5).abs() < f64::EPSILON);
        assert_eq!(profile.daily_targets.steps, 12_000);
        assert!(profile.height_cm.abs() < f64::EPSILON);
    }

    #[test]
    fn test_bmi() {
        let mut profile = UserProfile::from_record(&record(json!({
            "weight_kg": 80.0,
            "height_cm": 200.0
        })));
        assert!((profile.bmi() - 20.0).abs() < 1e-9);

        profile.height_cm = 0.0;
        assert_eq!(profile.bmi().to_bits(), 0.0_f64.to_bits());

        profile.height_cm = 180.0;
        profile.weight_kg = 0.0;
        assert_eq!(profile.bmi().to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn test_active_conditions_order() {
        let profile = UserProfile::from_record(&record(json!({
            "has_thyroid_disorder": "yes",
            "has_hypertension": 1,
            "has_asthma": "false",
            "other_conditions": "migraines"
        })));

        assert_eq!(
            profile.active_conditions(),
            vec!["hypertension", "thyroid disorder", "migraines"]
        );
    }
}
