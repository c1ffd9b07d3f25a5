// ABOUTME: Prompt composer rendering a normalized user profile into the mentor system prompt
// ABOUTME: Pure and deterministic; includes fallback text and condition safety directives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Prompt Composer
//!
//! Renders a [`UserProfile`] into the system prompt sent ahead of every turn.
//! The output is a single opaque text block with these sections, in order:
//!
//! 1. persona line
//! 2. `# USER PROFILE`
//! 3. `# MEDICAL CONDITIONS`
//! 4. `# ALLERGIES & MEDICATIONS`
//! 5. `# FITNESS GOALS`
//! 6. `# DAILY TARGETS`
//! 7. role and expertise statements
//! 8. `# CRITICAL SAFETY GUIDELINES`
//! 9. communication style, response format, closing reminder
//!
//! Composition performs no I/O and never fails; missing data renders as fixed
//! fallback text.

use std::fmt::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::llm::prompts::{MENTOR_ROLE, MENTOR_STYLE};
use health_mentor_core::constants::fallback_text;
use health_mentor_core::models::{MedicalConditions, UserProfile};

/// Persona line opening every prompt
const PERSONA: &str = "You are Alex, an expert health mentor and wellness coach with deep knowledge in nutrition, exercise science, and lifestyle medicine.";

/// Characters of the user id shown in the prompt
const USER_TAG_LEN: usize = 8;

/// Always-present opening safety rule
const ACCOUNT_FOR_CONDITIONS: &str =
    "ALWAYS account for their medical conditions in your recommendations";

/// Condition-specific directives, in rendering order
const CONDITION_DIRECTIVES: [(MedicalConditions, &str); 4] = [
    (
        MedicalConditions::HYPERTENSION,
        "If they have hypertension: recommend low-sodium foods, avoid intense exercises without clearance",
    ),
    (
        MedicalConditions::DIABETES,
        "If they have diabetes: focus on blood sugar management, emphasize complex carbs and fiber",
    ),
    (
        MedicalConditions::HEART_CONDITION,
        "If they have heart conditions: prioritize heart-healthy foods, recommend consulting doctor before intense exercise",
    ),
    (
        MedicalConditions::HIGH_CHOLESTEROL,
        "If they have high cholesterol: suggest foods that lower LDL, emphasize omega-3s",
    ),
];

/// Rules present regardless of the directive mode
const INVARIANT_RULES: [&str; 3] = [
    "NEVER diagnose conditions or suggest stopping prescribed medications",
    "For serious symptoms or concerns, ALWAYS recommend consulting their healthcare provider",
    "Be especially cautious with supplements if they're on medications",
];

/// Which condition-specific safety directives the prompt carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyDirectiveMode {
    /// Every condition directive, whatever the profile says
    #[default]
    All,
    /// Only directives for conditions flagged on the profile
    MatchingConditions,
}

impl SafetyDirectiveMode {
    /// Parse the `SAFETY_DIRECTIVES` setting (`all` or `matching`)
    ///
    /// # Errors
    ///
    /// Returns a configuration error for any other value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "matching" | "matching_conditions" => Ok(Self::MatchingConditions),
            other => Err(AppError::config(format!(
                "Invalid SAFETY_DIRECTIVES '{other}': expected 'all' or 'matching'"
            ))),
        }
    }

    fn includes(self, conditions: MedicalConditions, directive_flag: MedicalConditions) -> bool {
        match self {
            Self::All => true,
            Self::MatchingConditions => conditions.contains(directive_flag),
        }
    }
}

impl FromStr for SafetyDirectiveMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SafetyDirectiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::MatchingConditions => write!(f, "matching"),
        }
    }
}

/// Builds the mentor system prompt from a profile
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer {
    mode: SafetyDirectiveMode,
}

impl PromptComposer {
    /// Create a composer with the given directive mode
    #[must_use]
    pub const fn new(mode: SafetyDirectiveMode) -> Self {
        Self { mode }
    }

    /// Directive mode in use
    #[must_use]
    pub const fn mode(&self) -> SafetyDirectiveMode {
        self.mode
    }

    /// Render the system prompt for `profile`
    #[must_use]
    pub fn compose(&self, profile: &UserProfile) -> String {
        let mut prompt = String::with_capacity(4096);

        let _ = writeln!(prompt, "{PERSONA}\n");
        write_profile(&mut prompt, profile);
        write_conditions(&mut prompt, profile);
        write_allergies(&mut prompt, profile);
        write_goals(&mut prompt, profile);
        write_targets(&mut prompt, profile);
        let _ = writeln!(prompt, "{}", MENTOR_ROLE.trim_end());
        prompt.push('\n');
        self.write_safety(&mut prompt, profile.conditions);
        prompt.push_str(MENTOR_STYLE.trim_end());

        prompt
    }

    fn write_safety(&self, prompt: &mut String, conditions: MedicalConditions) {
        let _ = writeln!(prompt, "# CRITICAL SAFETY GUIDELINES");
        let _ = writeln!(prompt, "- {ACCOUNT_FOR_CONDITIONS}");
        for (flag, directive) in CONDITION_DIRECTIVES {
            if self.mode.includes(conditions, flag) {
                let _ = writeln!(prompt, "- {directive}");
            }
        }
        for rule in INVARIANT_RULES {
            let _ = writeln!(prompt, "- {rule}");
        }
        prompt.push('\n');
    }
}

fn user_tag(user_id: &str) -> String {
    user_id.chars().take(USER_TAG_LEN).collect()
}

fn or_fallback<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(fallback)
}

fn write_profile(prompt: &mut String, profile: &UserProfile) {
    let _ = writeln!(prompt, "# USER PROFILE");
    let _ = writeln!(prompt, "- Name: User #{}", user_tag(&profile.user_id));
    let _ = writeln!(prompt, "- Age: {} years old", profile.age);
    let _ = writeln!(prompt, "- Gender: {}", profile.gender);
    let _ = writeln!(prompt, "- Weight: {:.1} kg", profile.weight_kg);
    let _ = writeln!(prompt, "- Height: {:.1} cm", profile.height_cm);
    let _ = writeln!(prompt, "- BMI: {:.1}", profile.bmi());
    let _ = writeln!(prompt, "- Activity Level: {}\n", profile.activity_level);
}

fn write_conditions(prompt: &mut String, profile: &UserProfile) {
    let conditions = profile.active_conditions();
    let rendered = if conditions.is_empty() {
        fallback_text::NONE_REPORTED.to_owned()
    } else {
        conditions.join(", ")
    };
    let _ = writeln!(prompt, "# MEDICAL CONDITIONS\n{rendered}\n");
}

fn write_allergies(prompt: &mut String, profile: &UserProfile) {
    let _ = writeln!(prompt, "# ALLERGIES & MEDICATIONS");
    let _ = writeln!(
        prompt,
        "- Allergies: {}",
        or_fallback(profile.allergies.as_deref(), fallback_text::NONE_REPORTED)
    );
    let _ = writeln!(
        prompt,
        "- Current Medications: {}\n",
        or_fallback(profile.medications.as_deref(), fallback_text::NONE_REPORTED)
    );
}

fn write_goals(prompt: &mut String, profile: &UserProfile) {
    let target_weight = profile
        .target_weight_kg
        .filter(|kg| *kg > 0.0)
        .map_or_else(|| fallback_text::NOT_SET.to_owned(), |kg| format!("{kg:.1}"));

    let _ = writeln!(prompt, "# FITNESS GOALS");
    let _ = writeln!(
        prompt,
        "- Goal Type: {}",
        or_fallback(profile.goal_type.as_deref(), fallback_text::GENERAL_WELLNESS)
    );
    let _ = writeln!(
        prompt,
        "- Goal Intensity: {}",
        or_fallback(profile.goal_intensity.as_deref(), fallback_text::MODERATE)
    );
    let _ = writeln!(prompt, "- Target Weight: {target_weight} kg");
    let _ = writeln!(
        prompt,
        "- Fitness Goals: {}\n",
        or_fallback(profile.fitness_goals.as_deref(), fallback_text::NOT_SPECIFIED)
    );
}

fn write_targets(prompt: &mut String, profile: &UserProfile) {
    let targets = &profile.daily_targets;
    let _ = writeln!(prompt, "# DAILY TARGETS");
    let _ = writeln!(prompt, "- Calories: {} kcal", targets.calories);
    let _ = writeln!(prompt, "- Steps: {} steps", targets.steps);
    let _ = writeln!(prompt, "- Distance: {:.1} km", targets.distance_km);
    let _ = writeln!(prompt, "- Active Minutes: {} minutes", targets.active_minutes);
    let _ = writeln!(
        prompt,
        "- Macros: Protein {}g | Carbs {}g | Fats {}g\n",
        targets.protein_g, targets.carbs_g, targets.fats_g
    );
}
