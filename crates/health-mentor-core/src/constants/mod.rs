// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Profile defaults, prompt fallback text, and document collection names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped by domain so the profile normalizer, the prompt
//! composer and the document store agree on the same values.

/// Defaults applied when a profile field is missing, null, empty or zero
pub mod profile_defaults {
    /// Identifier used when the record carries no `user_id`
    pub const USER_ID: &str = "Unknown";
    /// Age in years
    pub const AGE: u32 = 0;
    /// Gender label
    pub const GENDER: &str = "Not specified";
    /// Body weight in kilograms
    pub const WEIGHT_KG: f64 = 0.0;
    /// Height in centimeters
    pub const HEIGHT_CM: f64 = 0.0;
    /// Activity level label
    pub const ACTIVITY_LEVEL: &str = "Moderate";
    /// Daily calorie target (kcal)
    pub const DAILY_CALORIES: u32 = 2000;
    /// Daily step target
    pub const DAILY_STEPS: u32 = 10_000;
    /// Daily distance target (km)
    pub const DAILY_DISTANCE_KM: f64 = 5.0;
    /// Daily active minutes target
    pub const DAILY_ACTIVE_MINUTES: u32 = 30;
    /// Daily protein target (g)
    pub const DAILY_PROTEIN_G: u32 = 150;
    /// Daily carbohydrate target (g)
    pub const DAILY_CARBS_G: u32 = 250;
    /// Daily fat target (g)
    pub const DAILY_FATS_G: u32 = 70;
}

/// Text rendered in the system prompt when an optional field is absent
pub mod fallback_text {
    /// Medical conditions, allergies and medications
    pub const NONE_REPORTED: &str = "none reported";
    /// Goal type
    pub const GENERAL_WELLNESS: &str = "general wellness";
    /// Goal intensity
    pub const MODERATE: &str = "moderate";
    /// Target weight
    pub const NOT_SET: &str = "not set";
    /// Free-text fitness goals
    pub const NOT_SPECIFIED: &str = "not specified";
}

/// Document store layout
pub mod collections {
    /// Base user records, keyed by user id
    pub const USERS: &str = "users";
    /// Key of the profile document inside `users/{id}/profile`
    pub const PROFILE_DOCUMENT: &str = "data";

    /// Collection path holding a user's profile sub-record
    #[must_use]
    pub fn profile_collection(user_id: &str) -> String {
        format!("{USERS}/{user_id}/profile")
    }
}

/// Record field names shared by the loader and the normalizer
pub mod fields {
    /// User identifier
    pub const USER_ID: &str = "user_id";
}
