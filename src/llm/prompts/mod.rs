// ABOUTME: Fixed prompt text for model interactions loaded at compile time
// ABOUTME: Mentor guidance sections and the food image analysis instruction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # System Prompts
//!
//! Prompt copy that does not depend on user data lives in markdown files and is
//! embedded at compile time, so wording can be edited without touching code.

/// Role and expertise statements included in every mentor prompt
pub const MENTOR_ROLE: &str = include_str!("mentor_role.md");

/// Communication style, response format, and closing reminder
pub const MENTOR_STYLE: &str = include_str!("mentor_style.md");

/// Instruction sent with every food image; asks for a JSON-only reply
pub const NUTRITION_ANALYSIS_PROMPT: &str = include_str!("nutrition_analysis.md");
