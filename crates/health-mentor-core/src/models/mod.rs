// ABOUTME: Core data models shared by the profile loader and prompt composer
// ABOUTME: Re-exports UserProfile, DailyTargets, MedicalConditions and parse_bool
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Profiles arrive from the document store as loosely typed JSON objects whose
//! fields may be numbers, numeric strings, booleans encoded several ways, or
//! missing altogether. [`UserProfile::from_record`] is the single place where
//! that input becomes a fully populated, typed structure.

mod profile;

pub use profile::{parse_bool, DailyTargets, MedicalConditions, Record, UserProfile};
