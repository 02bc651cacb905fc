//! Profile category classification and per-category row placement.
//!
//! A profile view's name carries the network class it displays
//! (В1/В2 pressure water, К1 domestic gravity, К2 storm gravity).
//! Classification is rule-driven: an ordered list of substring rules,
//! first match wins, so hosts can extend or reorder the vocabulary
//! without touching the planners. A name matching no rule fails that
//! one profile view.
//!
//! The category fixes where the annotation rows sit below the profile
//! view's insertion point and how far station labels shift along the
//! row, values taken from the profile-view band table each category
//! uses.

use serde::{Deserialize, Serialize};

use crate::types::AnnotateError;

/// Network class displayed by a profile view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileCategory {
    /// Pressure water mains (В1, В2).
    PressureWater,
    /// Domestic gravity sewer (К1).
    GravityDomestic,
    /// Storm gravity sewer (К2).
    GravityStorm,
}

impl ProfileCategory {
    /// Row placement for this category.
    #[must_use]
    pub const fn row_schedule(self) -> RowSchedule {
        match self {
            Self::PressureWater => RowSchedule {
                slope_row_drop: 52.5,
                type_row_drop: 37.5,
                turn_row_drop: Some(70.0),
                station_offset: 0.0,
            },
            Self::GravityDomestic => RowSchedule {
                slope_row_drop: 47.5,
                type_row_drop: 30.0,
                turn_row_drop: None,
                station_offset: 5.0,
            },
            Self::GravityStorm => RowSchedule {
                slope_row_drop: 40.0,
                type_row_drop: 30.0,
                turn_row_drop: None,
                station_offset: 5.0,
            },
        }
    }
}

impl std::fmt::Display for ProfileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PressureWater => "pressure water",
            Self::GravityDomestic => "gravity domestic",
            Self::GravityStorm => "gravity storm",
        };
        f.write_str(label)
    }
}

/// Vertical placement of the annotation rows for one category.
///
/// Drops are positive distances below the profile view's insertion
/// point; gravity categories have no turn row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSchedule {
    /// Distance from the view insertion down to the slope row origin.
    pub slope_row_drop: f64,
    /// Distance from the view insertion down to the type row origin.
    pub type_row_drop: f64,
    /// Distance down to the turn row origin, when the category has one.
    pub turn_row_drop: Option<f64>,
    /// Shift applied to every station before it becomes a row x
    /// coordinate (gravity bands start 5 units into the band frame).
    pub station_offset: f64,
}

/// One classification rule: a substring of the view name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Substring looked up in the profile view name.
    pub pattern: String,
    /// Category assigned on match.
    pub category: ProfileCategory,
}

impl CategoryRule {
    /// Build a rule from a pattern and its category.
    #[must_use]
    pub fn new(pattern: impl Into<String>, category: ProfileCategory) -> Self {
        Self {
            pattern: pattern.into(),
            category,
        }
    }
}

/// Ordered classification rules; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            rules: vec![
                CategoryRule::new("В1", ProfileCategory::PressureWater),
                CategoryRule::new("В2", ProfileCategory::PressureWater),
                CategoryRule::new("К1", ProfileCategory::GravityDomestic),
                CategoryRule::new("К2", ProfileCategory::GravityStorm),
            ],
        }
    }
}

impl CategoryRules {
    /// Rules evaluated in the given order.
    #[must_use]
    pub const fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Classify a profile view by name.
    ///
    /// # Errors
    ///
    /// [`AnnotateError::UnrecognizedProfileCategory`] when no rule's
    /// pattern occurs in the name.
    pub fn classify(&self, view_name: &str) -> Result<ProfileCategory, AnnotateError> {
        self.rules
            .iter()
            .find(|rule| view_name.contains(&rule.pattern))
            .map(|rule| rule.category)
            .ok_or_else(|| AnnotateError::UnrecognizedProfileCategory {
                view: view_name.to_owned(),
            })
    }
}
