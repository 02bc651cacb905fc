//! Batch outcome reporting: per-view results, counts, and timings.
//!
//! Outcomes are permanent instrumentation, not logging: each view's
//! result is a structured, serializable value the host can render,
//! store, or ship as JSON.
//!
//! Durations are measured through the [`Clock`] trait so hosts can
//! inject a real clock while tests use a fixed one, and are serialized
//! as fractional seconds (`f64`) for JSON compatibility, since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::ProfileCategory;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Time source for measuring per-view durations.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Wall-clock time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// How one profile view ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    /// All rows were planned and committed.
    Annotated {
        /// Pipes in the reconstructed chain.
        pipes: usize,
        /// Slope runs drawn.
        slope_runs: usize,
        /// Type runs drawn.
        type_runs: usize,
        /// Turn markers drawn (always 0 for gravity views).
        turn_markers: usize,
        /// Wall-clock time spent on the view (seconds).
        #[serde(with = "duration_serde")]
        duration: Duration,
    },
    /// The view was left untouched for a diagnosable reason.
    Skipped {
        /// Why the view was skipped.
        reason: String,
    },
    /// Annotation failed and was rolled back.
    Failed {
        /// Why the view failed.
        reason: String,
    },
}

impl ViewStatus {
    fn describe(&self) -> String {
        match self {
            Self::Annotated {
                pipes,
                slope_runs,
                type_runs,
                turn_markers,
                duration,
            } => {
                format!(
                    "annotated: {pipes} pipes, {slope_runs} slope runs, {type_runs} type runs, {turn_markers} turn markers in {:.3}ms",
                    duration.as_secs_f64() * 1000.0,
                )
            }
            Self::Skipped { reason } => format!("skipped: {reason}"),
            Self::Failed { reason } => format!("failed: {reason}"),
        }
    }
}

/// Outcome of one profile view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewOutcome {
    /// Profile view name.
    pub view: String,
    /// Classified category, when classification got that far.
    pub category: Option<ProfileCategory>,
    /// What happened.
    pub status: ViewStatus,
}

/// Outcomes for a whole batch, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-view outcomes.
    pub outcomes: Vec<ViewOutcome>,
}

impl BatchReport {
    /// An empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }

    /// Record one view's outcome.
    pub fn push(&mut self, outcome: ViewOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of annotated views.
    #[must_use]
    pub fn annotated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ViewStatus::Annotated { .. }))
            .count()
    }

    /// Number of skipped views.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ViewStatus::Skipped { .. }))
            .count()
    }

    /// Number of failed views.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ViewStatus::Failed { .. }))
            .count()
    }

    /// Format the report as a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Annotation Batch Report\n{}", "=".repeat(60)));
        lines.push(format!("{:<28} {:<18} Status", "View", "Category"));
        lines.push("-".repeat(60));

        for outcome in &self.outcomes {
            let category = outcome
                .category
                .map_or_else(|| "-".to_owned(), |c| c.to_string());
            lines.push(format!(
                "{:<28} {:<18} {}",
                outcome.view,
                category,
                outcome.status.describe(),
            ));
        }

        lines.push("-".repeat(60));
        lines.push(format!(
            "{} views: {} annotated, {} skipped, {} failed",
            self.outcomes.len(),
            self.annotated(),
            self.skipped(),
            self.failed(),
        ));

        lines.join("\n")
    }
}
