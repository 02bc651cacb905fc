//! Row planners for the slope/length row and the pipe-type row.
//!
//! Planning happens in row-local coordinates: x is the station plus
//! the category's station offset, y grows upward from the row base.
//! The sink later places each finished block below the profile view,
//! so nothing here knows about the view insertion point.
//!
//! Both rows share the divider convention: one divider at the row
//! start, one at every closing run boundary. The slope row draws a
//! diagonal across each run whose direction encodes the slope sign,
//! with the per-mille slope value and the summed pipe length as
//! labels. The type row centers the size label inside the run
//! interval, wrap width equal to the interval.

use crate::runs::{SlopeRun, TypeRun};
use crate::types::{Anchor, BlockPlan, Instruction, Point2, round_dp};

/// Block name prefix for the slope/length row.
pub const SLOPE_BLOCK_PREFIX: &str = "К2_трубы_обозначение уклона и длины-";
/// Block name prefix for the pipe-type row.
pub const TYPE_BLOCK_PREFIX: &str = "К2_трубы_обозначение трубы и тип изоляции-";
/// Block name prefix for the turn-marker row.
pub const TURN_BLOCK_PREFIX: &str = "К2_угол_поворота_трассы-";

/// Slope row band height.
pub const SLOPE_ROW_HEIGHT: f64 = 5.0;
/// Type row band height.
pub const TYPE_ROW_HEIGHT: f64 = 7.5;

/// Slope row block name for one alignment.
#[must_use]
pub fn slope_block_name(alignment_name: &str) -> String {
    format!("{SLOPE_BLOCK_PREFIX}{alignment_name}")
}

/// Type row block name for one alignment.
#[must_use]
pub fn type_block_name(alignment_name: &str) -> String {
    format!("{TYPE_BLOCK_PREFIX}{alignment_name}")
}

/// Turn row block name for one alignment.
#[must_use]
pub fn turn_block_name(alignment_name: &str) -> String {
    format!("{TURN_BLOCK_PREFIX}{alignment_name}")
}

/// All annotation block names for one alignment, erased together in
/// the pre-pass regardless of category.
#[must_use]
pub fn annotation_block_names(alignment_name: &str) -> [String; 3] {
    [
        slope_block_name(alignment_name),
        type_block_name(alignment_name),
        turn_block_name(alignment_name),
    ]
}

/// Length label: rounded to 1 decimal, trailing zeros trimmed.
fn format_length(length: f64) -> String {
    format!("{}", round_dp(length, 1))
}

/// Slope label: per-mille magnitude with no decimals.
fn format_slope_per_mille(slope: f64) -> String {
    format!("{}", (slope.abs() * 1000.0).round())
}

fn divider(x: f64, height: f64) -> Instruction {
    Instruction::line(Point2::new(x, 0.0), Point2::new(x, height))
}

/// Plan the slope/length row for one alignment.
///
/// Positive slope runs fall left-to-right (diagonal from the upper
/// left), zero or negative runs rise, and the label corners swap
/// accordingly.
#[must_use]
pub fn plan_slope_row(
    runs: &[SlopeRun],
    alignment_name: &str,
    station_offset: f64,
) -> BlockPlan {
    let mut instructions = vec![divider(station_offset, SLOPE_ROW_HEIGHT)];

    for run in runs {
        let x_start = run.start_station + station_offset;
        let x_end = run.end_station + station_offset;
        if run.slope > 0.0 {
            instructions.push(Instruction::line(
                Point2::new(x_start, SLOPE_ROW_HEIGHT),
                Point2::new(x_end, 0.0),
            ));
            instructions.push(Instruction::text(
                format_slope_per_mille(run.slope),
                Point2::new(x_end - 1.0, 4.0),
                Anchor::TopRight,
            ));
            instructions.push(Instruction::text(
                format_length(run.length),
                Point2::new(x_start + 1.0, 1.0),
                Anchor::BottomLeft,
            ));
        } else {
            instructions.push(Instruction::line(
                Point2::new(x_start, 0.0),
                Point2::new(x_end, SLOPE_ROW_HEIGHT),
            ));
            instructions.push(Instruction::text(
                format_length(run.length),
                Point2::new(x_end - 1.0, 1.0),
                Anchor::BottomRight,
            ));
            instructions.push(Instruction::text(
                format_slope_per_mille(run.slope),
                Point2::new(x_start + 1.0, 4.0),
                Anchor::TopLeft,
            ));
        }
        instructions.push(divider(x_end, SLOPE_ROW_HEIGHT));
    }

    BlockPlan {
        name: slope_block_name(alignment_name),
        instructions,
    }
}

/// Plan the pipe-type row for one alignment.
#[must_use]
pub fn plan_type_row(runs: &[TypeRun], alignment_name: &str, station_offset: f64) -> BlockPlan {
    let mut instructions = vec![divider(station_offset, TYPE_ROW_HEIGHT)];

    for run in runs {
        let x_start = run.start_station + station_offset;
        let x_end = run.end_station + station_offset;
        let interval = x_end - x_start;
        instructions.push(Instruction::Text {
            value: run.size_label.clone(),
            at: Point2::new(x_start + interval / 2.0, TYPE_ROW_HEIGHT / 2.0),
            anchor: Anchor::MiddleCenter,
            width: Some(interval),
        });
        instructions.push(divider(x_end, TYPE_ROW_HEIGHT));
    }

    BlockPlan {
        name: type_block_name(alignment_name),
        instructions,
    }
}
