//! Turn-marker row planner.
//!
//! Pressure profile views carry an extra band marking every horizontal
//! turn of the alignment: a blue centerline across the whole band and,
//! per turn, a divider, a solid dot on the centerline, a numbered
//! `УП` marker with the turn angle, and an arrow-plus-arc glyph whose
//! direction encodes the turn side (up = left, down = right).
//!
//! The planner consumes the alignment's prepared `(station, angle)`
//! list; it never sees raw geometry. Stations are used as-is (the
//! pressure schedule has no station offset).

use serde::{Deserialize, Serialize};

use crate::layout::turn_block_name;
use crate::types::{Anchor, BlockPlan, Instruction, Point2, Rgb};

/// Turn row band height.
pub const TURN_ROW_HEIGHT: f64 = 5.0;

/// Centerline color.
const CENTERLINE_COLOR: Rgb = Rgb {
    r: 0,
    g: 0,
    b: 255,
};
/// Centerline weight in millimeters.
const CENTERLINE_WEIGHT_MM: f64 = 0.30;

/// Quarter-circle sweep for a left turn: 0 to π/2.
const LEFT_ARC: (f64, f64) = (0.0, 1.5708);
/// Quarter-circle sweep for a right turn: 3π/2 to 0.
const RIGHT_ARC: (f64, f64) = (4.71239, 0.0);

/// One horizontal turn of the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentTurn {
    /// Station of the turn vertex.
    pub station: f64,
    /// Signed turn angle in degrees, rounded to 1 decimal; positive
    /// turns left.
    pub angle_degrees: f64,
}

/// Plan the turn-marker row for one alignment.
///
/// The centerline is always drawn; with no turns the block is just
/// that line.
#[must_use]
pub fn plan_turn_row(
    turns: &[AlignmentTurn],
    alignment_name: &str,
    ending_station: f64,
) -> BlockPlan {
    let mid = TURN_ROW_HEIGHT / 2.0;
    let mut instructions = vec![Instruction::Line {
        from: Point2::new(0.0, mid),
        to: Point2::new(ending_station, mid),
        color: Some(CENTERLINE_COLOR),
        weight_mm: Some(CENTERLINE_WEIGHT_MM),
    }];

    for (index, turn) in turns.iter().enumerate() {
        let s = turn.station;
        instructions.push(Instruction::line(
            Point2::new(s, 0.0),
            Point2::new(s, TURN_ROW_HEIGHT),
        ));
        instructions.push(Instruction::Circle {
            center: Point2::new(s, mid),
            radius: 0.2,
            filled: true,
        });
        instructions.push(Instruction::text(
            format!("УП{}", index + 1),
            Point2::new(s - 0.5, 3.0),
            Anchor::BottomRight,
        ));
        instructions.push(Instruction::text(
            format!("{}°", turn.angle_degrees.abs()),
            Point2::new(s - 0.5, 2.0),
            Anchor::TopRight,
        ));

        let (vertices, (arc_start, arc_end)) = if turn.angle_degrees > 0.0 {
            (
                vec![
                    Point2::new(s - 0.3, 3.5),
                    Point2::new(s + 0.3, 3.5),
                    Point2::new(s, 4.7),
                ],
                LEFT_ARC,
            )
        } else {
            (
                vec![
                    Point2::new(s - 0.3, 1.5),
                    Point2::new(s + 0.3, 1.5),
                    Point2::new(s, 0.3),
                ],
                RIGHT_ARC,
            )
        };
        instructions.push(Instruction::ClosedPolyline {
            vertices,
            filled: true,
        });
        instructions.push(Instruction::Arc {
            center: Point2::new(s, mid),
            radius: 0.6,
            start_angle: arc_start,
            end_angle: arc_end,
        });
    }

    BlockPlan {
        name: turn_block_name(alignment_name),
        instructions,
    }
}
