//! Shared types for the uklon annotation pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sink::SinkError;

/// A 2D point in plan (world) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

impl Point2 {
    /// Create a new plan point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates match `other` after rounding to
    /// 3 decimal places, the tolerance used for plan-coordinate
    /// coincidence tests.
    #[must_use]
    pub fn coincides(self, other: Self) -> bool {
        round_dp(self.x, 3) == round_dp(other.x, 3) && round_dp(self.y, 3) == round_dp(other.y, 3)
    }
}

/// A 3D point: plan position plus invert/crown elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
    /// Elevation.
    pub z: f64,
}

impl Point3 {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The plan (2D) projection of this point.
    #[must_use]
    pub const fn plan(self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Which kind of network a pipe belongs to.
///
/// Gravity pipes connect to manhole structures and carry a meaningful
/// flow-direction slope; pressure pipes connect to fittings/parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Pressurized network (water supply).
    Pressure,
    /// Gravity-flow network (sewer, storm drain).
    Gravity,
}

/// Normalized, immutable view of one pipe segment.
///
/// Records are owned by the caller and never mutated by the pipeline;
/// orientation for chain traversal is expressed through
/// [`ChainLink`](crate::chain::ChainLink) wrappers instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeRecord {
    /// Pipe name, unique within its network.
    pub name: String,
    /// Name of the owning network.
    pub network: String,
    /// Pressure or gravity.
    pub network_kind: NetworkKind,
    /// Nominal size/type descriptor displayed in the type row.
    pub size_label: String,
    /// Start endpoint as drawn (plan position + invert elevation).
    pub start: Point3,
    /// End endpoint as drawn.
    pub end: Point3,
    /// Structure (manhole or fitting) name at the start endpoint.
    pub start_structure: String,
    /// Structure (manhole or fitting) name at the end endpoint.
    pub end_structure: String,
    /// Plan length of the segment, as reported by the data provider.
    ///
    /// Kept as a field rather than derived from the endpoints: providers
    /// measure center-to-center while endpoints sit at structure walls.
    pub length_2d: f64,
    /// Signed slope (rise/run); the sign encodes flow/layout direction.
    pub slope: f64,
    /// Diameter or width used for invert/crown continuity tests:
    /// outer diameter for pressure pipes, inner diameter for gravity.
    pub diameter: f64,
}

/// One profile view to annotate: a framed longitudinal section of the
/// alignment showing a subset of the scene's networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    /// Display name; category classification matches against this.
    pub name: String,
    /// Plan-space insertion point of the view frame; annotation rows
    /// are placed at fixed offsets below it.
    pub insertion: Point2,
    /// Names of the networks displayed in this view.
    pub networks: BTreeSet<String>,
    /// Pipe names excluded from annotation (style-overridden in the
    /// source drawing).
    #[serde(default)]
    pub excluded_pipes: BTreeSet<String>,
}

/// Result of projecting a plan point onto an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationOffset {
    /// Distance along the alignment from its defined start.
    pub station: f64,
    /// Perpendicular distance from the alignment, positive to the
    /// right of the direction of travel.
    pub offset: f64,
}

/// An RGB color override for a drawing primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a color from channel values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Text anchor rule: which corner/edge of the text box sits at the
/// instruction's insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Top-left corner at the insertion point.
    TopLeft,
    /// Top-right corner at the insertion point.
    TopRight,
    /// Bottom-left corner at the insertion point.
    BottomLeft,
    /// Bottom-right corner at the insertion point.
    BottomRight,
    /// Text box centered on the insertion point.
    MiddleCenter,
}

/// One primitive annotation instruction in row-local coordinates
/// (x = station plus the category's station offset, y up from the
/// row base).
///
/// Instructions are ephemeral: planned per profile view, grouped into
/// [`BlockPlan`]s, handed to the drawing sink, and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// A straight line segment (divider, diagonal, or centerline).
    Line {
        /// Segment start.
        from: Point2,
        /// Segment end.
        to: Point2,
        /// Color override; `None` inherits the block default.
        color: Option<Rgb>,
        /// Line weight in millimeters; `None` inherits the default.
        weight_mm: Option<f64>,
    },
    /// A text label.
    Text {
        /// Rendered text value.
        value: String,
        /// Insertion point interpreted through `anchor`.
        at: Point2,
        /// Anchor rule for the text box.
        anchor: Anchor,
        /// Wrap width; `None` leaves the text unwrapped.
        width: Option<f64>,
    },
    /// A circle, optionally solid-filled.
    Circle {
        /// Center point.
        center: Point2,
        /// Radius.
        radius: f64,
        /// Whether the interior is solid-filled.
        filled: bool,
    },
    /// A closed polyline (marker arrows), optionally solid-filled.
    ClosedPolyline {
        /// Vertices in order; the shape closes back to the first.
        vertices: Vec<Point2>,
        /// Whether the interior is solid-filled.
        filled: bool,
    },
    /// A circular arc swept counterclockwise from `start_angle` to
    /// `end_angle` (radians, measured from the positive x axis).
    Arc {
        /// Arc center.
        center: Point2,
        /// Arc radius.
        radius: f64,
        /// Sweep start angle in radians.
        start_angle: f64,
        /// Sweep end angle in radians.
        end_angle: f64,
    },
}

impl Instruction {
    /// A plain line with no color or weight override.
    #[must_use]
    pub const fn line(from: Point2, to: Point2) -> Self {
        Self::Line {
            from,
            to,
            color: None,
            weight_mm: None,
        }
    }

    /// A text label without a wrap width.
    #[must_use]
    pub const fn text(value: String, at: Point2, anchor: Anchor) -> Self {
        Self::Text {
            value,
            at,
            anchor,
            width: None,
        }
    }
}

/// A named group of annotation instructions, materialized by the sink
/// as one reusable block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPlan {
    /// Block name; stale blocks with the same name are erased first.
    pub name: String,
    /// Primitives in block-local coordinates.
    pub instructions: Vec<Instruction>,
}

/// A block plan together with the plan-space point where the sink
/// must insert it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedBlock {
    /// The block content.
    pub plan: BlockPlan,
    /// Insertion point in plan coordinates.
    pub origin: Point2,
}

/// Errors produced while annotating profile views.
///
/// All variants except [`SelectionEmpty`](Self::SelectionEmpty) are
/// scoped to a single profile view; the batch driver records them and
/// continues with the next view.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// No eligible profile views were selected.
    #[error("no profile views selected")]
    SelectionEmpty,

    /// The profile view's name matches no configured category rule.
    #[error("profile view {view:?} matches no known category pattern")]
    UnrecognizedProfileCategory {
        /// Name of the offending profile view.
        view: String,
    },

    /// No pipe record touches the alignment start point; the view is
    /// skipped rather than failed.
    #[error("no pipe touches the alignment start point")]
    NoSeedPipe,

    /// Chain construction found no pending pipe adjacent to the chain
    /// tail (or detected a malformed/cyclic adjacency).
    #[error("no pending pipe connects to structure {structure:?} ({remaining} unchained)")]
    DisconnectedNetwork {
        /// Structure at the chain tail when the walk stalled.
        structure: String,
        /// Number of records still waiting to be chained.
        remaining: usize,
    },

    /// More than one pending pipe is adjacent to the chain tail; the
    /// chain is ambiguous and never guessed.
    #[error("structure {structure:?} connects to {} pending pipes: {candidates:?}", candidates.len())]
    BranchingNetwork {
        /// Structure with multiple pending connections.
        structure: String,
        /// Names of the competing candidate pipes.
        candidates: Vec<String>,
    },

    /// The drawing sink reported a failure; the view's batch is rolled
    /// back.
    #[error("drawing sink failure: {0}")]
    Sink(#[from] SinkError),
}

/// Round `value` to `decimals` decimal places, half away from zero.
///
/// All pipeline comparisons round both sides before comparing instead
/// of testing raw floating-point equality.
#[must_use]
pub fn round_dp(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    (value * factor).round() / factor
}
