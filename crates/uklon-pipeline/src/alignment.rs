//! Alignment geometry: station projection and turn extraction.
//!
//! An alignment is the piecewise-linear route a profile view follows.
//! Station space is distance along it, so every planar annotation
//! point must be projected onto the alignment before it can become a
//! row x coordinate.
//!
//! Segments are indexed in an R\*-tree for nearest-segment queries;
//! the projection clamps the perpendicular foot onto the nearest
//! segment and reports the cumulative station plus a signed offset
//! (positive to the right of the direction of travel).

use geo::line_measures::Distance;
use geo::{Closest, ClosestPoint, Euclidean, Line};
use rstar::RTree;
use rstar::primitives::GeomWithData;
use thiserror::Error;

use crate::turns::AlignmentTurn;
use crate::types::{Point2, StationOffset, round_dp};

/// Projection of planar points into station space along one alignment.
pub trait StationProjector {
    /// The alignment's defined start point.
    fn start_point(&self) -> Point2;

    /// Station of the alignment's end (its total length).
    fn ending_station(&self) -> f64;

    /// Project a planar point onto the alignment.
    fn project(&self, point: Point2) -> StationOffset;
}

/// Rejected alignment geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AlignmentError {
    /// Fewer than two vertices cannot form a route.
    #[error("an alignment needs at least 2 vertices, found {found}")]
    TooFewVertices {
        /// Vertices supplied.
        found: usize,
    },
    /// All vertices coincide.
    #[error("alignment has zero length")]
    ZeroLength,
}

/// A `geo::Line` segment tagged with its starting vertex index.
type IndexedSegment = GeomWithData<Line<f64>, usize>;

const fn point_to_coord(p: Point2) -> geo::Coord<f64> {
    geo::Coord { x: p.x, y: p.y }
}

/// Closest point on a segment to a query point, clamped to the
/// segment.
fn closest_coord_on_line(line: &Line<f64>, query: &geo::Point<f64>) -> geo::Coord<f64> {
    match line.closest_point(query) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => p.into(),
        Closest::Indeterminate => line.start,
    }
}

/// A piecewise-linear alignment with R-tree-accelerated projection.
pub struct PolylineAlignment {
    name: String,
    vertices: Vec<Point2>,
    /// `cumulative[i]` is the station of `vertices[i]`.
    cumulative: Vec<f64>,
    tree: RTree<IndexedSegment>,
}

impl PolylineAlignment {
    /// Build an alignment from its vertex run.
    ///
    /// Zero-length interior segments are tolerated (skipped by both
    /// projection and turn extraction).
    ///
    /// # Errors
    ///
    /// [`AlignmentError::TooFewVertices`] for fewer than 2 vertices,
    /// [`AlignmentError::ZeroLength`] when all vertices coincide.
    pub fn new(name: impl Into<String>, vertices: Vec<Point2>) -> Result<Self, AlignmentError> {
        if vertices.len() < 2 {
            return Err(AlignmentError::TooFewVertices {
                found: vertices.len(),
            });
        }

        let mut cumulative = Vec::with_capacity(vertices.len());
        cumulative.push(0.0);
        let mut total = 0.0;
        for pair in vertices.windows(2) {
            total += pair[0].distance(pair[1]);
            cumulative.push(total);
        }
        if total <= 0.0 {
            return Err(AlignmentError::ZeroLength);
        }

        let segments: Vec<IndexedSegment> = vertices
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| pair[0] != pair[1])
            .map(|(i, pair)| {
                GeomWithData::new(
                    Line::new(point_to_coord(pair[0]), point_to_coord(pair[1])),
                    i,
                )
            })
            .collect();
        let tree = RTree::bulk_load(segments);

        Ok(Self {
            name: name.into(),
            vertices,
            cumulative,
            tree,
        })
    }

    /// Alignment name, used as the block name suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signed horizontal turns at interior vertices, in station order.
    ///
    /// The angle between the incoming and outgoing directions is
    /// `asin(cross / (|a|·|b|))` in degrees, rounded to 1 decimal;
    /// positive turns left. Joints rounding to 0.0 are not turns.
    ///
    /// Values are pre-rounded to the comparison precision, so exact
    /// equality is the intended semantic.
    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn turns(&self) -> Vec<AlignmentTurn> {
        let mut turns = Vec::new();
        for i in 1..self.vertices.len() - 1 {
            let prev = self.vertices[i - 1];
            let mid = self.vertices[i];
            let next = self.vertices[i + 1];
            let ax = mid.x - prev.x;
            let ay = mid.y - prev.y;
            let bx = next.x - mid.x;
            let by = next.y - mid.y;
            let len_a = ax.hypot(ay);
            let len_b = bx.hypot(by);
            if len_a == 0.0 || len_b == 0.0 {
                continue;
            }
            let cross = ax.mul_add(by, -(ay * bx));
            let angle = (cross / (len_a * len_b)).clamp(-1.0, 1.0).asin().to_degrees();
            let rounded = round_dp(angle, 1);
            if rounded == 0.0 {
                continue;
            }
            turns.push(AlignmentTurn {
                station: self.cumulative[i],
                angle_degrees: rounded,
            });
        }
        turns
    }
}

impl StationProjector for PolylineAlignment {
    fn start_point(&self) -> Point2 {
        self.vertices[0]
    }

    fn ending_station(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn project(&self, point: Point2) -> StationOffset {
        let query = geo::Point::new(point.x, point.y);
        // Validation guarantees at least one positive-length segment.
        let Some(nearest) = self.tree.nearest_neighbor(&query) else {
            return StationOffset {
                station: 0.0,
                offset: 0.0,
            };
        };
        let line = nearest.geom();
        let foot = closest_coord_on_line(line, &query);

        let along = Euclidean.distance(&geo::Point::from(line.start), &geo::Point::from(foot));
        let station = self.cumulative[nearest.data] + along;

        let dx = line.end.x - line.start.x;
        let dy = line.end.y - line.start.y;
        let seg_len = dx.hypot(dy);
        let vx = point.x - line.start.x;
        let vy = point.y - line.start.y;
        let cross = dx.mul_add(vy, -(dy * vx));
        let offset = if seg_len > 0.0 { -cross / seg_len } else { 0.0 };

        StationOffset { station, offset }
    }
}
