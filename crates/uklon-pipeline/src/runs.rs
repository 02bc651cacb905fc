//! Run segmentation: partition a chain into maximal stretches that
//! share an annotation value.
//!
//! Two independent partitions are computed from the same chain:
//!
//! - **Slope runs** group consecutive links whose slope rounds equal
//!   at 3 decimals *and* whose interiors join at the shared structure
//!   (invert or crown elevations round equal at 1 decimal). A vertical
//!   drop at a structure starts a new run even when the slope class
//!   continues.
//! - **Type runs** group consecutive links with exactly equal size
//!   labels. Elevation is irrelevant.
//!
//! Boundary stations differ deliberately between the partitions: a
//! slope boundary sits where the next pipe starts, a type boundary
//! where the previous pipe ends. Pipe endpoints stop at structure
//! walls, so the two straddle the structure's physical extent.
//!
//! Every partition opens at station 0 and closes at the alignment's
//! ending station; run lengths sum the member pipes' plan lengths
//! rather than the station interval.

use serde::{Deserialize, Serialize};

use crate::alignment::StationProjector;
use crate::chain::ChainLink;
use crate::types::round_dp;

/// A maximal stretch of consecutive links sharing a slope class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeRun {
    /// Station where the run opens.
    pub start_station: f64,
    /// Station where the run closes.
    pub end_station: f64,
    /// Sum of the member pipes' plan lengths.
    pub length: f64,
    /// Oriented slope of the run (signed, from its latest member).
    pub slope: f64,
}

/// A maximal stretch of consecutive links sharing a size label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRun {
    /// Station where the run opens.
    pub start_station: f64,
    /// Station where the run closes.
    pub end_station: f64,
    /// Sum of the member pipes' plan lengths.
    pub length: f64,
    /// Shared size/type descriptor.
    pub size_label: String,
}

/// Whether `cur` continues `prev`'s slope run.
///
/// Values are pre-rounded to the comparison precision, so exact
/// equality is the intended semantic.
#[allow(clippy::float_cmp)]
fn same_slope_class(prev: &ChainLink<'_>, cur: &ChainLink<'_>) -> bool {
    if round_dp(prev.slope(), 3) != round_dp(cur.slope(), 3) {
        return false;
    }
    let inverts_join = round_dp(prev.end_invert(), 1) == round_dp(cur.start_invert(), 1);
    let crowns_join = round_dp(prev.end_crown(), 1) == round_dp(cur.start_crown(), 1);
    inverts_join || crowns_join
}

/// Partition the chain into slope runs.
///
/// A boundary between two runs is stationed at the *next* pipe's start
/// point. The first run opens at station 0 and the last closes at the
/// projector's ending station.
pub fn segment_slope_runs<P>(links: &[ChainLink<'_>], projector: &P) -> Vec<SlopeRun>
where
    P: StationProjector + ?Sized,
{
    let Some(first) = links.first() else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut open_station = 0.0;
    let mut length = first.length_2d();
    let mut slope = first.slope();
    let mut prev = first;

    for cur in &links[1..] {
        if same_slope_class(prev, cur) {
            length += cur.length_2d();
            slope = cur.slope();
        } else {
            let boundary = projector.project(cur.start().plan()).station;
            runs.push(SlopeRun {
                start_station: open_station,
                end_station: boundary,
                length,
                slope,
            });
            open_station = boundary;
            length = cur.length_2d();
            slope = cur.slope();
        }
        prev = cur;
    }

    runs.push(SlopeRun {
        start_station: open_station,
        end_station: projector.ending_station(),
        length,
        slope,
    });
    runs
}

/// Partition the chain into type runs.
///
/// A boundary between two runs is stationed at the *previous* pipe's
/// end point. The first run opens at station 0 and the last closes at
/// the projector's ending station.
pub fn segment_type_runs<P>(links: &[ChainLink<'_>], projector: &P) -> Vec<TypeRun>
where
    P: StationProjector + ?Sized,
{
    let Some(first) = links.first() else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut open_station = 0.0;
    let mut length = first.length_2d();
    let mut label = first.size_label();
    let mut prev = first;

    for cur in &links[1..] {
        if cur.size_label() == label {
            length += cur.length_2d();
        } else {
            let boundary = projector.project(prev.end().plan()).station;
            runs.push(TypeRun {
                start_station: open_station,
                end_station: boundary,
                length,
                size_label: label.to_owned(),
            });
            open_station = boundary;
            length = cur.length_2d();
            label = cur.size_label();
        }
        prev = cur;
    }

    runs.push(TypeRun {
        start_station: open_station,
        end_station: projector.ending_station(),
        length,
        size_label: label.to_owned(),
    });
    runs
}
