//! uklon-pipeline: Pure pipe-network profile annotation (sans-IO).
//!
//! Converts unordered pipe records into placed annotation rows through:
//! classify -> filter -> chain -> segment runs -> plan rows -> draw.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! scene data and hands drawing primitives to a caller-supplied
//! [`DrawingSink`]. All file and document interaction lives in
//! `uklon-export` and the `uklon` CLI.

pub mod alignment;
pub mod annotate;
pub mod category;
pub mod chain;
pub mod layout;
pub mod normalize;
pub mod report;
pub mod runs;
pub mod sink;
pub mod turns;
pub mod types;

pub use alignment::{AlignmentError, PolylineAlignment, StationProjector};
pub use annotate::{AnnotateConfig, ViewJob, annotate_batch, annotate_view};
pub use category::{CategoryRule, CategoryRules, ProfileCategory, RowSchedule};
pub use chain::{Chain, ChainLink, PipeAdjacency, build_chain};
pub use normalize::{RecordFilter, records_for_view};
pub use report::{BatchReport, Clock, ViewOutcome, ViewStatus};
pub use runs::{SlopeRun, TypeRun, segment_slope_runs, segment_type_runs};
pub use sink::{DrawingSink, RecordingSink, SinkError};
pub use turns::{AlignmentTurn, plan_turn_row};
pub use types::{
    Anchor, AnnotateError, BlockPlan, Instruction, NetworkKind, PipeRecord, PlacedBlock, Point2,
    Point3, ProfileView, Rgb, StationOffset, round_dp,
};
