//! uklon-export: SVG rendering for annotation plans (sans-IO)
//!
//! Provides [`SvgSink`], a transactional [`DrawingSink`] backed by an
//! in-memory document model, and pure serializers from placed blocks
//! to SVG strings. Future sinks: DXF, drawing-database adapters.
//!
//! [`DrawingSink`]: uklon_pipeline::DrawingSink

pub mod svg;

pub use svg::{SvgSink, view_to_svg};
