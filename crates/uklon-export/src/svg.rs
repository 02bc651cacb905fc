//! SVG drawing sink and serializer.
//!
//! [`SvgSink`] implements [`DrawingSink`] over an in-memory document
//! model: one drawing per profile view, each holding the annotation
//! blocks placed so far. [`view_to_svg`] serializes a drawing into an
//! SVG string using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting.
//!
//! Annotation geometry is y-up (station space); SVG is y-down. The
//! serializer fits a padded viewBox around the placed blocks and flips
//! the y axis, so the rendered rows read the same way they would in
//! the source drawing.
//!
//! Serialization is pure and returns a `String`; file I/O lives in the
//! `uklon` CLI.

use std::collections::BTreeMap;

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Group, Line, Path, Polygon, Text, Title};

use uklon_pipeline::{
    Anchor, BlockPlan, DrawingSink, Instruction, PlacedBlock, Point2, Rgb, SinkError,
};

/// Padding around the annotation content, in drawing units.
const MARGIN: f64 = 5.0;
/// Stroke width for linework without an explicit weight.
const STROKE_WIDTH: f64 = 0.15;
/// Label font size in drawing units.
const FONT_SIZE: f64 = 1.8;

/// Blocks staged by the currently open view transaction.
#[derive(Debug, Clone)]
struct StagedView {
    view: String,
    blocks: Vec<PlacedBlock>,
}

/// [`DrawingSink`] that renders committed profile views as SVG
/// documents.
///
/// Each view name maps to one drawing. [`begin`](DrawingSink::begin)
/// stages a working copy of the view's current drawing, so a repeat
/// annotation erases the previous run's blocks and replaces them;
/// [`commit`](DrawingSink::commit) swaps the copy in atomically and
/// [`rollback`](DrawingSink::rollback) discards it, leaving the prior
/// drawing untouched.
#[derive(Debug, Default)]
pub struct SvgSink {
    drawings: BTreeMap<String, Vec<PlacedBlock>>,
    staged: Option<StagedView>,
}

impl SvgSink {
    /// An empty sink with no committed drawings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no transaction is currently open.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.staged.is_none()
    }

    /// Names of the views with a committed drawing, sorted.
    #[must_use]
    pub fn view_names(&self) -> Vec<&str> {
        self.drawings.keys().map(String::as_str).collect()
    }

    /// Committed blocks for one view, in placement order.
    #[must_use]
    pub fn blocks(&self, view: &str) -> Option<&[PlacedBlock]> {
        self.drawings.get(view).map(Vec::as_slice)
    }

    /// Render one committed view, or `None` if the view is unknown.
    #[must_use]
    pub fn render_view(&self, view: &str) -> Option<String> {
        self.drawings
            .get(view)
            .map(|blocks| view_to_svg(view, blocks))
    }

    /// Render every committed view, in view-name order.
    #[must_use]
    pub fn render_all(&self) -> Vec<(String, String)> {
        self.drawings
            .iter()
            .map(|(view, blocks)| (view.clone(), view_to_svg(view, blocks)))
            .collect()
    }

    fn staged_mut(&mut self) -> Result<&mut StagedView, SinkError> {
        self.staged
            .as_mut()
            .ok_or_else(|| SinkError::new("no open view transaction"))
    }
}

impl DrawingSink for SvgSink {
    fn begin(&mut self, view: &str) -> Result<(), SinkError> {
        if self.staged.is_some() {
            return Err(SinkError::new("a view transaction is already open"));
        }
        self.staged = Some(StagedView {
            view: view.to_owned(),
            blocks: self.drawings.get(view).cloned().unwrap_or_default(),
        });
        Ok(())
    }

    fn erase_blocks(&mut self, names: &[String]) -> Result<(), SinkError> {
        let staged = self.staged_mut()?;
        staged
            .blocks
            .retain(|block| !names.contains(&block.plan.name));
        Ok(())
    }

    fn place_block(&mut self, plan: &BlockPlan, origin: Point2) -> Result<(), SinkError> {
        let staged = self.staged_mut()?;
        staged.blocks.push(PlacedBlock {
            plan: plan.clone(),
            origin,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| SinkError::new("no open view transaction"))?;
        self.drawings.insert(staged.view, staged.blocks);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SinkError> {
        if self.staged.take().is_none() {
            return Err(SinkError::new("no open view transaction"));
        }
        Ok(())
    }
}

/// The padded bounding box of the placed blocks, plus the y-flip into
/// SVG coordinates.
struct Viewport {
    min_x: f64,
    max_y: f64,
    width: f64,
    height: f64,
}

impl Viewport {
    fn of(blocks: &[PlacedBlock]) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut cover = |p: Point2| {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        };

        for block in blocks {
            let origin = block.origin;
            for instruction in &block.plan.instructions {
                match instruction {
                    Instruction::Line { from, to, .. } => {
                        cover(absolute(origin, *from));
                        cover(absolute(origin, *to));
                    }
                    Instruction::Text { at, .. } => cover(absolute(origin, *at)),
                    // Conservative square extents for curved primitives.
                    Instruction::Circle { center, radius, .. }
                    | Instruction::Arc { center, radius, .. } => {
                        let c = absolute(origin, *center);
                        cover(Point2::new(c.x - radius, c.y - radius));
                        cover(Point2::new(c.x + radius, c.y + radius));
                    }
                    Instruction::ClosedPolyline { vertices, .. } => {
                        for vertex in vertices {
                            cover(absolute(origin, *vertex));
                        }
                    }
                }
            }
        }

        if !min_x.is_finite() {
            min_x = 0.0;
            min_y = 0.0;
            max_x = 0.0;
            max_y = 0.0;
        }
        Self {
            min_x,
            max_y,
            width: max_x - min_x + 2.0 * MARGIN,
            height: max_y - min_y + 2.0 * MARGIN,
        }
    }

    /// Map a block-local point into SVG document coordinates.
    fn place(&self, origin: Point2, local: Point2) -> (f64, f64) {
        let p = absolute(origin, local);
        (p.x - self.min_x + MARGIN, self.max_y - p.y + MARGIN)
    }
}

const fn absolute(origin: Point2, local: Point2) -> Point2 {
    Point2::new(origin.x + local.x, origin.y + local.y)
}

fn css_color(color: Option<Rgb>) -> String {
    color.map_or_else(
        || "black".to_owned(),
        |c| format!("rgb({},{},{})", c.r, c.g, c.b),
    )
}

const fn anchor_attrs(anchor: Anchor) -> (&'static str, &'static str) {
    match anchor {
        Anchor::TopLeft => ("start", "hanging"),
        Anchor::TopRight => ("end", "hanging"),
        Anchor::BottomLeft => ("start", "alphabetic"),
        Anchor::BottomRight => ("end", "alphabetic"),
        Anchor::MiddleCenter => ("middle", "central"),
    }
}

const fn fill_value(filled: bool) -> &'static str {
    if filled { "black" } else { "none" }
}

/// One `<g>` per placed block, carrying the block name so annotation
/// groups stay identifiable in the output.
fn render_block(block: &PlacedBlock, viewport: &Viewport) -> Group {
    let mut group = Group::new().set("data-name", block.plan.name.clone());
    for instruction in &block.plan.instructions {
        group = match instruction {
            Instruction::Line {
                from,
                to,
                color,
                weight_mm,
            } => {
                let (x1, y1) = viewport.place(block.origin, *from);
                let (x2, y2) = viewport.place(block.origin, *to);
                group.add(
                    Line::new()
                        .set("x1", x1)
                        .set("y1", y1)
                        .set("x2", x2)
                        .set("y2", y2)
                        .set("stroke", css_color(*color))
                        .set("stroke-width", weight_mm.unwrap_or(STROKE_WIDTH)),
                )
            }
            // Wrap width has no SVG counterpart; labels stay single-line.
            Instruction::Text {
                value, at, anchor, ..
            } => {
                let (x, y) = viewport.place(block.origin, *at);
                let (text_anchor, baseline) = anchor_attrs(*anchor);
                group.add(
                    Text::new(value.clone())
                        .set("x", x)
                        .set("y", y)
                        .set("font-size", FONT_SIZE)
                        .set("font-family", "sans-serif")
                        .set("text-anchor", text_anchor)
                        .set("dominant-baseline", baseline),
                )
            }
            Instruction::Circle {
                center,
                radius,
                filled,
            } => {
                let (cx, cy) = viewport.place(block.origin, *center);
                group.add(
                    Circle::new()
                        .set("cx", cx)
                        .set("cy", cy)
                        .set("r", *radius)
                        .set("fill", fill_value(*filled))
                        .set("stroke", "black")
                        .set("stroke-width", STROKE_WIDTH),
                )
            }
            Instruction::ClosedPolyline { vertices, filled } => {
                let points = vertices
                    .iter()
                    .map(|vertex| {
                        let (x, y) = viewport.place(block.origin, *vertex);
                        format!("{x},{y}")
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                group.add(
                    Polygon::new()
                        .set("points", points)
                        .set("fill", fill_value(*filled))
                        .set("stroke", "black")
                        .set("stroke-width", STROKE_WIDTH),
                )
            }
            Instruction::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => group.add(render_arc(
                block.origin,
                *center,
                *radius,
                *start_angle,
                *end_angle,
                viewport,
            )),
        };
    }
    group
}

/// Serialize a counterclockwise arc as an SVG path.
///
/// The y flip mirrors orientation, so a counterclockwise sweep in
/// drawing space is emitted with `sweep-flag` 0.
fn render_arc(
    origin: Point2,
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    viewport: &Viewport,
) -> Path {
    let sweep = (end_angle - start_angle).rem_euclid(std::f64::consts::TAU);
    let large_arc = if sweep > std::f64::consts::PI { 1.0 } else { 0.0 };
    let start = Point2::new(
        radius.mul_add(start_angle.cos(), center.x),
        radius.mul_add(start_angle.sin(), center.y),
    );
    let end = Point2::new(
        radius.mul_add(end_angle.cos(), center.x),
        radius.mul_add(end_angle.sin(), center.y),
    );
    let (sx, sy) = viewport.place(origin, start);
    let (ex, ey) = viewport.place(origin, end);
    let data = Data::new()
        .move_to((sx, sy))
        .elliptical_arc_to((radius, radius, 0.0, large_arc, 0.0, ex, ey));
    Path::new()
        .set("d", data)
        .set("fill", "none")
        .set("stroke", "black")
        .set("stroke-width", STROKE_WIDTH)
}

/// Serialize one profile view's placed blocks into an SVG document
/// string.
///
/// The view name becomes the document `<title>`. Each block becomes a
/// `<g>` element tagged with a `data-name` attribute, holding its
/// primitives in SVG coordinates.
///
/// # Examples
///
/// ```
/// use uklon_export::view_to_svg;
/// use uklon_pipeline::{BlockPlan, Instruction, PlacedBlock, Point2};
///
/// let blocks = vec![PlacedBlock {
///     plan: BlockPlan {
///         name: "разделитель".to_owned(),
///         instructions: vec![Instruction::line(
///             Point2::new(0.0, 0.0),
///             Point2::new(0.0, 5.0),
///         )],
///     },
///     origin: Point2::new(100.0, 40.0),
/// }];
/// let svg = view_to_svg("В1-профиль", &blocks);
/// assert!(svg.contains("<title>В1-профиль</title>"));
/// assert!(svg.contains("<line"));
/// ```
#[must_use]
pub fn view_to_svg(view: &str, blocks: &[PlacedBlock]) -> String {
    let viewport = Viewport::of(blocks);

    let mut doc = Document::new()
        .set("width", viewport.width)
        .set("height", viewport.height)
        .set("viewBox", format!("0 0 {} {}", viewport.width, viewport.height))
        .add(Title::new(view));

    for block in blocks {
        doc = doc.add(render_block(block, &viewport));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
