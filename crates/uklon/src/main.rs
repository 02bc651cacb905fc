//! uklon: CLI host for the profile annotation pipeline.
//!
//! Loads a scene description (networks, structures, alignments, profile
//! views) from JSON, runs the annotation batch, and either writes one
//! SVG per annotated view or prints per-view diagnostics.
//!
//! # Usage
//!
//! ```text
//! uklon annotate --scene scene.json --out-dir out/ [--views NAME ...] [--json]
//! uklon inspect --scene scene.json
//! ```
//!
//! The human-readable batch summary goes to stderr; `--json` prints the
//! serialized report to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use uklon_export::SvgSink;
use uklon_pipeline::{
    AlignmentTurn, AnnotateConfig, Clock, NetworkKind, PipeRecord, Point2, Point3,
    PolylineAlignment, ProfileView, RecordingSink, StationProjector, ViewJob, annotate_batch,
    build_chain, records_for_view, segment_slope_runs, segment_type_runs,
};

/// Annotate pipe-network profile views from a scene description.
#[derive(Parser)]
#[command(name = "uklon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Annotate profile views and write one SVG per view.
    Annotate(AnnotateArgs),
    /// Print per-view chain and run diagnostics without writing files.
    Inspect(InspectArgs),
}

#[derive(Args)]
struct AnnotateArgs {
    /// Path to the scene description JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Directory the rendered `<view>.svg` files are written to.
    #[arg(long)]
    out_dir: PathBuf,

    /// Annotate only the named profile views (repeatable; default all).
    #[arg(long, value_name = "NAME")]
    views: Vec<String>,

    /// Print the batch report as JSON to stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to the scene description JSON.
    #[arg(long)]
    scene: PathBuf,
}

/// Scene description loaded from JSON: everything one annotation batch
/// needs, in drawing terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Scene {
    /// Networks and the pipes they own.
    networks: Vec<SceneNetwork>,
    /// Structure name to the names of the pipes attached to it.
    structures: BTreeMap<String, BTreeSet<String>>,
    /// Named alignment polylines.
    alignments: Vec<SceneAlignment>,
    /// Profile views to annotate.
    views: Vec<SceneView>,
    /// Classification rules and record filters.
    #[serde(default)]
    config: AnnotateConfig,
}

/// One named network and its pipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneNetwork {
    name: String,
    kind: NetworkKind,
    pipes: Vec<ScenePipe>,
}

/// Pipe fields as serialized in the scene; the owning network supplies
/// the network name and kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScenePipe {
    name: String,
    size_label: String,
    start: Point3,
    end: Point3,
    start_structure: String,
    end_structure: String,
    length_2d: f64,
    slope: f64,
    diameter: f64,
}

/// An alignment polyline, start to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneAlignment {
    name: String,
    vertices: Vec<Point2>,
}

/// A profile view plus the name of the alignment it profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SceneView {
    #[serde(flatten)]
    view: ProfileView,
    alignment: String,
}

impl Scene {
    /// Flatten network-owned pipes into standalone records.
    fn pipe_records(&self) -> Vec<PipeRecord> {
        self.networks
            .iter()
            .flat_map(|network| {
                network.pipes.iter().map(|pipe| PipeRecord {
                    name: pipe.name.clone(),
                    network: network.name.clone(),
                    network_kind: network.kind,
                    size_label: pipe.size_label.clone(),
                    start: pipe.start,
                    end: pipe.end,
                    start_structure: pipe.start_structure.clone(),
                    end_structure: pipe.end_structure.clone(),
                    length_2d: pipe.length_2d,
                    slope: pipe.slope,
                    diameter: pipe.diameter,
                })
            })
            .collect()
    }
}

fn load_scene(path: &Path) -> Result<Scene, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
}

/// Construct every alignment up front so a degenerate polyline fails
/// the whole run instead of one view at a time.
fn build_alignments(
    scene: &Scene,
) -> Result<BTreeMap<String, (PolylineAlignment, Vec<AlignmentTurn>)>, String> {
    let mut alignments = BTreeMap::new();
    for entry in &scene.alignments {
        let alignment = PolylineAlignment::new(entry.name.clone(), entry.vertices.clone())
            .map_err(|e| format!("Error in alignment {:?}: {e}", entry.name))?;
        let turns = alignment.turns();
        alignments.insert(entry.name.clone(), (alignment, turns));
    }
    Ok(alignments)
}

/// Resolve the requested view names, or all views when none are named.
fn select_views<'a>(scene: &'a Scene, requested: &[String]) -> Result<Vec<&'a SceneView>, String> {
    if requested.is_empty() {
        return Ok(scene.views.iter().collect());
    }
    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        let Some(scene_view) = scene.views.iter().find(|v| v.view.name == *name) else {
            return Err(format!("Error: no profile view named {name:?} in the scene"));
        };
        selected.push(scene_view);
    }
    Ok(selected)
}

/// Pair each selected view with its alignment collaborators.
fn build_jobs<'a>(
    views: &[&'a SceneView],
    alignments: &'a BTreeMap<String, (PolylineAlignment, Vec<AlignmentTurn>)>,
) -> Result<Vec<ViewJob<'a, PolylineAlignment>>, String> {
    let mut jobs = Vec::with_capacity(views.len());
    for scene_view in views {
        let Some((alignment, turns)) = alignments.get(scene_view.alignment.as_str()) else {
            return Err(format!(
                "Error: profile view {:?} references unknown alignment {:?}",
                scene_view.view.name, scene_view.alignment
            ));
        };
        jobs.push(ViewJob {
            view: &scene_view.view,
            alignment_name: alignment.name(),
            projector: alignment,
            turns,
        });
    }
    Ok(jobs)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Annotate(args) => run_annotate(&args),
        Command::Inspect(args) => run_inspect(&args),
    }
}

fn run_annotate(args: &AnnotateArgs) -> ExitCode {
    let scene = match load_scene(&args.scene) {
        Ok(scene) => scene,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let records = scene.pipe_records();
    let alignments = match build_alignments(&scene) {
        Ok(alignments) => alignments,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let selected = match select_views(&scene, &args.views) {
        Ok(selected) => selected,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let jobs = match build_jobs(&selected, &alignments) {
        Ok(jobs) => jobs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Scene: {} ({} pipes)", args.scene.display(), records.len());
    eprintln!("Views: {}", jobs.len());

    let mut sink = SvgSink::new();
    let report = match annotate_batch(
        &jobs,
        &records,
        &scene.structures,
        &scene.config,
        &mut sink,
        &StdClock,
    ) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&args.out_dir) {
        eprintln!("Error creating {}: {e}", args.out_dir.display());
        return ExitCode::FAILURE;
    }
    for (view, svg) in sink.render_all() {
        // View names may contain path separators.
        let filename = format!("{}.svg", view.replace(['/', '\\'], "_"));
        let path = args.out_dir.join(filename);
        match std::fs::write(&path, &svg) {
            Ok(()) => eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len()),
            Err(e) => {
                eprintln!("Error writing {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    eprintln!();
    eprintln!("{}", report.summary());

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_inspect(args: &InspectArgs) -> ExitCode {
    let scene = match load_scene(&args.scene) {
        Ok(scene) => scene,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let records = scene.pipe_records();
    let alignments = match build_alignments(&scene) {
        Ok(alignments) => alignments,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let all_views: Vec<&SceneView> = scene.views.iter().collect();
    let jobs = match build_jobs(&all_views, &alignments) {
        Ok(jobs) => jobs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    // Dry run: same batch, recording sink, nothing written.
    let mut sink = RecordingSink::new();
    let report = match annotate_batch(
        &jobs,
        &records,
        &scene.structures,
        &scene.config,
        &mut sink,
        &StdClock,
    ) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for scene_view in &all_views {
        if let Some((alignment, turns)) = alignments.get(scene_view.alignment.as_str()) {
            println!("{}", inspect_view(scene_view, alignment, turns, &records, &scene));
            println!();
        }
    }
    println!("{}", report.summary());
    ExitCode::SUCCESS
}

/// Per-view diagnostics: category, chain order, run partitions, turns.
fn inspect_view(
    scene_view: &SceneView,
    alignment: &PolylineAlignment,
    turns: &[AlignmentTurn],
    records: &[PipeRecord],
    scene: &Scene,
) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} (alignment {})",
        scene_view.view.name,
        alignment.name()
    ));
    lines.push("=".repeat(60));

    let category = match scene.config.rules.classify(&scene_view.view.name) {
        Ok(category) => category,
        Err(e) => {
            lines.push(format!("category: {e}"));
            return lines.join("\n");
        }
    };
    lines.push(format!("category: {category}"));

    let eligible = records_for_view(records, &scene_view.view, &scene.config.filter);
    lines.push(format!("eligible pipes: {}", eligible.len()));

    let chain = match build_chain(&eligible, alignment.start_point(), &scene.structures) {
        Ok(chain) => chain,
        Err(e) => {
            lines.push(format!("chain: {e}"));
            return lines.join("\n");
        }
    };
    let order: Vec<&str> = chain.links().iter().map(|link| link.name()).collect();
    lines.push(format!("chain: {}", order.join(" -> ")));

    lines.push("slope runs:".to_owned());
    for run in segment_slope_runs(chain.links(), alignment) {
        lines.push(format!(
            "  {:>8.2}..{:<8.2} slope {:>7.4}  length {:>8.2}",
            run.start_station, run.end_station, run.slope, run.length
        ));
    }
    lines.push("type runs:".to_owned());
    for run in segment_type_runs(chain.links(), alignment) {
        lines.push(format!(
            "  {:>8.2}..{:<8.2} {}",
            run.start_station, run.end_station, run.size_label
        ));
    }

    if category.row_schedule().turn_row_drop.is_some() {
        lines.push("turns:".to_owned());
        for (i, turn) in turns.iter().enumerate() {
            lines.push(format!(
                "  УП{} at {:.2}, angle {:+.1}",
                i + 1,
                turn.station,
                turn.angle_degrees
            ));
        }
    }

    lines.join("\n")
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_scene_json() -> &'static str {
        r#"{
            "networks": [
                {
                    "name": "К2-сеть",
                    "kind": "gravity",
                    "pipes": [
                        {
                            "name": "п1",
                            "size_label": "300",
                            "start": {"x": 0.0, "y": 0.0, "z": 95.0},
                            "end": {"x": 40.0, "y": 0.0, "z": 94.2},
                            "start_structure": "А",
                            "end_structure": "Б",
                            "length_2d": 40.0,
                            "slope": 0.02,
                            "diameter": 0.2
                        }
                    ]
                }
            ],
            "structures": {"А": ["п1"], "Б": ["п1"]},
            "alignments": [
                {"name": "Тр", "vertices": [{"x": 0.0, "y": 0.0}, {"x": 40.0, "y": 0.0}]}
            ],
            "views": [
                {
                    "name": "К2-профиль",
                    "insertion": {"x": 100.0, "y": 50.0},
                    "networks": ["К2-сеть"],
                    "alignment": "Тр"
                }
            ]
        }"#
    }

    // --- scene model tests ---

    #[test]
    fn scene_json_parses_with_defaults() {
        let scene: Scene = serde_json::from_str(sample_scene_json()).unwrap();

        assert_eq!(scene.networks.len(), 1);
        assert_eq!(scene.views[0].view.name, "К2-профиль");
        assert_eq!(scene.views[0].alignment, "Тр");
        assert!(scene.views[0].view.excluded_pipes.is_empty());
        assert_eq!(scene.config, AnnotateConfig::default());
    }

    #[test]
    fn pipe_records_inherit_the_owning_network() {
        let scene: Scene = serde_json::from_str(sample_scene_json()).unwrap();
        let records = scene.pipe_records();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "п1");
        assert_eq!(records[0].network, "К2-сеть");
        assert!(matches!(records[0].network_kind, NetworkKind::Gravity));
    }

    // --- selection tests ---

    #[test]
    fn empty_request_selects_every_view() {
        let scene: Scene = serde_json::from_str(sample_scene_json()).unwrap();
        let selected = select_views(&scene, &[]).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn unknown_view_name_is_an_error() {
        let scene: Scene = serde_json::from_str(sample_scene_json()).unwrap();
        let err = select_views(&scene, &["нет".to_owned()]).unwrap_err();
        assert!(err.contains("нет"));
    }

    #[test]
    fn unknown_alignment_reference_is_an_error() {
        let mut scene: Scene = serde_json::from_str(sample_scene_json()).unwrap();
        scene.views[0].alignment = "другая".to_owned();
        let alignments = build_alignments(&scene).unwrap();
        let all_views: Vec<&SceneView> = scene.views.iter().collect();
        let err = build_jobs(&all_views, &alignments).unwrap_err();
        assert!(err.contains("другая"));
    }
}
