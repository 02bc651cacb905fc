//! The annotation pipeline: classify, chain, segment, plan, draw.
//!
//! [`annotate_view`] runs one profile view end to end and always
//! produces a [`ViewOutcome`]; [`annotate_batch`] drives a selection
//! of views, recording each outcome and continuing past per-view
//! failures. Only an empty selection fails the batch itself.
//!
//! All computation happens before the sink transaction opens, so a
//! chain or segmentation failure never touches the drawing. Once
//! [`DrawingSink::begin`] has run, any failure rolls the view back;
//! the stale-block erase happens inside the transaction so a rollback
//! restores previously drawn annotations too.

use serde::{Deserialize, Serialize};

use crate::alignment::StationProjector;
use crate::category::{CategoryRules, ProfileCategory, RowSchedule};
use crate::chain::{PipeAdjacency, build_chain};
use crate::layout::{annotation_block_names, plan_slope_row, plan_type_row};
use crate::normalize::{RecordFilter, records_for_view};
use crate::report::{BatchReport, Clock, ViewOutcome, ViewStatus};
use crate::runs::{segment_slope_runs, segment_type_runs};
use crate::sink::DrawingSink;
use crate::turns::{AlignmentTurn, plan_turn_row};
use crate::types::{AnnotateError, BlockPlan, PipeRecord, Point2, ProfileView};

/// Batch-wide configuration: classification rules and record filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotateConfig {
    /// View-name classification rules.
    #[serde(default)]
    pub rules: CategoryRules,
    /// Pipe record eligibility filter.
    #[serde(default)]
    pub filter: RecordFilter,
}

/// One profile view together with its alignment collaborators.
#[derive(Clone, Copy)]
pub struct ViewJob<'a, P: StationProjector + ?Sized> {
    /// The profile view to annotate.
    pub view: &'a ProfileView,
    /// Alignment name; suffixes every block name.
    pub alignment_name: &'a str,
    /// Station projection along the view's alignment.
    pub projector: &'a P,
    /// The alignment's horizontal turns, in station order.
    pub turns: &'a [AlignmentTurn],
}

struct RowCounts {
    pipes: usize,
    slope_runs: usize,
    type_runs: usize,
    turn_markers: usize,
}

/// Annotate one profile view, converting every failure into an
/// outcome.
///
/// A view without a seed pipe is reported as skipped; classification,
/// chain, and sink failures are reported as failed. The sink is rolled
/// back on any failure after its transaction opened.
pub fn annotate_view<P, A, S, C>(
    job: &ViewJob<'_, P>,
    records: &[PipeRecord],
    adjacency: &A,
    config: &AnnotateConfig,
    sink: &mut S,
    clock: &C,
) -> ViewOutcome
where
    P: StationProjector + ?Sized,
    A: PipeAdjacency + ?Sized,
    S: DrawingSink + ?Sized,
    C: Clock,
{
    let started = clock.now();

    // 1. Classify the view; nothing else makes sense without a category.
    let category = match config.rules.classify(&job.view.name) {
        Ok(category) => category,
        Err(err) => {
            return ViewOutcome {
                view: job.view.name.clone(),
                category: None,
                status: ViewStatus::Failed {
                    reason: err.to_string(),
                },
            };
        }
    };

    let status = match run_view(job, category, records, adjacency, config, sink) {
        Ok(counts) => ViewStatus::Annotated {
            pipes: counts.pipes,
            slope_runs: counts.slope_runs,
            type_runs: counts.type_runs,
            turn_markers: counts.turn_markers,
            duration: clock.elapsed(&started),
        },
        Err(err @ AnnotateError::NoSeedPipe) => ViewStatus::Skipped {
            reason: err.to_string(),
        },
        Err(err) => ViewStatus::Failed {
            reason: err.to_string(),
        },
    };

    ViewOutcome {
        view: job.view.name.clone(),
        category: Some(category),
        status,
    }
}

fn run_view<P, A, S>(
    job: &ViewJob<'_, P>,
    category: ProfileCategory,
    records: &[PipeRecord],
    adjacency: &A,
    config: &AnnotateConfig,
    sink: &mut S,
) -> Result<RowCounts, AnnotateError>
where
    P: StationProjector + ?Sized,
    A: PipeAdjacency + ?Sized,
    S: DrawingSink + ?Sized,
{
    // 2. Collect the records this view displays.
    let eligible = records_for_view(records, job.view, &config.filter);

    // 3. Rebuild the ordered chain from the alignment start.
    let chain = build_chain(&eligible, job.projector.start_point(), adjacency)?;

    // 4. Partition into slope and type runs.
    let slope_runs = segment_slope_runs(chain.links(), job.projector);
    let type_runs = segment_type_runs(chain.links(), job.projector);

    // 5. Plan the row blocks.
    let schedule = category.row_schedule();
    let slope_plan = plan_slope_row(&slope_runs, job.alignment_name, schedule.station_offset);
    let type_plan = plan_type_row(&type_runs, job.alignment_name, schedule.station_offset);
    let turn_plan = schedule.turn_row_drop.map(|_| {
        plan_turn_row(job.turns, job.alignment_name, job.projector.ending_station())
    });

    // 6. Apply through the sink, transactionally.
    sink.begin(&job.view.name)?;
    let applied = apply_blocks(
        sink,
        job.view.insertion,
        &schedule,
        job.alignment_name,
        &slope_plan,
        &type_plan,
        turn_plan.as_ref(),
    )
    .and_then(|()| sink.commit().map_err(AnnotateError::from));
    if let Err(err) = applied {
        // Keep the primary error; a rollback failure cannot improve on it.
        let _ = sink.rollback();
        return Err(err);
    }

    Ok(RowCounts {
        pipes: chain.len(),
        slope_runs: slope_runs.len(),
        type_runs: type_runs.len(),
        turn_markers: turn_plan.map_or(0, |_| job.turns.len()),
    })
}

fn apply_blocks<S>(
    sink: &mut S,
    insertion: Point2,
    schedule: &RowSchedule,
    alignment_name: &str,
    slope_plan: &BlockPlan,
    type_plan: &BlockPlan,
    turn_plan: Option<&BlockPlan>,
) -> Result<(), AnnotateError>
where
    S: DrawingSink + ?Sized,
{
    sink.erase_blocks(&annotation_block_names(alignment_name))?;
    sink.place_block(
        slope_plan,
        Point2::new(insertion.x, insertion.y - schedule.slope_row_drop),
    )?;
    sink.place_block(
        type_plan,
        Point2::new(insertion.x, insertion.y - schedule.type_row_drop),
    )?;
    if let (Some(drop), Some(plan)) = (schedule.turn_row_drop, turn_plan) {
        sink.place_block(plan, Point2::new(insertion.x, insertion.y - drop))?;
    }
    Ok(())
}

/// Annotate a selection of profile views.
///
/// Per-view failures are recorded in the report and the batch moves
/// on; the views after a failed one are still annotated.
///
/// # Errors
///
/// [`AnnotateError::SelectionEmpty`] when `jobs` is empty. This is the
/// only batch-level error.
pub fn annotate_batch<P, A, S, C>(
    jobs: &[ViewJob<'_, P>],
    records: &[PipeRecord],
    adjacency: &A,
    config: &AnnotateConfig,
    sink: &mut S,
    clock: &C,
) -> Result<BatchReport, AnnotateError>
where
    P: StationProjector + ?Sized,
    A: PipeAdjacency + ?Sized,
    S: DrawingSink + ?Sized,
    C: Clock,
{
    if jobs.is_empty() {
        return Err(AnnotateError::SelectionEmpty);
    }

    let mut report = BatchReport::new();
    for job in jobs {
        report.push(annotate_view(job, records, adjacency, config, sink, clock));
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use super::*;
    use crate::alignment::PolylineAlignment;
    use crate::layout::{slope_block_name, turn_block_name, type_block_name};
    use crate::sink::{RecordingSink, SinkError};
    use crate::types::{Instruction, NetworkKind, Point3};

    /// A clock that always reports the same elapsed time.
    struct FixedClock;

    impl Clock for FixedClock {
        type Instant = ();

        fn now(&self) -> Self::Instant {}

        fn elapsed(&self, (): &Self::Instant) -> Duration {
            Duration::from_millis(7)
        }
    }

    fn pipe(
        name: &str,
        network: &str,
        kind: NetworkKind,
        start_structure: &str,
        end_structure: &str,
        start: (f64, f64, f64),
        end: (f64, f64, f64),
        slope: f64,
        size_label: &str,
    ) -> PipeRecord {
        let start = Point3::new(start.0, start.1, start.2);
        let end = Point3::new(end.0, end.1, end.2);
        PipeRecord {
            name: name.to_owned(),
            network: network.to_owned(),
            network_kind: kind,
            size_label: size_label.to_owned(),
            start,
            end,
            start_structure: start_structure.to_owned(),
            end_structure: end_structure.to_owned(),
            length_2d: start.plan().distance(end.plan()),
            slope,
            diameter: 0.2,
        }
    }

    fn view(name: &str, network: &str) -> ProfileView {
        ProfileView {
            name: name.to_owned(),
            insertion: Point2::new(1000.0, 500.0),
            networks: std::iter::once(network.to_owned()).collect(),
            excluded_pipes: BTreeSet::new(),
        }
    }

    /// Straight two-pipe storm sewer along +x with a slope change.
    fn storm_scene() -> (
        Vec<PipeRecord>,
        BTreeMap<String, BTreeSet<String>>,
        PolylineAlignment,
    ) {
        let records = vec![
            pipe(
                "п1",
                "К2-сеть",
                NetworkKind::Gravity,
                "А",
                "Б",
                (0.0, 0.0, 95.0),
                (40.0, 0.0, 94.2),
                0.02,
                "300",
            ),
            pipe(
                "п2",
                "К2-сеть",
                NetworkKind::Gravity,
                "Б",
                "В",
                (40.0, 0.0, 94.2),
                (100.0, 0.0, 92.4),
                0.03,
                "300",
            ),
        ];
        let adjacency: BTreeMap<String, BTreeSet<String>> = [
            ("А", vec!["п1"]),
            ("Б", vec!["п1", "п2"]),
            ("В", vec!["п2"]),
        ]
        .into_iter()
        .map(|(s, names)| {
            (
                s.to_owned(),
                names.into_iter().map(str::to_owned).collect(),
            )
        })
        .collect();
        let alignment = PolylineAlignment::new(
            "Трасса-К2",
            vec![Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)],
        )
        .unwrap();
        (records, adjacency, alignment)
    }

    fn job<'a>(
        view: &'a ProfileView,
        alignment: &'a PolylineAlignment,
        turns: &'a [AlignmentTurn],
    ) -> ViewJob<'a, PolylineAlignment> {
        ViewJob {
            view,
            alignment_name: alignment.name(),
            projector: alignment,
            turns,
        }
    }

    // --- annotate_view tests ---

    #[test]
    fn storm_view_commits_both_rows() {
        let (records, adjacency, alignment) = storm_scene();
        let view = view("К2-профиль", "К2-сеть");
        let turns = alignment.turns();
        let mut sink = RecordingSink::new();

        let outcome = annotate_view(
            &job(&view, &alignment, &turns),
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        );

        assert_eq!(outcome.view, "К2-профиль");
        assert_eq!(outcome.category, Some(ProfileCategory::GravityStorm));
        assert!(matches!(
            outcome.status,
            ViewStatus::Annotated {
                pipes: 2,
                slope_runs: 2,
                type_runs: 1,
                turn_markers: 0,
                ..
            }
        ));

        assert_eq!(sink.committed().len(), 1);
        let record = &sink.committed()[0];
        // Erase pre-pass covers all three block names.
        assert_eq!(record.erased.len(), 3);
        assert!(record.erased.contains(&turn_block_name("Трасса-К2")));
        // Gravity views place only the slope and type rows.
        assert_eq!(record.placed.len(), 2);
        assert_eq!(record.placed[0].plan.name, slope_block_name("Трасса-К2"));
        assert_eq!(record.placed[0].origin, Point2::new(1000.0, 460.0));
        assert_eq!(record.placed[1].plan.name, type_block_name("Трасса-К2"));
        assert_eq!(record.placed[1].origin, Point2::new(1000.0, 470.0));
        // The gravity station offset shifts the start divider to x = 5.
        assert!(matches!(
            record.placed[0].plan.instructions[0],
            Instruction::Line {
                from: Point2 { x: 5.0, .. },
                ..
            }
        ));
    }

    #[test]
    fn pressure_view_places_the_turn_row_too() {
        let (mut records, adjacency, _) = storm_scene();
        for record in &mut records {
            record.network = "В1-сеть".to_owned();
            record.network_kind = NetworkKind::Pressure;
        }
        let alignment = PolylineAlignment::new(
            "Трасса-В1",
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(70.0, 0.0),
                Point2::new(70.0, 30.0),
            ],
        )
        .unwrap();
        let view = view("В1-профиль", "В1-сеть");
        let turns = alignment.turns();
        let mut sink = RecordingSink::new();

        let outcome = annotate_view(
            &job(&view, &alignment, &turns),
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        );

        assert_eq!(outcome.category, Some(ProfileCategory::PressureWater));
        assert!(matches!(
            outcome.status,
            ViewStatus::Annotated { turn_markers: 1, .. }
        ));
        let record = &sink.committed()[0];
        assert_eq!(record.placed.len(), 3);
        assert_eq!(record.placed[2].plan.name, turn_block_name("Трасса-В1"));
        // Turn row sits 70 below the view insertion.
        assert_eq!(record.placed[2].origin, Point2::new(1000.0, 430.0));
        assert_eq!(record.placed[0].origin, Point2::new(1000.0, 447.5));
        // Pressure rows are never station-shifted.
        assert!(matches!(
            record.placed[0].plan.instructions[0],
            Instruction::Line {
                from: Point2 { x: 0.0, .. },
                ..
            }
        ));
    }

    #[test]
    fn unrecognized_view_fails_without_touching_the_sink() {
        let (records, adjacency, alignment) = storm_scene();
        let view = view("Т1-теплосеть", "К2-сеть");
        let mut sink = RecordingSink::new();

        let outcome = annotate_view(
            &job(&view, &alignment, &[]),
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        );

        assert_eq!(outcome.category, None);
        assert!(matches!(outcome.status, ViewStatus::Failed { .. }));
        assert!(sink.committed().is_empty());
        assert!(sink.rolled_back().is_empty());
        assert!(sink.is_idle());
    }

    #[test]
    fn view_without_a_seed_pipe_is_skipped() {
        let (records, adjacency, _) = storm_scene();
        // Alignment starting far from any pipe endpoint.
        let alignment = PolylineAlignment::new(
            "Трасса-К2",
            vec![Point2::new(500.0, 500.0), Point2::new(600.0, 500.0)],
        )
        .unwrap();
        let view = view("К2-профиль", "К2-сеть");
        let mut sink = RecordingSink::new();

        let outcome = annotate_view(
            &job(&view, &alignment, &[]),
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        );

        assert!(matches!(
            outcome.status,
            ViewStatus::Skipped { ref reason } if reason.contains("alignment start")
        ));
        assert!(sink.committed().is_empty());
        assert!(sink.is_idle());
    }

    #[test]
    fn sink_failure_rolls_the_view_back() {
        /// Rejects placements once the budget runs out.
        struct FlakySink {
            inner: RecordingSink,
            placements_left: usize,
        }

        impl DrawingSink for FlakySink {
            fn begin(&mut self, view: &str) -> Result<(), SinkError> {
                self.inner.begin(view)
            }

            fn erase_blocks(&mut self, names: &[String]) -> Result<(), SinkError> {
                self.inner.erase_blocks(names)
            }

            fn place_block(&mut self, plan: &BlockPlan, origin: Point2) -> Result<(), SinkError> {
                if self.placements_left == 0 {
                    return Err(SinkError::new("out of space"));
                }
                self.placements_left -= 1;
                self.inner.place_block(plan, origin)
            }

            fn commit(&mut self) -> Result<(), SinkError> {
                self.inner.commit()
            }

            fn rollback(&mut self) -> Result<(), SinkError> {
                self.inner.rollback()
            }
        }

        let (records, adjacency, alignment) = storm_scene();
        let view = view("К2-профиль", "К2-сеть");
        let mut sink = FlakySink {
            inner: RecordingSink::new(),
            placements_left: 1,
        };

        let outcome = annotate_view(
            &job(&view, &alignment, &[]),
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        );

        assert!(matches!(
            outcome.status,
            ViewStatus::Failed { ref reason } if reason.contains("out of space")
        ));
        assert!(sink.inner.committed().is_empty());
        assert_eq!(sink.inner.rolled_back().len(), 1);
    }

    // --- annotate_batch tests ---

    #[test]
    fn empty_selection_is_the_only_batch_error() {
        let (records, adjacency, _) = storm_scene();
        let mut sink = RecordingSink::new();
        let jobs: Vec<ViewJob<'_, PolylineAlignment>> = Vec::new();

        let err = annotate_batch(
            &jobs,
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        )
        .unwrap_err();
        assert!(matches!(err, AnnotateError::SelectionEmpty));
    }

    #[test]
    fn batch_continues_past_a_failing_view() {
        let (records, adjacency, alignment) = storm_scene();
        let bad = view("Т1-теплосеть", "К2-сеть");
        let good = view("К2-профиль", "К2-сеть");
        let turns: Vec<AlignmentTurn> = Vec::new();
        let jobs = vec![
            job(&bad, &alignment, &turns),
            job(&good, &alignment, &turns),
        ];
        let mut sink = RecordingSink::new();

        let report = annotate_batch(
            &jobs,
            &records,
            &adjacency,
            &AnnotateConfig::default(),
            &mut sink,
            &FixedClock,
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.annotated(), 1);
        // The failing view never opened a transaction; the good one
        // committed.
        assert_eq!(sink.committed().len(), 1);
        assert_eq!(sink.committed()[0].view, "К2-профиль");
    }
}
