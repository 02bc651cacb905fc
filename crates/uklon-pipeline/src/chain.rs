//! Chain reconstruction: order an unordered, graph-connected set of
//! pipe records into a single directed path.
//!
//! Each record only knows its own endpoints and the structures it
//! connects to. The builder finds the record touching the alignment
//! start (the seed), then repeatedly asks the adjacency provider which
//! pipe names hang off the current tail structure and appends the one
//! pending record among them, flagging it reversed when it points
//! backward.
//!
//! Records are never mutated: orientation lives in [`ChainLink`], a
//! borrowed view that swaps the endpoint accessors and negates the
//! slope when flagged. Malformed inputs (stalled walk, cyclic
//! adjacency, inconsistent structure references) fail the profile view
//! rather than looping or guessing; a structure connecting to more
//! than one pending pipe is ambiguous and also fatal.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{AnnotateError, PipeRecord, Point2, Point3};

/// Adjacency query against the network's structures (manholes or
/// fittings): which pipe names are currently connected to a structure.
pub trait PipeAdjacency {
    /// Pipe names connected to `structure`, or `None` if the structure
    /// is unknown.
    fn connected_pipe_names(&self, structure: &str) -> Option<&BTreeSet<String>>;
}

impl PipeAdjacency for BTreeMap<String, BTreeSet<String>> {
    fn connected_pipe_names(&self, structure: &str) -> Option<&BTreeSet<String>> {
        self.get(structure)
    }
}

/// A pipe record viewed in chain orientation.
///
/// When `reversed`, the start/end accessors swap ends and the slope is
/// negated; the underlying record is untouched. Identity, size label,
/// length, and diameter are orientation-independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainLink<'a> {
    record: &'a PipeRecord,
    reversed: bool,
}

impl<'a> ChainLink<'a> {
    /// View a record in its drawn direction.
    #[must_use]
    pub const fn forward(record: &'a PipeRecord) -> Self {
        Self {
            record,
            reversed: false,
        }
    }

    /// View a record flowing against its drawn direction.
    #[must_use]
    pub const fn reversed(record: &'a PipeRecord) -> Self {
        Self {
            record,
            reversed: true,
        }
    }

    /// The same record viewed in the opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        Self {
            record: self.record,
            reversed: !self.reversed,
        }
    }

    /// The underlying record.
    #[must_use]
    pub const fn record(&self) -> &'a PipeRecord {
        self.record
    }

    /// Whether this link runs against the record's drawn direction.
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Pipe name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.record.name
    }

    /// Nominal size/type descriptor.
    #[must_use]
    pub fn size_label(&self) -> &'a str {
        &self.record.size_label
    }

    /// Endpoint on the alignment-start side.
    #[must_use]
    pub const fn start(&self) -> Point3 {
        if self.reversed {
            self.record.end
        } else {
            self.record.start
        }
    }

    /// Endpoint on the alignment-end side.
    #[must_use]
    pub const fn end(&self) -> Point3 {
        if self.reversed {
            self.record.start
        } else {
            self.record.end
        }
    }

    /// Structure name on the alignment-start side.
    #[must_use]
    pub fn start_structure(&self) -> &'a str {
        if self.reversed {
            &self.record.end_structure
        } else {
            &self.record.start_structure
        }
    }

    /// Structure name on the alignment-end side.
    #[must_use]
    pub fn end_structure(&self) -> &'a str {
        if self.reversed {
            &self.record.start_structure
        } else {
            &self.record.end_structure
        }
    }

    /// Signed slope in chain orientation.
    #[must_use]
    pub const fn slope(&self) -> f64 {
        if self.reversed {
            -self.record.slope
        } else {
            self.record.slope
        }
    }

    /// Plan length (orientation-independent).
    #[must_use]
    pub const fn length_2d(&self) -> f64 {
        self.record.length_2d
    }

    /// Continuity diameter (orientation-independent).
    #[must_use]
    pub const fn diameter(&self) -> f64 {
        self.record.diameter
    }

    /// Invert (bottom interior) elevation at the start end.
    #[must_use]
    pub fn start_invert(&self) -> f64 {
        self.start().z - self.record.diameter / 2.0
    }

    /// Crown (top interior) elevation at the start end.
    #[must_use]
    pub fn start_crown(&self) -> f64 {
        self.start().z + self.record.diameter / 2.0
    }

    /// Invert elevation at the end end.
    #[must_use]
    pub fn end_invert(&self) -> f64 {
        self.end().z - self.record.diameter / 2.0
    }

    /// Crown elevation at the end end.
    #[must_use]
    pub fn end_crown(&self) -> f64 {
        self.end().z + self.record.diameter / 2.0
    }
}

/// The reconstructed, ordered, directionally-consistent path of pipe
/// records from alignment start to end.
///
/// Invariants, guaranteed by [`build_chain`]: `links[0].start()`
/// coincides with the alignment start within plan rounding tolerance,
/// and every `links[i].start_structure()` equals
/// `links[i-1].end_structure()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain<'a> {
    links: Vec<ChainLink<'a>>,
}

impl<'a> Chain<'a> {
    /// The ordered links.
    #[must_use]
    pub fn links(&self) -> &[ChainLink<'a>] {
        &self.links
    }

    /// Number of links; at least 1 for a built chain.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain has no links. Never true for a built chain.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Reconstruct the ordered chain from a filtered record set.
///
/// `alignment_start` is the alignment's defined start point; the seed
/// is the record with an endpoint there (3-decimal plan tolerance).
///
/// # Errors
///
/// - [`AnnotateError::NoSeedPipe`] if no record touches the alignment
///   start.
/// - [`AnnotateError::DisconnectedNetwork`] if the walk stalls with
///   records still pending, if the adjacency loops back into the
///   chain, or if a claimed connection contradicts the record's own
///   structure references.
/// - [`AnnotateError::BranchingNetwork`] if more than one pending
///   record is adjacent to the tail structure.
pub fn build_chain<'a, A>(
    records: &[&'a PipeRecord],
    alignment_start: Point2,
    adjacency: &A,
) -> Result<Chain<'a>, AnnotateError>
where
    A: PipeAdjacency + ?Sized,
{
    let mut pending: Vec<&'a PipeRecord> = records.to_vec();

    // 1. Seed: the record with an endpoint at the alignment start.
    let seed_index = pending
        .iter()
        .position(|record| {
            record.start.plan().coincides(alignment_start)
                || record.end.plan().coincides(alignment_start)
        })
        .ok_or(AnnotateError::NoSeedPipe)?;
    let seed = pending.remove(seed_index);
    let seed_link = if seed.start.plan().coincides(alignment_start) {
        ChainLink::forward(seed)
    } else {
        ChainLink::reversed(seed)
    };

    let mut visited: BTreeSet<&'a str> = BTreeSet::new();
    visited.insert(seed_link.name());
    let mut arrived_through = seed_link.name();
    let mut tail_structure = seed_link.end_structure().to_owned();
    let mut links = vec![seed_link];

    // 2. Extension: follow structure adjacency until nothing is pending.
    while !pending.is_empty() {
        let Some(connected) = adjacency.connected_pipe_names(&tail_structure) else {
            return Err(AnnotateError::DisconnectedNetwork {
                structure: tail_structure,
                remaining: pending.len(),
            });
        };

        // Cycle guard: a connected name that is already chained and is
        // not the pipe we arrived through means the adjacency loops
        // back into the chain.
        if connected
            .iter()
            .any(|name| name != arrived_through && visited.contains(name.as_str()))
        {
            return Err(AnnotateError::DisconnectedNetwork {
                structure: tail_structure,
                remaining: pending.len(),
            });
        }

        let candidate_indices: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, record)| connected.contains(record.name.as_str()))
            .map(|(index, _)| index)
            .collect();

        let index = match candidate_indices.as_slice() {
            [] => {
                return Err(AnnotateError::DisconnectedNetwork {
                    structure: tail_structure,
                    remaining: pending.len(),
                });
            }
            [index] => *index,
            many => {
                let mut candidates: Vec<String> = many
                    .iter()
                    .map(|&index| pending[index].name.clone())
                    .collect();
                candidates.sort_unstable();
                return Err(AnnotateError::BranchingNetwork {
                    structure: tail_structure,
                    candidates,
                });
            }
        };

        let record = pending.remove(index);
        let link = if record.end_structure == tail_structure {
            ChainLink::reversed(record)
        } else if record.start_structure == tail_structure {
            ChainLink::forward(record)
        } else {
            // The structure claims this pipe but the pipe references
            // neither end to it; the model is inconsistent.
            return Err(AnnotateError::DisconnectedNetwork {
                structure: tail_structure,
                remaining: pending.len() + 1,
            });
        };

        visited.insert(link.name());
        arrived_through = link.name();
        tail_structure = link.end_structure().to_owned();
        links.push(link);
    }

    Ok(Chain { links })
}
