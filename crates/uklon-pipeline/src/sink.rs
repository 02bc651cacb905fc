//! Transactional drawing sink.
//!
//! The annotation pipeline never draws directly: it computes
//! [`BlockPlan`]s and hands them to a [`DrawingSink`] together with
//! placement origins. Every mutation for one profile view happens
//! between [`begin`](DrawingSink::begin) and
//! [`commit`](DrawingSink::commit); a failure mid-view triggers
//! [`rollback`](DrawingSink::rollback), which must leave no partial
//! annotation state, including previously erased blocks.
//!
//! [`RecordingSink`] is the in-memory reference implementation used by
//! tests and dry runs; `uklon-export` provides an SVG-rendering sink.

use thiserror::Error;

use crate::types::{BlockPlan, PlacedBlock, Point2};

/// Failure reported by a [`DrawingSink`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SinkError {
    message: String,
}

impl SinkError {
    /// Wrap an implementation-defined failure description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Destination for computed annotation blocks.
///
/// Implementations are transactional per profile view: [`begin`]
/// opens a view-scoped transaction, [`erase_blocks`] and
/// [`place_block`] stage mutations inside it, and [`commit`] makes
/// them durable. [`rollback`] discards everything staged since
/// [`begin`], restoring erased blocks.
///
/// [`begin`]: DrawingSink::begin
/// [`erase_blocks`]: DrawingSink::erase_blocks
/// [`place_block`]: DrawingSink::place_block
/// [`commit`]: DrawingSink::commit
/// [`rollback`]: DrawingSink::rollback
pub trait DrawingSink {
    /// Open a transaction scoped to one profile view.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already open or the destination
    /// cannot accept a new view.
    fn begin(&mut self, view: &str) -> Result<(), SinkError>;

    /// Remove previously drawn blocks (and all their placed instances)
    /// by name. Absent names are a no-op; erasing twice is harmless.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open or the destination rejects the
    /// removal.
    fn erase_blocks(&mut self, names: &[String]) -> Result<(), SinkError>;

    /// Stage a block's instruction list at a placement origin.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open or the destination rejects the
    /// block.
    fn place_block(&mut self, plan: &BlockPlan, origin: Point2) -> Result<(), SinkError>;

    /// Make the staged mutations durable and close the transaction.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open or the destination cannot
    /// persist the staged state.
    fn commit(&mut self) -> Result<(), SinkError>;

    /// Discard everything staged since [`begin`](DrawingSink::begin)
    /// and close the transaction.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open.
    fn rollback(&mut self) -> Result<(), SinkError>;
}

/// Everything one profile view's transaction staged.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedView {
    /// Profile view name passed to `begin`.
    pub view: String,
    /// Block names erased, in call order.
    pub erased: Vec<String>,
    /// Blocks placed, in call order.
    pub placed: Vec<PlacedBlock>,
}

impl RecordedView {
    fn new(view: &str) -> Self {
        Self {
            view: view.to_owned(),
            erased: Vec::new(),
            placed: Vec::new(),
        }
    }
}

/// In-memory [`DrawingSink`] that records every call.
///
/// Committed and rolled-back transactions are kept separately so
/// tests can assert both what was drawn and what was discarded.
#[derive(Debug, Default)]
pub struct RecordingSink {
    active: Option<RecordedView>,
    committed: Vec<RecordedView>,
    rolled_back: Vec<RecordedView>,
}

impl RecordingSink {
    /// An empty sink with no open transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> &[RecordedView] {
        &self.committed
    }

    /// Transactions rolled back so far, in rollback order.
    #[must_use]
    pub fn rolled_back(&self) -> &[RecordedView] {
        &self.rolled_back
    }

    /// Whether no transaction is currently open.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.active.is_none()
    }

    fn active_mut(&mut self) -> Result<&mut RecordedView, SinkError> {
        self.active
            .as_mut()
            .ok_or_else(|| SinkError::new("no open view transaction"))
    }
}

impl DrawingSink for RecordingSink {
    fn begin(&mut self, view: &str) -> Result<(), SinkError> {
        if self.active.is_some() {
            return Err(SinkError::new("a view transaction is already open"));
        }
        self.active = Some(RecordedView::new(view));
        Ok(())
    }

    fn erase_blocks(&mut self, names: &[String]) -> Result<(), SinkError> {
        let record = self.active_mut()?;
        record.erased.extend_from_slice(names);
        Ok(())
    }

    fn place_block(&mut self, plan: &BlockPlan, origin: Point2) -> Result<(), SinkError> {
        let record = self.active_mut()?;
        record.placed.push(PlacedBlock {
            plan: plan.clone(),
            origin,
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        let record = self
            .active
            .take()
            .ok_or_else(|| SinkError::new("no open view transaction"))?;
        self.committed.push(record);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), SinkError> {
        let record = self
            .active
            .take()
            .ok_or_else(|| SinkError::new("no open view transaction"))?;
        self.rolled_back.push(record);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Instruction;

    fn plan(name: &str) -> BlockPlan {
        BlockPlan {
            name: name.to_owned(),
            instructions: vec![Instruction::line(
                Point2::new(0.0, 0.0),
                Point2::new(0.0, 5.0),
            )],
        }
    }

    // --- transaction lifecycle tests ---

    #[test]
    fn commit_preserves_call_order() {
        let mut sink = RecordingSink::new();
        sink.begin("К2-профиль").unwrap();
        sink.erase_blocks(&["а".to_owned(), "б".to_owned()]).unwrap();
        sink.place_block(&plan("б"), Point2::new(10.0, 20.0)).unwrap();
        sink.place_block(&plan("а"), Point2::new(10.0, 35.0)).unwrap();
        sink.commit().unwrap();

        assert!(sink.is_idle());
        assert_eq!(sink.committed().len(), 1);
        assert!(sink.rolled_back().is_empty());
        let record = &sink.committed()[0];
        assert_eq!(record.view, "К2-профиль");
        assert_eq!(record.erased, ["а", "б"]);
        assert_eq!(record.placed[0].plan.name, "б");
        assert_eq!(record.placed[1].plan.name, "а");
        assert_eq!(record.placed[1].origin, Point2::new(10.0, 35.0));
    }

    #[test]
    fn rollback_discards_staged_work() {
        let mut sink = RecordingSink::new();
        sink.begin("В1-профиль").unwrap();
        sink.erase_blocks(&["а".to_owned()]).unwrap();
        sink.place_block(&plan("а"), Point2::new(0.0, 0.0)).unwrap();
        sink.rollback().unwrap();

        assert!(sink.is_idle());
        assert!(sink.committed().is_empty());
        assert_eq!(sink.rolled_back().len(), 1);
        assert_eq!(sink.rolled_back()[0].view, "В1-профиль");
    }

    #[test]
    fn sequential_views_commit_in_order() {
        let mut sink = RecordingSink::new();
        for view in ["первый", "второй"] {
            sink.begin(view).unwrap();
            sink.place_block(&plan("б"), Point2::new(0.0, 0.0)).unwrap();
            sink.commit().unwrap();
        }
        let views: Vec<&str> = sink.committed().iter().map(|r| r.view.as_str()).collect();
        assert_eq!(views, ["первый", "второй"]);
    }

    // --- misuse tests ---

    #[test]
    fn begin_twice_is_rejected() {
        let mut sink = RecordingSink::new();
        sink.begin("в").unwrap();
        assert!(sink.begin("г").is_err());
    }

    #[test]
    fn mutations_outside_a_transaction_are_rejected() {
        let mut sink = RecordingSink::new();
        assert!(sink.erase_blocks(&["а".to_owned()]).is_err());
        assert!(sink.place_block(&plan("а"), Point2::new(0.0, 0.0)).is_err());
        assert!(sink.commit().is_err());
        assert!(sink.rollback().is_err());
    }

    #[test]
    fn error_message_is_surfaced() {
        let err = SinkError::new("disk full");
        assert_eq!(err.to_string(), "disk full");
    }
}
