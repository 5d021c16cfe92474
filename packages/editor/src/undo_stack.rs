//! # Undo/Redo Stack
//!
//! In-session history of the mutation registry.
//!
//! ## Design
//!
//! - The registry list is immutable, so an entry is just the snapshot before
//!   and after a change
//! - Undo reinstalls `before`, redo reinstalls `after`; the executor then
//!   reconciles the page against whichever list is current
//! - Recording a new change clears the redo stack
//! - Batches group several registry changes into one undo step

use crate::mutations::DeclarativeMutation;
use std::rc::Rc;

type Snapshot = Rc<[DeclarativeMutation]>;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub before: Snapshot,
    pub after: Snapshot,
    pub description: Option<String>,
}

#[derive(Debug)]
struct PendingBatch {
    before: Snapshot,
    description: Option<String>,
}

#[derive(Debug)]
pub struct RegistryHistory {
    /// Most recent last
    undo_stack: Vec<HistoryEntry>,

    /// Most recent last
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,

    current_batch: Option<PendingBatch>,
}

impl RegistryHistory {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record one registry change. Inside a batch this is a no-op; the batch
    /// records the whole span when it ends.
    pub fn record(&mut self, before: Snapshot, after: Snapshot, description: Option<String>) {
        if self.current_batch.is_some() || Rc::ptr_eq(&before, &after) {
            return;
        }
        self.push_entry(HistoryEntry {
            before,
            after,
            description,
        });
    }

    pub fn begin_batch(&mut self, before: Snapshot) {
        self.current_batch = Some(PendingBatch {
            before,
            description: None,
        });
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    pub fn end_batch(&mut self, after: Snapshot) {
        if let Some(batch) = self.current_batch.take() {
            if !Rc::ptr_eq(&batch.before, &after) {
                self.push_entry(HistoryEntry {
                    before: batch.before,
                    after,
                    description: batch.description,
                });
            }
        }
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Step back; returns the list to reinstall
    pub fn undo(&mut self) -> Option<Snapshot> {
        let entry = self.undo_stack.pop()?;
        let before = Rc::clone(&entry.before);
        self.redo_stack.push(entry);
        Some(before)
    }

    /// Step forward again; returns the list to reinstall
    pub fn redo(&mut self) -> Option<Snapshot> {
        let entry = self.redo_stack.pop()?;
        let after = Rc::clone(&entry.after);
        self.undo_stack.push(entry);
        Some(after)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }
}

impl Default for RegistryHistory {
    fn default() -> Self {
        Self::new()
    }
}
