//! Re-entrancy guard for host change notifications.
//!
//! Every DOM change the editor makes itself would otherwise come back as a
//! host notification and trigger another reconcile. Work that changes the
//! document holds a [`SuspendGuard`]; while any guard is alive, observation
//! is suspended. The counter nests, so an apply issued from inside an inline
//! edit cannot end the edit's suspension early.

use pagecraft_dom::Document;
use std::cell::Cell;
use std::rc::Rc;

/// Run `work` and discard the change records it produces.
///
/// Records the host queued beforehand are kept, in order.
pub fn silently<R>(doc: &mut Document, work: impl FnOnce(&mut Document) -> R) -> R {
    let pending = doc.take_records();
    let result = work(doc);
    let own = doc.take_records();
    tracing::trace!(dropped = own.len(), "drained editor-originated records");
    doc.restore_records(pending);
    result
}

#[derive(Debug, Clone, Default)]
pub struct Observation {
    depth: Rc<Cell<usize>>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend(&self) -> SuspendGuard {
        self.depth.set(self.depth.get() + 1);
        SuspendGuard {
            depth: Rc::clone(&self.depth),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

/// Lowers the suspension depth when dropped
#[must_use = "observation resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}
