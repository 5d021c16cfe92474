//! # Pagecraft Editor
//!
//! Visual editing of live pages the editor does not own.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ session: host events, modes, timers         │
//! │  - selection tracker + inline edit          │
//! │  - rearrange controller + ghost             │
//! └─────────────────────────────────────────────┘
//!                     ↓ new mutations
//! ┌─────────────────────────────────────────────┐
//! │ registry: ordered mutations + global CSS/JS │
//! │  - history of registry snapshots            │
//! └─────────────────────────────────────────────┘
//!                     ↓ whole list
//! ┌─────────────────────────────────────────────┐
//! │ executor: revert previous pass, apply list  │
//! │ injector: one <style>, one <script>         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ pagecraft-dom: the host's live document     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The registry is the source of truth**: the page is a projection of it
//! 2. **Reconcile, never patch**: every change re-applies the whole list
//! 3. **Targets are selectors**: the page may re-render at any time
//! 4. **Own changes stay silent**: observation is suspended around editor work
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagecraft_dom::Document;
//! use pagecraft_editor::{EditMode, EditSession, EditorConfig, PointerEvent, Variation};
//!
//! let mut doc = Document::parse(host_html);
//! let mut session = EditSession::new(EditorConfig::default(), Variation::default())?;
//! session.start(&mut doc)?;
//! session.set_mode(&mut doc, EditMode::Select)?;
//!
//! // forward capture-phase events from the page
//! let disposition = session.click(&mut doc, PointerEvent::at(target))?;
//!
//! // persist
//! let payload = serde_json::to_string(&session.payload())?;
//! ```

pub mod config;
pub mod debounce;
pub mod errors;
pub mod events;
pub mod executor;
pub mod ghost;
pub mod injector;
pub mod inline_edit;
pub mod mutations;
pub mod observation;
pub mod rearrange;
pub mod registry;
pub mod resolver;
pub mod selection;
pub mod session;
pub mod undo_stack;

#[cfg(test)]
mod tests_executor;

#[cfg(test)]
mod tests_session;

pub use config::EditorConfig;
pub use debounce::Debouncer;
pub use errors::{EditorError, EditorResult};
pub use events::{EventDisposition, Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use executor::{apply_mutations, ApplyOutcome, MutationExecutor, RevertHandle, RevertReport, RevertStep};
pub use ghost::Ghost;
pub use injector::{GlobalInjector, NoopScriptRunner, ScriptError, ScriptRunner};
pub use inline_edit::{InlineEditController, InlineOutcome};
pub use mutations::{
    DeclarativeMutation, MutationAction, MutationKind, PositionTarget, Variation, VariationPayload,
};
pub use observation::{silently, Observation, SuspendGuard};
pub use rearrange::{ContainerFlow, DropPlan, Edge, Flow, RearrangeController, RearrangeSnapshot};
pub use registry::MutationRegistry;
pub use resolver::{ResolveOptions, SelectorResolver};
pub use selection::{SelectionSnapshot, SelectionState, SelectionTracker};
pub use session::{EditMode, EditSession};
pub use undo_stack::{HistoryEntry, RegistryHistory};
