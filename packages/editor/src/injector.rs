//! # Global Style/Script Injector
//!
//! Mirrors the variation's page-wide CSS and JS into the document as one
//! tagged `<style>` and one tagged `<script>` element. Changing a field
//! removes the old element before mounting the new one; an empty field
//! unmounts it.
//!
//! Script execution belongs to the host, behind [`ScriptRunner`]. Errors
//! it reports go to a caller-supplied sink and never into editor state.

use crate::config::EditorConfig;
use crate::errors::EditorResult;
use crate::observation::silently;
use pagecraft_dom::{Document, NodeId};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Script error: {message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes injected script source on the host page
pub trait ScriptRunner {
    fn run(&mut self, source: &str) -> Result<(), ScriptError>;
}

/// For hosts that execute `<script>` elements themselves
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScriptRunner;

impl ScriptRunner for NoopScriptRunner {
    fn run(&mut self, _source: &str) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// Guard the host page against exceptions thrown by injected code.
///
/// `</` is written as `<\/` so the source cannot close its own `<script>`.
pub fn wrap_script(js: &str) -> String {
    format!(
        "try {{\n{}\n}} catch (e) {{\n  console.error(e);\n}}",
        js.replace("</", "<\\/")
    )
}

#[derive(Debug, Clone)]
pub struct GlobalInjector {
    css_marker: String,
    js_marker: String,
    style: Option<NodeId>,
    script: Option<NodeId>,
    css: String,
    js: String,
}

impl GlobalInjector {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            css_marker: config.css_marker_attribute.clone(),
            js_marker: config.js_marker_attribute.clone(),
            style: None,
            script: None,
            css: String::new(),
            js: String::new(),
        }
    }

    /// Returns whether the page changed
    pub fn set_css(&mut self, doc: &mut Document, css: &str) -> EditorResult<bool> {
        if self.is_current(doc, self.style, &self.css, css) {
            return Ok(false);
        }

        let marker = self.css_marker.clone();
        let style = silently(doc, |doc| -> EditorResult<Option<NodeId>> {
            unmount(doc, self.style.take())?;
            if css.trim().is_empty() {
                return Ok(None);
            }
            let parent = doc.head().or_else(|| doc.body()).unwrap_or_else(|| doc.root());
            mount(doc, parent, "style", &marker, css).map(Some)
        })?;

        debug!(bytes = css.len(), mounted = style.is_some(), "global CSS updated");
        self.style = style;
        self.css = css.to_string();
        Ok(true)
    }

    /// Returns whether the page changed. Runner errors go to `sink`.
    pub fn set_js(
        &mut self,
        doc: &mut Document,
        js: &str,
        runner: &mut dyn ScriptRunner,
        sink: &mut dyn FnMut(ScriptError),
    ) -> EditorResult<bool> {
        if self.is_current(doc, self.script, &self.js, js) {
            return Ok(false);
        }

        let marker = self.js_marker.clone();
        let wrapped = wrap_script(js);
        let script = silently(doc, |doc| -> EditorResult<Option<NodeId>> {
            unmount(doc, self.script.take())?;
            if js.trim().is_empty() {
                return Ok(None);
            }
            let parent = doc.body().unwrap_or_else(|| doc.root());
            mount(doc, parent, "script", &marker, &wrapped).map(Some)
        })?;

        self.script = script;
        self.js = js.to_string();

        if script.is_some() {
            if let Err(e) = runner.run(&wrapped) {
                warn!(error = %e, "injected script failed");
                sink(e);
            }
        }
        Ok(true)
    }

    pub fn clear(&mut self, doc: &mut Document) -> EditorResult<()> {
        let (style, script) = (self.style.take(), self.script.take());
        silently(doc, |doc| -> EditorResult<()> {
            unmount(doc, style)?;
            unmount(doc, script)
        })?;
        self.css.clear();
        self.js.clear();
        Ok(())
    }

    pub fn style_element(&self) -> Option<NodeId> {
        self.style
    }

    pub fn script_element(&self) -> Option<NodeId> {
        self.script
    }

    /// Whether `node` is, or lies inside, an injected element
    pub fn is_injected(&self, doc: &Document, node: NodeId) -> bool {
        [self.style, self.script]
            .into_iter()
            .flatten()
            .any(|injected| doc.contains(injected, node))
    }

    fn is_current(&self, doc: &Document, mounted: Option<NodeId>, current: &str, next: &str) -> bool {
        if current != next {
            return false;
        }
        match mounted {
            Some(node) => doc.is_connected(node),
            None => next.trim().is_empty(),
        }
    }
}

fn mount(doc: &mut Document, parent: NodeId, tag: &str, marker: &str, text: &str) -> EditorResult<NodeId> {
    let element = doc.create_element(tag);
    doc.set_attribute(element, marker, "")?;
    let content = doc.create_text(text);
    doc.append_child(element, content)?;
    doc.append_child(parent, element)?;
    Ok(element)
}

fn unmount(doc: &mut Document, element: Option<NodeId>) -> EditorResult<()> {
    if let Some(element) = element {
        doc.detach(element)?;
    }
    Ok(())
}
