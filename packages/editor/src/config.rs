use crate::errors::{EditorError, EditorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Editor configuration.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Marks the element under the pointer
    #[serde(default = "default_hover_attribute")]
    pub hover_attribute: String,

    /// Marks the selected element
    #[serde(default = "default_selected_attribute")]
    pub selected_attribute: String,

    /// Marks the element being edited inline
    #[serde(default = "default_editing_attribute")]
    pub editing_attribute: String,

    /// Carries the highlighted edge (`left`, `top`, ...) during a drag
    #[serde(default = "default_drop_edge_attribute")]
    pub drop_edge_attribute: String,

    /// Tags the injected global `<style>` element
    #[serde(default = "default_css_marker_attribute")]
    pub css_marker_attribute: String,

    /// Tags the injected global `<script>` element
    #[serde(default = "default_js_marker_attribute")]
    pub js_marker_attribute: String,

    /// Tags the drag ghost
    #[serde(default = "default_ghost_attribute")]
    pub ghost_attribute: String,

    /// Temporary class placed on the dragged element
    #[serde(default = "default_rearrange_class")]
    pub rearrange_class: String,

    /// Classes with this prefix belong to the editor and never appear in selectors
    #[serde(default = "default_engine_class_prefix")]
    pub engine_class_prefix: String,

    #[serde(default = "default_ghost_opacity")]
    pub ghost_opacity: f64,

    #[serde(default = "default_css_commit_debounce_ms")]
    pub css_commit_debounce_ms: u64,

    #[serde(default = "default_resync_debounce_ms")]
    pub resync_debounce_ms: u64,

    /// Undo levels kept (0 = unlimited)
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Leave class names out of generated selectors
    #[serde(default)]
    pub ignore_class_names: bool,
}

fn default_hover_attribute() -> String {
    "data-pagecraft-hover".to_string()
}

fn default_selected_attribute() -> String {
    "data-pagecraft-selected".to_string()
}

fn default_editing_attribute() -> String {
    "data-pagecraft-editing".to_string()
}

fn default_drop_edge_attribute() -> String {
    "data-pagecraft-drop-edge".to_string()
}

fn default_css_marker_attribute() -> String {
    "data-pagecraft-global-css".to_string()
}

fn default_js_marker_attribute() -> String {
    "data-pagecraft-global-js".to_string()
}

fn default_ghost_attribute() -> String {
    "data-pagecraft-ghost".to_string()
}

fn default_rearrange_class() -> String {
    "pagecraft-rearrange-target".to_string()
}

fn default_engine_class_prefix() -> String {
    "pagecraft-".to_string()
}

fn default_ghost_opacity() -> f64 {
    0.5
}

fn default_css_commit_debounce_ms() -> u64 {
    500
}

fn default_resync_debounce_ms() -> u64 {
    100
}

fn default_history_depth() -> usize {
    100
}

impl EditorConfig {
    pub fn from_json(json: &str) -> EditorResult<Self> {
        let config: EditorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if !(0.0..=1.0).contains(&self.ghost_opacity) {
            return Err(EditorError::Config(format!(
                "ghostOpacity must be between 0 and 1, got {}",
                self.ghost_opacity
            )));
        }

        for (field, value) in [
            ("hoverAttribute", &self.hover_attribute),
            ("selectedAttribute", &self.selected_attribute),
            ("editingAttribute", &self.editing_attribute),
            ("dropEdgeAttribute", &self.drop_edge_attribute),
            ("cssMarkerAttribute", &self.css_marker_attribute),
            ("jsMarkerAttribute", &self.js_marker_attribute),
            ("ghostAttribute", &self.ghost_attribute),
            ("rearrangeClass", &self.rearrange_class),
        ] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                return Err(EditorError::Config(format!(
                    "{} must be a non-empty name without whitespace",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Attributes the editor writes on host elements
    pub fn reserved_attributes(&self) -> [&str; 7] {
        [
            &self.hover_attribute,
            &self.selected_attribute,
            &self.editing_attribute,
            &self.drop_edge_attribute,
            &self.css_marker_attribute,
            &self.js_marker_attribute,
            &self.ghost_attribute,
        ]
    }

    pub fn is_engine_class(&self, class: &str) -> bool {
        class == self.rearrange_class
            || (!self.engine_class_prefix.is_empty() && class.starts_with(&self.engine_class_prefix))
    }

    pub fn css_commit_delay(&self) -> Duration {
        Duration::from_millis(self.css_commit_debounce_ms)
    }

    pub fn resync_delay(&self) -> Duration {
        Duration::from_millis(self.resync_debounce_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hover_attribute: default_hover_attribute(),
            selected_attribute: default_selected_attribute(),
            editing_attribute: default_editing_attribute(),
            drop_edge_attribute: default_drop_edge_attribute(),
            css_marker_attribute: default_css_marker_attribute(),
            js_marker_attribute: default_js_marker_attribute(),
            ghost_attribute: default_ghost_attribute(),
            rearrange_class: default_rearrange_class(),
            engine_class_prefix: default_engine_class_prefix(),
            ghost_opacity: default_ghost_opacity(),
            css_commit_debounce_ms: default_css_commit_debounce_ms(),
            resync_debounce_ms: default_resync_debounce_ms(),
            history_depth: default_history_depth(),
            ignore_class_names: false,
        }
    }
}
