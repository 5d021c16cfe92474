use pagecraft_dom::Document;
use pagecraft_editor::{
    apply_mutations, DeclarativeMutation, EditorConfig, EditorResult, GlobalInjector, NoopScriptRunner,
    Variation,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Outcome of replaying a variation on a page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    pub html: String,
    /// DOM changes made by the mutations, not counting global CSS/JS
    pub steps: usize,
}

/// Full documents come back whole; fragments come back as fragments
fn serialize(doc: &Document, source: &str) -> String {
    let full_document = source.to_ascii_lowercase().contains("<html");
    match doc.body() {
        Some(body) if !full_document => doc.inner_html(body),
        _ => doc.inner_html(doc.root()),
    }
}

/// Apply a JSON mutation list to `html`
pub fn apply_to_html(html: &str, mutations_json: &str) -> EditorResult<String> {
    let mutations: Vec<DeclarativeMutation> = serde_json::from_str(mutations_json)?;
    let mut doc = Document::parse(html);
    let _handle = apply_mutations(&mut doc, &mutations);
    Ok(serialize(&doc, html))
}

/// Apply a whole variation, global CSS and JS included, to `html`.
///
/// Scripts are mounted but not run.
pub fn replay_variation(html: &str, variation_json: &str) -> EditorResult<ReplayResult> {
    let variation: Variation = serde_json::from_str(variation_json)?;
    let mut doc = Document::parse(html);
    let handle = apply_mutations(&mut doc, &variation.dom_mutations);

    let mut injector = GlobalInjector::new(&EditorConfig::default());
    injector.set_css(&mut doc, &variation.css)?;
    injector.set_js(&mut doc, &variation.js, &mut NoopScriptRunner, &mut |_| {})?;

    Ok(ReplayResult {
        html: serialize(&doc, html),
        steps: handle.len(),
    })
}

/// Parse and re-serialize a variation, filling defaults and dropping unknown fields
pub fn normalize(variation_json: &str) -> EditorResult<String> {
    let variation: Variation = serde_json::from_str(variation_json)?;
    Ok(serde_json::to_string(&variation)?)
}

/// The API payload for a variation
pub fn payload(variation_json: &str) -> EditorResult<String> {
    let variation: Variation = serde_json::from_str(variation_json)?;
    Ok(serde_json::to_string(&variation.to_payload())?)
}

/// Apply a JSON mutation list to an HTML string
#[wasm_bindgen(js_name = applyMutations)]
pub fn apply_mutations_js(html: &str, mutations_json: &str) -> Result<String, JsValue> {
    apply_to_html(html, mutations_json).map_err(|e| JsValue::from_str(&format!("Apply error: {}", e)))
}

/// Replay a variation and return `{html, steps}` as JSON
#[wasm_bindgen(js_name = replayVariation)]
pub fn replay_variation_js(html: &str, variation_json: &str) -> Result<String, JsValue> {
    let result = replay_variation(html, variation_json)
        .map_err(|e| JsValue::from_str(&format!("Replay error: {}", e)))?;

    serde_json::to_string(&result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen(js_name = normalizeVariation)]
pub fn normalize_variation_js(variation_json: &str) -> Result<String, JsValue> {
    normalize(variation_json).map_err(|e| JsValue::from_str(&format!("Variation error: {}", e)))
}

#[wasm_bindgen(js_name = variationPayload)]
pub fn variation_payload_js(variation_json: &str) -> Result<String, JsValue> {
    payload(variation_json).map_err(|e| JsValue::from_str(&format!("Variation error: {}", e)))
}
