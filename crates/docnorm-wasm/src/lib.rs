//! WebAssembly bindings for docnorm
//!
//! Exposes analyzer sessions to JavaScript hosts. The host pages documents
//! out of its store and feeds them in; the finished schema model comes back
//! as JSON.

use docnorm_core::{analyze_json_lines, CollectionAnalyzer, Error, InferenceConfig};
use std::cell::RefCell;
use std::collections::HashMap;
use wasm_bindgen::prelude::*;

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json_string<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| Error::SerializeError(e.to_string()))
        .map_err(to_js)
}

// ============================================================================
// Session-based analysis
// ============================================================================

thread_local! {
    static SESSIONS: RefCell<HashMap<u32, CollectionAnalyzer>> = RefCell::new(HashMap::new());
    static NEXT_SESSION_ID: RefCell<u32> = const { RefCell::new(1) };
}

fn get_next_id() -> u32 {
    NEXT_SESSION_ID.with(|next_id| {
        let id = *next_id.borrow();
        *next_id.borrow_mut() = id + 1;
        id
    })
}

fn insert_session(analyzer: CollectionAnalyzer) -> u32 {
    let id = get_next_id();
    SESSIONS.with(|sessions| {
        sessions.borrow_mut().insert(id, analyzer);
    });
    id
}

/// Create a new analysis session with default configuration
/// Returns session ID
#[wasm_bindgen]
pub fn docnorm_session_create() -> u32 {
    insert_session(CollectionAnalyzer::new())
}

/// Create an analysis session from a JSON configuration object
#[wasm_bindgen]
pub fn docnorm_session_create_with_config(config_json: &str) -> Result<u32, JsValue> {
    let config = InferenceConfig::from_json_str(config_json).map_err(to_js)?;
    let analyzer = CollectionAnalyzer::with_config(config).map_err(to_js)?;
    Ok(insert_session(analyzer))
}

/// Add one JSON document to a session
///
/// Returns false when the document was skipped as malformed or ignored
/// because the sample cap was reached.
#[wasm_bindgen]
pub fn docnorm_session_add(session_id: u32, document: &[u8]) -> Result<bool, JsValue> {
    SESSIONS.with(|sessions| {
        let mut sessions = sessions.borrow_mut();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| JsValue::from_str("Invalid session ID"))?;

        Ok(session.add_json(document))
    })
}

/// Get session statistics as JSON
#[wasm_bindgen]
pub fn docnorm_session_stats(session_id: u32) -> Result<String, JsValue> {
    SESSIONS.with(|sessions| {
        let sessions = sessions.borrow();
        let session = sessions
            .get(&session_id)
            .ok_or_else(|| JsValue::from_str("Invalid session ID"))?;

        to_json_string(session.stats())
    })
}

/// End a session and return its schema model as JSON
///
/// The session is consumed; its ID is invalid afterwards.
#[wasm_bindgen]
pub fn docnorm_session_finish(session_id: u32) -> Result<String, JsValue> {
    let session = SESSIONS
        .with(|sessions| sessions.borrow_mut().remove(&session_id))
        .ok_or_else(|| JsValue::from_str("Invalid session ID"))?;

    to_json_string(&session.finish())
}

/// Destroy a session without building its model
#[wasm_bindgen]
pub fn docnorm_session_destroy(session_id: u32) -> bool {
    SESSIONS.with(|sessions| sessions.borrow_mut().remove(&session_id).is_some())
}

// ============================================================================
// One-shot analysis
// ============================================================================

/// Analyze newline-delimited JSON with default configuration
#[wasm_bindgen]
pub fn docnorm_analyze(ndjson: &str) -> Result<String, JsValue> {
    let model = analyze_json_lines(ndjson, &InferenceConfig::default()).map_err(to_js)?;
    to_json_string(&model)
}

/// Get library version
#[wasm_bindgen]
pub fn docnorm_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let id = docnorm_session_create();
        assert!(docnorm_session_add(id, br#"{"id": 1, "name": "Ann"}"#).unwrap());
        assert!(docnorm_session_add(id, br#"{"id": 2, "name": "Bo"}"#).unwrap());

        let stats: serde_json::Value =
            serde_json::from_str(&docnorm_session_stats(id).unwrap()).unwrap();
        assert_eq!(stats["documentsProcessed"], 2);
        assert_eq!(stats["schemaVariants"], 1);

        let model: serde_json::Value =
            serde_json::from_str(&docnorm_session_finish(id).unwrap()).unwrap();
        assert_eq!(model["documentsProcessed"], 2);
        assert_eq!(model["schemas"][0]["sampleCount"], 2);

        assert!(!docnorm_session_destroy(id));
    }

    #[test]
    fn test_destroy() {
        let id = docnorm_session_create();
        assert!(docnorm_session_destroy(id));
        assert!(!docnorm_session_destroy(id));
    }

    #[test]
    fn test_analyze_ndjson() {
        let out = docnorm_analyze("{\"a\": 1}\n{\"a\": 2}\n").unwrap();
        let model: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(model["schemas"].as_array().unwrap().len(), 1);
    }
}
