//! Browser-side tests for the bindings

#![cfg(target_arch = "wasm32")]

use docnorm_wasm::*;
use wasm_bindgen_test::*;

#[wasm_bindgen_test]
fn unknown_session_is_an_error() {
    assert!(docnorm_session_add(u32::MAX, b"{}").is_err());
    assert!(docnorm_session_stats(u32::MAX).is_err());
    assert!(docnorm_session_finish(u32::MAX).is_err());
}

#[wasm_bindgen_test]
fn invalid_config_is_rejected() {
    assert!(docnorm_session_create_with_config(r#"{"max_documents": 0}"#).is_err());
    assert!(docnorm_session_create_with_config("not json").is_err());
}

#[wasm_bindgen_test]
fn configured_session_respects_cap() {
    let id = docnorm_session_create_with_config(r#"{"max_documents": 1}"#).unwrap();
    assert!(docnorm_session_add(id, br#"{"a": 1}"#).unwrap());
    assert!(!docnorm_session_add(id, br#"{"a": 2}"#).unwrap());

    let model = docnorm_session_finish(id).unwrap();
    assert!(model.contains(r#""documentsProcessed":1"#));
}

#[wasm_bindgen_test]
fn malformed_document_is_skipped() {
    let id = docnorm_session_create();
    assert!(!docnorm_session_add(id, b"{broken").unwrap());
    assert!(docnorm_session_stats(id).unwrap().contains(r#""documentsSkipped":1"#));
    assert!(docnorm_session_destroy(id));
}
