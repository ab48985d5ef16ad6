//! WASM-target tests for the exported StudyChat handle.
//!
//! Only paths that never reach the network run here, via `wasm-pack test --node`.

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use chat_app::StudyChat;

#[wasm_bindgen_test]
fn study_chat_defaults_without_config() {
    let chat = StudyChat::new(JsValue::UNDEFINED).unwrap();
    assert!(!chat.is_busy());
    assert_eq!(chat.session_id(), None);
    assert_eq!(chat.active_status().unwrap().as_string().as_deref(), Some("idle"));
}

#[wasm_bindgen_test]
fn study_chat_accepts_json_string_config() {
    let json = serde_json::json!({
        "api": { "base_url": "https://study.example.com/api" },
        "feature": { "tool_id": "explain", "subject": { "subject": "Biology" } },
        "log_level": "debug",
    })
    .to_string();
    assert!(StudyChat::new(JsValue::from_str(&json)).is_ok());
}

#[wasm_bindgen_test]
fn study_chat_rejects_malformed_config() {
    assert!(StudyChat::new(JsValue::from_str("{not json")).is_err());
}

#[wasm_bindgen_test]
fn study_chat_rejects_empty_turn() {
    let chat = StudyChat::new(JsValue::NULL).unwrap();
    assert!(chat.send_turn("   ").is_err());
    assert!(!chat.is_busy());

    let transcript = chat.transcript().unwrap();
    assert_eq!(js_sys::Array::from(&transcript).length(), 0);
}

#[wasm_bindgen_test]
fn study_chat_subscribe_and_unsubscribe() {
    let chat = StudyChat::new(JsValue::UNDEFINED).unwrap();
    let callback = js_sys::Function::new_no_args("");
    let id = chat.subscribe(callback);
    assert!(chat.unsubscribe(id));
    assert!(!chat.unsubscribe(id));
}

#[wasm_bindgen_test]
fn study_chat_reset_when_idle() {
    let chat = StudyChat::new(JsValue::UNDEFINED).unwrap();
    assert!(chat.reset());
    assert!(chat.last_completion().unwrap().is_null());
}

#[wasm_bindgen_test]
fn study_chat_applies_configured_log_level() {
    let json = serde_json::json!({ "log_level": "trace" }).to_string();
    StudyChat::new(JsValue::from_str(&json)).unwrap();
    assert_eq!(log::max_level(), log::LevelFilter::Trace);

    let json = serde_json::json!({ "log_level": "warn" }).to_string();
    StudyChat::new(JsValue::from_str(&json)).unwrap();
    assert_eq!(log::max_level(), log::LevelFilter::Warn);
}
