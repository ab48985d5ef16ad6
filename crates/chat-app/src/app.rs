//! JS-facing chat handle — composes the fetch adapter and the reconciler.

use std::rc::Rc;
use std::str::FromStr;

use gloo_utils::format::JsValueSerdeExt;
use wasm_bindgen::prelude::*;

use chat_core::event_bus::SubscriptionId;
use chat_core::{Conversation, ExchangeOutcome, StreamTransport};
use chat_platform::FetchHttpClient;
use chat_types::config::ChatConfig;
use chat_types::ChatError;

/// One study-assistant conversation, exported to JavaScript.
///
/// ```js
/// const chat = new StudyChat({ api: { base_url: "/api" } });
/// const id = chat.subscribe((change, snapshot) => render(snapshot));
/// await chat.sendTurn("Explain photosynthesis");
/// ```
#[wasm_bindgen]
pub struct StudyChat {
    conversation: Conversation,
}

#[wasm_bindgen]
impl StudyChat {
    /// Accepts a config object, a JSON string, or nothing for defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<StudyChat, JsValue> {
        let config = parse_config(&config).map_err(to_js_error)?;
        apply_log_level(&config.log_level);

        let http = Rc::new(FetchHttpClient::new(config.api.clone()));
        let conversation = Conversation::new(StreamTransport::new(http), config);
        log::info!(
            "Study chat ready (api base {:?})",
            conversation.config().api.base_url
        );
        Ok(Self { conversation })
    }

    /// Start an exchange. Resolves to `"settled"`, `"failed"` or
    /// `"cancelled"`; throws synchronously if the turn was rejected.
    #[wasm_bindgen(js_name = sendTurn)]
    pub fn send_turn(&self, text: &str) -> Result<js_sys::Promise, JsValue> {
        let exchange = self.conversation.send_turn(text).map_err(to_js_error)?;
        Ok(wasm_bindgen_futures::future_to_promise(async move {
            let outcome = exchange.await;
            Ok(JsValue::from_str(outcome_name(&outcome)))
        }))
    }

    #[wasm_bindgen(js_name = cancelActive)]
    pub fn cancel_active(&self) {
        self.conversation.cancel_active();
    }

    /// Discard transcript and session. Returns false while an exchange runs.
    pub fn reset(&self) -> bool {
        self.conversation.reset()
    }

    /// Register `callback(change, snapshot)`; returns an id for `unsubscribe`.
    pub fn subscribe(&self, callback: js_sys::Function) -> u32 {
        let id = self
            .conversation
            .subscribe_with_snapshot(move |change, snapshot| {
                let args = JsValue::from_serde(change)
                    .and_then(|c| JsValue::from_serde(snapshot).map(|s| (c, s)));
                let (change, snapshot) = match args {
                    Ok(args) => args,
                    Err(e) => {
                        log::error!("Failed to serialize change: {}", e);
                        return;
                    }
                };
                if let Err(e) = callback.call2(&JsValue::NULL, &change, &snapshot) {
                    log::error!("Subscriber threw: {:?}", e);
                }
            });
        id.0
    }

    pub fn unsubscribe(&self, id: u32) -> bool {
        self.conversation.unsubscribe(SubscriptionId(id))
    }

    pub fn transcript(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.conversation.transcript())
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.conversation.snapshot())
    }

    #[wasm_bindgen(js_name = activeStatus)]
    pub fn active_status(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.conversation.active_status())
    }

    #[wasm_bindgen(js_name = sessionId)]
    pub fn session_id(&self) -> Option<String> {
        self.conversation.session_id()
    }

    #[wasm_bindgen(js_name = isBusy)]
    pub fn is_busy(&self) -> bool {
        self.conversation.is_busy()
    }

    #[wasm_bindgen(js_name = lastCompletion)]
    pub fn last_completion(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.conversation.last_completion())
    }
}

fn parse_config(value: &JsValue) -> chat_types::Result<ChatConfig> {
    if value.is_undefined() || value.is_null() {
        return Ok(ChatConfig::default());
    }
    if let Some(json) = value.as_string() {
        return ChatConfig::from_json(&json);
    }
    value
        .into_serde::<ChatConfig>()
        .map_err(|e| ChatError::Config(e.to_string()))
}

fn apply_log_level(level: &str) {
    match log::LevelFilter::from_str(level) {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("Unknown log level {:?}; keeping current", level),
    }
}

fn outcome_name(outcome: &ExchangeOutcome) -> &'static str {
    match outcome {
        ExchangeOutcome::Settled => "settled",
        ExchangeOutcome::Failed(_) => "failed",
        ExchangeOutcome::Cancelled => "cancelled",
    }
}

fn to_js_value<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| to_js_error(ChatError::from(e)))
}

fn to_js_error(error: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&error.to_string()).into()
}
