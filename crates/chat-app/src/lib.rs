//! Study Chat — WASM entry point.
//!
//! This crate is the composition root (DI wiring layer).
//! It assembles the browser fetch adapter and the conversation reconciler
//! and exports them to JavaScript as [`StudyChat`].

mod app;

use wasm_bindgen::prelude::*;

pub use app::StudyChat;

/// WASM entry point — runs once when the module is instantiated
#[wasm_bindgen(start)]
pub fn main() {
    // Logger admits everything; `log::max_level` is the only gate, set per config in `StudyChat::new`
    wasm_logger::init(wasm_logger::Config::new(log::Level::Trace));
    log::set_max_level(log::LevelFilter::Info);
    log::info!("Study chat WASM starting...");
}
