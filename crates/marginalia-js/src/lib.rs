//! WASM bindings for the marginalia text annotator.
//!
//! Exposes [`JsAnnotator`] to JavaScript/TypeScript hosts. The host renders
//! its own toolbar and annotation list from the snapshots returned here and
//! re-reads them whenever the `onChange` callback fires.

mod annotator;
mod types;

pub use annotator::*;
pub use types::*;

use wasm_bindgen::prelude::*;

/// Install the panic hook and route `tracing` output to the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );
    let filter = EnvFilter::new("debug,reqwest=info");
    let reg = Registry::default().with(filter).with(wasm_layer);

    // Another module may have installed a subscriber already.
    let _ = set_global_default(reg);
}
