//! surcharge Web Script
//!
//! WASM module for the checkout page: reports the chosen payment method to
//! the server so the surcharge is recalculated, then asks the page to
//! refresh its totals.

mod api;
mod checkout;

pub use api::{CheckoutInfo, absolute_url};

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_bindgen_futures::spawn_local(async {
        if let Err(e) = checkout::init().await {
            web_sys::console::error_1(&e);
        }
    });
}
