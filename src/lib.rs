pub mod config;
pub mod error;
pub mod logging;
pub mod resources;
pub mod scene;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod view;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::ViewerConfig;
pub use error::ViewerError;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{prelude::wasm_bindgen, JsValue};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    logging::init();
    web::run(ViewerConfig::default()).await
}
