//! PadBridge GW - MIDI relay that drives pad-controller LEDs from local
//! presses and Voicemeeter state

pub mod app;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod midi;
pub mod pads;
pub mod router;
pub mod transport;

pub use config::AppConfig;
pub use error::{BridgeError, Result};
