//! WASM bridge exposing the Wavelab analyses to the plotting front-end.
//!
//! Each binding validates its inputs, runs one core routine to completion and hands the
//! result back as typed arrays or serialized payloads.

mod fields;
mod oscillator;
mod shared;
mod wind;

pub use fields::{interpolate_field, interpolation_errors};
pub use oscillator::WasmOscillatorRun;
pub use wind::analyze_wind;
