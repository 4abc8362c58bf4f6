//! Core abstractions shared by the storefront offline layer.
//!
//! This crate provides the fundamental types used by every other crate:
//! - `Clock` - Injectable time source (`SystemClock`, `ManualClock`)
//! - `Timestamp` - Milliseconds since the Unix epoch
//! - `load_file` / `save_file` - TOML/JSON configuration loading

mod clock;
mod config;

pub use clock::*;
pub use config::*;
