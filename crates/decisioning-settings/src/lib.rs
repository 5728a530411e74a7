//! # decisioning-settings
//!
//! Configuration for the local decisioning engine, loaded from three layers
//! (lowest priority first):
//! 1. **Compiled defaults**: [`DecisioningSettings::default()`]
//! 2. **Settings file**: `~/.decisioning/settings.json` or
//!    `$DECISIONING_SETTINGS_PATH` (deep-merged over defaults)
//! 3. **Environment variables**: `DECISIONING_*` overrides
//!
//! Runtime collaborators (artifact transport, notification sender) cannot be
//! expressed in a file and are injected when the engine is built.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
