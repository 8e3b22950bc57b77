//! Workspace layout and layered defaults loading
//!
//! Defaults are read from up to six JSON files under `defaults/`, least to
//! most specific:
//! 1. `defaults.json`
//! 2. `<prefix>-defaults.json`
//! 3. `<prefix>-<project>-defaults.json`
//! 4. `<infra>/defaults.json`
//! 5. `<infra>/<prefix>-defaults.json`
//! 6. `<infra>/<prefix>-<project>-defaults.json`

mod layout;
mod loader;

pub use layout::Layout;
pub use loader::{EffectiveDefaults, LayerSource, SkippedLayer, SCHEMA_ID, SCHEMA_VERSION};
