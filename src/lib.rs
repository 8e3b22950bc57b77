//! Atlantis samconfig generator
//!
//! File-backed shell around [`atlantis_core`]: reads layered defaults,
//! templates and existing samconfig files, observes deployed stacks, and
//! writes regenerated samconfig files.

pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod store;
pub mod template;
pub mod workflow;

pub use config::{EffectiveDefaults, Layout};
pub use error::{Result, ShellError};
pub use remote::{FileStackSource, RemoteSnapshotSource, StackObservation};
pub use store::SamconfigStore;
pub use workflow::{Generated, Request};
