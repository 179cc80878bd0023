//! Discovery of instances to update and of the files staged for them.

pub mod sources;
pub mod targets;

pub use sources::{matches_suffix, resolve_sources, SourceSet};
pub use targets::{discover_targets, Discovery, DiscoveryError, Instance, SkipReason, SkippedInstance};
