//! Host-utility layer for a binary-analysis/debugging front end.
//!
//! Provides the foundational primitives the surrounding application builds on:
//! a process-wide tracked allocation arena with a leak invariant, a PE
//! architecture probe, path and handle resolution, and a handful of string
//! normalization helpers used by command parsing.

/// Tracked allocation arena with a live-buffer counter
pub mod arena;
/// Crate error types
pub mod error;
/// Tracing initialization
pub mod logging;
/// Path and handle resolution
pub mod platform;
/// Executable architecture probing
pub mod probe;
/// Boolean-setting lookup seam into the host configuration store
pub mod settings;
/// String normalization helpers
pub mod strings;

pub use error::{HostError, Result};
pub use probe::{classify_image, probe_architecture, FileArchitecture};
