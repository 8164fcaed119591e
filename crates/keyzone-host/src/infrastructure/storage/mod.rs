//! Storage infrastructure: configuration file persistence.
//!
//! This module provides a thin adapter between the application and the
//! file system.  The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the platform-appropriate directory.
//! - Writing aliases, zones and MIDI settings back to disk on request.
//! - Providing sensible defaults when the file does not exist yet (first run).

pub mod config;
