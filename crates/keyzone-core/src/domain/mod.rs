//! Domain entities for KeyZone.
//!
//! This module contains pure mapping logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain**.  Domain code:
//!
//! - Contains the core rules of the application: here, how a key press on a
//!   given device becomes a MIDI note.
//! - Has **no** imports from OS APIs, MIDI drivers, async runtimes, or UI
//!   frameworks.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! Code in outer layers (application, infrastructure) depends on the domain,
//! but the domain never depends on them.

/// Device identifiers, alias names and the alias-key hash.
pub mod alias;

/// Scale tables and scale-degree quantization.
pub mod scale;

/// A single key -> note mapping rule.
pub mod zone;

/// The ordered zone arena and first-match resolution.
///
/// See [`zone_manager::ZoneManager`] for the main type.
pub mod zone_manager;
