//! Application layer use cases for the KeyZone host.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure mapping rules in `keyzone-core`) and the infrastructure (raw input,
//! MIDI drivers, files).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "play the
//!   note bound to this key on this device").
//! - **Depend on abstractions** (traits such as `MidiOutputPort` and `Clock`)
//!   rather than concrete drivers, so tests run without hardware.
//! - **Contain no OS calls and no file system access**.
//!
//! # Sub-modules
//!
//! - **`map_input`** – The zone mapping engine.  Runs on every key press and
//!   turns it into note-on/note-off.  This is the hot path.
//!
//! - **`manage_aliases`** – The in-memory table of alias names and which
//!   device is bound to which alias.
//!
//! - **`assign_devices`** – The setup wizard that binds devices to aliases by
//!   asking for one key press per alias.
//!
//! - **`dispatch_midi`** – Sends MIDI now or after the configured delay.
//!
//! - **`settings`** – Versioned runtime settings shared over a watch channel.

pub mod assign_devices;
pub mod dispatch_midi;
pub mod manage_aliases;
pub mod map_input;
pub mod settings;
