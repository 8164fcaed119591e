//! Zone: one key -> note mapping rule.
//!
//! A zone binds an ordered list of key codes to a scale.  The position of a key
//! in that list is its scale-degree index; the zone's root note, offsets and
//! layout strategy turn the index into a MIDI note number.
//!
//! # Layouts
//!
//! - **Linear** – key `i` plays scale degree `i`.
//! - **Grid** – keys fill rows of `columns` keys in list order.  The column picks
//!   a scale degree inside the row, the row adds `row * grid_interval` semitones
//!   directly (no scale lookup), like the string tuning of a fretboard.
//!
//! All setters clamp their input, and [`Zone::normalize`] re-establishes every
//! invariant after deserialization, so a zone held by the
//! [`ZoneManager`](super::zone_manager::ZoneManager) is always valid.

use serde::{Deserialize, Serialize};

use super::alias::{alias_key, AliasKey, ANY_ALIAS};
use super::scale::ScaleType;
use crate::keymap::KeyCode;

/// Highest visualization layer index.
pub const MAX_LAYER: u8 = 8;
/// Chromatic offset range, in semitones (±).
pub const MAX_CHROMATIC_OFFSET: i32 = 12;
/// Degree offset range, in scale steps (±).
pub const MAX_DEGREE_OFFSET: i32 = 7;
/// Grid row interval range, in semitones (±).
pub const MAX_GRID_INTERVAL: i32 = 12;
/// Highest MIDI note number.
pub const MAX_NOTE: i32 = 127;
/// Computed notes at most this far outside `0..=127` are clamped; further out they are unmapped.
pub const NOTE_CLAMP_TOLERANCE: i32 = 12;

const DEFAULT_ROOT_NOTE: u8 = 60;
const DEFAULT_GRID_INTERVAL: i8 = 5;

/// How a key's list position becomes a scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutStrategy {
    #[default]
    Linear,
    Grid,
}

/// A key -> note mapping rule scoped to an alias (or every device).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    name: String,
    layer: u8,
    target_alias: String,
    #[serde(skip)]
    target_alias_key: AliasKey,
    scale: ScaleType,
    root_note: u8,
    chromatic_offset: i8,
    degree_offset: i8,
    transpose_locked: bool,
    layout: LayoutStrategy,
    grid_interval: i8,
    /// Keys per grid row; 0 picks a square-ish grid from the key count.
    grid_columns: u8,
    input_key_codes: Vec<KeyCode>,
}

impl Default for Zone {
    fn default() -> Self {
        Self::new("Zone")
    }
}

impl Zone {
    /// Creates an empty wildcard zone: C4 major, linear layout.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layer: 0,
            target_alias: ANY_ALIAS.to_string(),
            target_alias_key: AliasKey::WILDCARD,
            scale: ScaleType::default(),
            root_note: DEFAULT_ROOT_NOTE,
            chromatic_offset: 0,
            degree_offset: 0,
            transpose_locked: false,
            layout: LayoutStrategy::Linear,
            grid_interval: DEFAULT_GRID_INTERVAL,
            grid_columns: 0,
            input_key_codes: Vec::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> u8 {
        self.layer
    }

    /// Alias name this zone listens to (a wildcard name means every device).
    pub fn target_alias(&self) -> &str {
        &self.target_alias
    }

    pub fn target_alias_key(&self) -> AliasKey {
        self.target_alias_key
    }

    pub fn scale(&self) -> ScaleType {
        self.scale
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    pub fn chromatic_offset(&self) -> i8 {
        self.chromatic_offset
    }

    pub fn degree_offset(&self) -> i8 {
        self.degree_offset
    }

    pub fn is_transpose_locked(&self) -> bool {
        self.transpose_locked
    }

    pub fn layout(&self) -> LayoutStrategy {
        self.layout
    }

    pub fn grid_interval(&self) -> i8 {
        self.grid_interval
    }

    pub fn grid_columns(&self) -> u8 {
        self.grid_columns
    }

    /// Bound key codes, in mapping order.
    pub fn input_key_codes(&self) -> &[KeyCode] {
        &self.input_key_codes
    }

    // ── Mutators (all clamp) ─────────────────────────────────────────────────

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer.clamp(0, i32::from(MAX_LAYER)) as u8;
    }

    /// Retargets the zone; the alias key is recomputed from the name.
    pub fn set_target_alias(&mut self, alias: &str) {
        self.target_alias = alias.to_string();
        self.target_alias_key = alias_key(alias);
    }

    pub fn set_scale(&mut self, scale: ScaleType) {
        self.scale = scale;
    }

    pub fn set_root_note(&mut self, note: i32) {
        self.root_note = note.clamp(0, MAX_NOTE) as u8;
    }

    pub fn set_chromatic_offset(&mut self, semitones: i32) {
        self.chromatic_offset = semitones.clamp(-MAX_CHROMATIC_OFFSET, MAX_CHROMATIC_OFFSET) as i8;
    }

    pub fn set_degree_offset(&mut self, steps: i32) {
        self.degree_offset = steps.clamp(-MAX_DEGREE_OFFSET, MAX_DEGREE_OFFSET) as i8;
    }

    /// Marks the zone as exempt from global transpose.  Honoured by callers of
    /// [`Zone::transpose`] / [`Zone::shift_degrees`], not by the zone itself.
    pub fn set_transpose_locked(&mut self, locked: bool) {
        self.transpose_locked = locked;
    }

    pub fn set_layout(&mut self, layout: LayoutStrategy) {
        self.layout = layout;
    }

    pub fn set_grid_interval(&mut self, semitones: i32) {
        self.grid_interval = semitones.clamp(-MAX_GRID_INTERVAL, MAX_GRID_INTERVAL) as i8;
    }

    pub fn set_grid_columns(&mut self, columns: u8) {
        self.grid_columns = columns;
    }

    /// Shifts the chromatic offset by `semitones` (clamped to its range).
    pub fn transpose(&mut self, semitones: i32) {
        self.set_chromatic_offset(i32::from(self.chromatic_offset) + semitones);
    }

    /// Shifts the degree offset by `steps` (clamped to its range).
    pub fn shift_degrees(&mut self, steps: i32) {
        self.set_degree_offset(i32::from(self.degree_offset) + steps);
    }

    // ── Key list ─────────────────────────────────────────────────────────────

    /// Appends `code` unless it is already bound.  Returns `true` if appended.
    pub fn add_key(&mut self, code: KeyCode) -> bool {
        if self.input_key_codes.contains(&code) {
            return false;
        }
        self.input_key_codes.push(code);
        true
    }

    /// Removes `code`.  Returns `true` if it was bound.
    pub fn remove_key(&mut self, code: KeyCode) -> bool {
        let before = self.input_key_codes.len();
        self.input_key_codes.retain(|&c| c != code);
        self.input_key_codes.len() != before
    }

    /// Replaces the key list; later duplicates are dropped.
    pub fn set_keys(&mut self, codes: impl IntoIterator<Item = KeyCode>) {
        self.input_key_codes.clear();
        for code in codes {
            self.add_key(code);
        }
    }

    pub fn clear_keys(&mut self) {
        self.input_key_codes.clear();
    }

    pub fn contains_key(&self, code: KeyCode) -> bool {
        self.input_key_codes.contains(&code)
    }

    /// Position of `code` in the key list.
    pub fn key_index(&self, code: KeyCode) -> Option<usize> {
        self.input_key_codes.iter().position(|&c| c == code)
    }

    // ── Matching and note computation ────────────────────────────────────────

    /// Returns `true` if events from a device bound to `device_alias` reach this zone.
    ///
    /// Wildcard zones accept every device.  Aliased zones require both the
    /// alias key and the alias name to match, so two names that happen to hash
    /// alike stay distinct.
    pub fn accepts_alias(&self, device_alias: Option<&str>) -> bool {
        if self.target_alias_key.is_wildcard() {
            return true;
        }
        match device_alias {
            Some(name) => alias_key(name) == self.target_alias_key && name == self.target_alias,
            None => false,
        }
    }

    /// Note played by `code`, or `None` if the key is not bound or the note is out of range.
    pub fn note_for_key(&self, code: KeyCode) -> Option<u8> {
        self.key_index(code).and_then(|index| self.note_for_index(index))
    }

    /// Note played by the key at list position `index`.
    pub fn note_for_index(&self, index: usize) -> Option<u8> {
        let (row, column) = self.grid_position(index);
        let degree = column as i32 + i32::from(self.degree_offset);
        let raw = i32::from(self.root_note)
            + i32::from(self.chromatic_offset)
            + self.scale.semitone_offset(degree)
            + row as i32 * i32::from(self.grid_interval);
        clamp_note(raw)
    }

    /// `(row, column)` of list position `index`.  Linear layouts are a single row.
    pub fn grid_position(&self, index: usize) -> (usize, usize) {
        match self.layout {
            LayoutStrategy::Linear => (0, index),
            LayoutStrategy::Grid => {
                let columns = self.effective_grid_columns();
                (index / columns, index % columns)
            }
        }
    }

    /// Row width actually used by the grid layout.
    pub fn effective_grid_columns(&self) -> usize {
        if self.grid_columns > 0 {
            return usize::from(self.grid_columns);
        }
        let keys = self.input_key_codes.len();
        let mut columns = 1;
        while columns * columns < keys {
            columns += 1;
        }
        columns
    }

    /// Re-establishes every invariant.  Needed after deserialization, which
    /// bypasses the clamping setters.
    pub fn normalize(&mut self) {
        self.set_layer(i32::from(self.layer));
        self.set_root_note(i32::from(self.root_note));
        self.set_chromatic_offset(i32::from(self.chromatic_offset));
        self.set_degree_offset(i32::from(self.degree_offset));
        self.set_grid_interval(i32::from(self.grid_interval));
        let alias = std::mem::take(&mut self.target_alias);
        self.set_target_alias(&alias);
        let keys = std::mem::take(&mut self.input_key_codes);
        self.set_keys(keys);
    }
}

fn clamp_note(raw: i32) -> Option<u8> {
    if raw < -NOTE_CLAMP_TOLERANCE || raw > MAX_NOTE + NOTE_CLAMP_TOLERANCE {
        return None;
    }
    Some(raw.clamp(0, MAX_NOTE) as u8)
}
