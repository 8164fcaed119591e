//! ZoneManager: the ordered arena of zones.
//!
//! Zones are addressed by a stable [`ZoneId`] that survives reordering and the
//! removal of other zones.  Editors keep a `ZoneId`, never a reference, and
//! every mutation goes through [`ZoneManager::update`], which re-normalizes the
//! zone afterwards so its invariants cannot be broken from outside.
//!
//! Storage order matters: it is the layering order shown in the UI and the
//! tie-break when several zones bind the same key.  The first zone (in order)
//! whose alias and key list both match wins, which is what makes the common
//! "device-specific zones first, wildcard catch-all last" setup work.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::zone::Zone;
use crate::keymap::KeyCode;

/// Stable identity of a zone inside a [`ZoneManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Errors returned by zone arena operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),
    #[error("position {index} is out of range for {len} zones")]
    PositionOutOfRange { index: usize, len: usize },
}

/// Result of resolving a key event against the zone list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneMatch {
    pub zone: ZoneId,
    pub note: u8,
}

/// Ordered collection of zones with stable identities.
#[derive(Debug, Default, Clone)]
pub struct ZoneManager {
    zones: Vec<(ZoneId, Zone)>,
    next_id: u32,
    version: u64,
}

impl ZoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manager from zones in storage order.
    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut manager = Self::new();
        for zone in zones {
            manager.add(zone);
        }
        manager
    }

    /// Monotonic counter bumped on every structural or field change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Appends a zone (normalized) and returns its identity.
    pub fn add(&mut self, mut zone: Zone) -> ZoneId {
        zone.normalize();
        let id = ZoneId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.zones.push((id, zone));
        self.touch();
        id
    }

    /// Removes a zone and returns it.
    pub fn remove(&mut self, id: ZoneId) -> Result<Zone, ZoneError> {
        let index = self.position(id).ok_or(ZoneError::UnknownZone(id))?;
        let (_, zone) = self.zones.remove(index);
        debug!(%id, name = zone.name(), "zone removed");
        self.touch();
        Ok(zone)
    }

    /// Moves a zone to `index` in storage order (0 = highest precedence).
    pub fn move_to(&mut self, id: ZoneId, index: usize) -> Result<(), ZoneError> {
        let from = self.position(id).ok_or(ZoneError::UnknownZone(id))?;
        if index >= self.zones.len() {
            return Err(ZoneError::PositionOutOfRange {
                index,
                len: self.zones.len(),
            });
        }
        let entry = self.zones.remove(from);
        self.zones.insert(index, entry);
        debug!(%id, from, to = index, "zone moved");
        self.touch();
        Ok(())
    }

    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.iter().find(|(zid, _)| *zid == id).map(|(_, z)| z)
    }

    /// Storage position of a zone.
    pub fn position(&self, id: ZoneId) -> Option<usize> {
        self.zones.iter().position(|(zid, _)| *zid == id)
    }

    /// Applies `edit` to a zone, then re-normalizes it.
    pub fn update<R>(&mut self, id: ZoneId, edit: impl FnOnce(&mut Zone) -> R) -> Result<R, ZoneError> {
        let zone = self
            .zones
            .iter_mut()
            .find(|(zid, _)| *zid == id)
            .map(|(_, z)| z)
            .ok_or(ZoneError::UnknownZone(id))?;
        let result = edit(zone);
        zone.normalize();
        self.touch();
        Ok(result)
    }

    /// Applies `edit` to every zone in storage order.
    pub fn update_all(&mut self, mut edit: impl FnMut(&mut Zone)) {
        for (_, zone) in &mut self.zones {
            edit(zone);
            zone.normalize();
        }
        self.touch();
    }

    /// Iterates `(id, zone)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (ZoneId, &Zone)> {
        self.zones.iter().map(|(id, z)| (*id, z))
    }

    /// Identities in storage order.
    pub fn ids(&self) -> Vec<ZoneId> {
        self.zones.iter().map(|(id, _)| *id).collect()
    }

    /// Finds the first zone (storage order) that accepts `device_alias` and binds `code`.
    pub fn find_zone(&self, device_alias: Option<&str>, code: KeyCode) -> Option<(ZoneId, &Zone)> {
        self.iter()
            .find(|(_, zone)| zone.accepts_alias(device_alias) && zone.contains_key(code))
    }

    /// Resolves a key event to a note.
    ///
    /// Only the first structurally matching zone is consulted; if its note is
    /// out of range the event is unmapped rather than falling through.
    pub fn resolve(&self, device_alias: Option<&str>, code: KeyCode) -> Option<ZoneMatch> {
        let (zone_id, zone) = self.find_zone(device_alias, code)?;
        let note = zone.note_for_key(code)?;
        Some(ZoneMatch { zone: zone_id, note })
    }

    fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scale::ScaleType;

    fn zone(name: &str, alias: &str, keys: &[KeyCode], root: i32) -> Zone {
        let mut z = Zone::new(name);
        z.set_target_alias(alias);
        z.set_keys(keys.iter().copied());
        z.set_root_note(root);
        z
    }

    // ── Arena ────────────────────────────────────────────────────────────────

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut mgr = ZoneManager::new();
        let a = mgr.add(Zone::new("a"));
        let b = mgr.add(Zone::new("b"));
        let c = mgr.add(Zone::new("c"));
        assert_eq!(mgr.ids(), vec![a, b, c]);
    }

    #[test]
    fn test_ids_stay_stable_after_removal() {
        let mut mgr = ZoneManager::new();
        let a = mgr.add(Zone::new("a"));
        let b = mgr.add(Zone::new("b"));
        mgr.remove(a).expect("remove a");
        assert_eq!(mgr.get(b).map(Zone::name), Some("b"));
        assert_eq!(mgr.remove(a), Err(ZoneError::UnknownZone(a)));
    }

    #[test]
    fn test_move_to_reorders() {
        let mut mgr = ZoneManager::new();
        let a = mgr.add(Zone::new("a"));
        let b = mgr.add(Zone::new("b"));
        let c = mgr.add(Zone::new("c"));
        mgr.move_to(c, 0).expect("move");
        assert_eq!(mgr.ids(), vec![c, a, b]);
    }

    #[test]
    fn test_move_to_rejects_bad_position() {
        let mut mgr = ZoneManager::new();
        let a = mgr.add(Zone::new("a"));
        assert_eq!(
            mgr.move_to(a, 3),
            Err(ZoneError::PositionOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn test_update_bumps_version_and_normalizes() {
        let mut mgr = ZoneManager::new();
        let a = mgr.add(Zone::new("a"));
        let before = mgr.version();

        mgr.update(a, |z| z.set_root_note(64)).expect("update");

        assert!(mgr.version() > before);
        assert_eq!(mgr.get(a).map(Zone::root_note), Some(64));
    }

    #[test]
    fn test_update_unknown_zone_fails() {
        let mut mgr = ZoneManager::new();
        assert_eq!(mgr.update(ZoneId(9), |_| ()), Err(ZoneError::UnknownZone(ZoneId(9))));
    }

    // ── Matching ─────────────────────────────────────────────────────────────

    #[test]
    fn test_first_inserted_zone_wins_tie() {
        let mut mgr = ZoneManager::new();
        let first = mgr.add(zone("first", "Any / Master", &[0x41], 48));
        mgr.add(zone("second", "Any / Master", &[0x41], 72));

        let m = mgr.resolve(None, 0x41).expect("match");

        assert_eq!(m.zone, first);
        assert_eq!(m.note, 48);
    }

    #[test]
    fn test_device_specific_zone_before_wildcard_catch_all() {
        let mut mgr = ZoneManager::new();
        let pad = mgr.add(zone("pad", "Left Pad", &[0x41], 36));
        let any = mgr.add(zone("any", "Any / Master", &[0x41], 60));

        assert_eq!(mgr.resolve(Some("Left Pad"), 0x41).map(|m| m.zone), Some(pad));
        assert_eq!(mgr.resolve(Some("Other"), 0x41).map(|m| m.zone), Some(any));
        assert_eq!(mgr.resolve(None, 0x41).map(|m| m.zone), Some(any));
    }

    #[test]
    fn test_aliased_zone_ignores_other_devices() {
        let mgr = ZoneManager::from_zones([zone("pad", "Left Pad", &[0x41], 36)]);
        assert!(mgr.resolve(Some("Right Pad"), 0x41).is_none());
        assert!(mgr.resolve(None, 0x41).is_none());
    }

    #[test]
    fn test_zone_without_key_is_skipped() {
        let mgr = ZoneManager::from_zones([
            zone("a", "Any / Master", &[0x42], 36),
            zone("b", "Any / Master", &[0x41], 60),
        ]);
        assert_eq!(mgr.resolve(None, 0x41).map(|m| m.note), Some(60));
    }

    #[test]
    fn test_reorder_changes_precedence() {
        let mut mgr = ZoneManager::new();
        mgr.add(zone("a", "Any / Master", &[0x41], 36));
        let b = mgr.add(zone("b", "Any / Master", &[0x41], 60));
        mgr.move_to(b, 0).expect("move");
        assert_eq!(mgr.resolve(None, 0x41).map(|m| m.zone), Some(b));
    }

    #[test]
    fn test_update_all_visits_every_zone() {
        let mut mgr = ZoneManager::from_zones([Zone::new("a"), Zone::new("b")]);
        mgr.update_all(|z| z.set_scale(ScaleType::Blues));
        assert!(mgr.iter().all(|(_, z)| z.scale() == ScaleType::Blues));
    }
}
