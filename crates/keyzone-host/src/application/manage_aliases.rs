//! DeviceAliasRegistry: binds physical devices to user-chosen alias names.
//!
//! The registry is the host's in-memory table of every alias the user has
//! created and of which device is currently bound to which alias.
//!
//! # Aliases and devices (for beginners)
//!
//! The OS hands out a new opaque [`DeviceId`] every time a keyboard or mouse is
//! plugged in, so a zone cannot target a device directly.  Instead the user
//! names their devices:
//!
//! ```text
//!   DeviceId(0x1A2B) ──┐
//!                      ├──►  "Left Pad"   ◄── zone "Drums" targets this name
//!   DeviceId(0x3C4D) ──┘
//!   DeviceId(0x5E6F) ─────►  "Numpad"
//! ```
//!
//! Zones persist only the alias name; the binding from devices to names is
//! rebuilt every session with the device-assignment wizard.
//!
//! A device is bound to at most one alias; assigning it again moves it.  The
//! reserved names `"Any / Master"` and `"Unassigned"` are never stored: binding
//! a device to either of them simply unbinds it.

use std::collections::HashMap;

use keyzone_core::{alias_key, is_wildcard_name, AliasKey, DeviceId, ANY_ALIAS};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the change-event channel.  Slow subscribers see `Lagged`.
const EVENT_CAPACITY: usize = 64;

/// Change notifications published by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasEvent {
    Created(String),
    Renamed { from: String, to: String },
    Removed(String),
    /// `alias` is `None` when the device was unbound.
    HardwareAssigned {
        alias: Option<String>,
        device: DeviceId,
    },
}

/// Error type for alias management.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias name {0:?} is reserved")]
    Reserved(String),
    #[error("alias name must not be empty")]
    Empty,
    #[error("alias {0:?} already exists")]
    AlreadyExists(String),
    #[error("unknown alias {0:?}")]
    UnknownAlias(String),
}

/// In-memory alias table.
///
/// Shared as `Arc<RwLock<DeviceAliasRegistry>>`: the mapping engine reads it on
/// every key event, the UI bridge and the wizard write to it.
pub struct DeviceAliasRegistry {
    /// User aliases in UI order.
    aliases: Vec<String>,
    bindings: HashMap<DeviceId, String>,
    events: broadcast::Sender<AliasEvent>,
}

impl Default for DeviceAliasRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAliasRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            aliases: Vec::new(),
            bindings: HashMap::new(),
            events,
        }
    }

    /// Builds a registry from persisted alias names.  Reserved, empty and
    /// duplicate names are skipped.
    pub fn with_aliases<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            let name = name.into();
            if let Err(e) = registry.create_alias(&name) {
                debug!("skipping persisted alias: {e}");
            }
        }
        registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AliasEvent> {
        self.events.subscribe()
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    /// Stable key of `name`; reserved names give [`AliasKey::WILDCARD`].
    pub fn resolve_alias_key(&self, name: &str) -> AliasKey {
        alias_key(name)
    }

    /// Alias currently bound to `device`, if any.
    pub fn alias_for_device(&self, device: DeviceId) -> Option<&str> {
        self.bindings.get(&device).map(String::as_str)
    }

    /// Every alias name for UI population: the wildcard first, then user aliases in order.
    pub fn all_alias_names(&self) -> Vec<String> {
        std::iter::once(ANY_ALIAS.to_string())
            .chain(self.aliases.iter().cloned())
            .collect()
    }

    /// User-created aliases only, in order.
    pub fn user_aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }

    /// Devices bound to `name`, sorted for stable display.
    pub fn devices_for_alias(&self, name: &str) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self
            .bindings
            .iter()
            .filter(|(_, alias)| alias.as_str() == name)
            .map(|(device, _)| *device)
            .collect();
        devices.sort();
        devices
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Binds `device` to `alias_name`.  Last assignment wins.
    ///
    /// A reserved name unbinds the device instead.
    pub fn assign_hardware(&mut self, alias_name: &str, device: DeviceId) -> Result<(), AliasError> {
        if is_wildcard_name(alias_name) {
            if self.bindings.remove(&device).is_some() {
                info!(%device, "device unbound");
                self.publish(AliasEvent::HardwareAssigned { alias: None, device });
            }
            return Ok(());
        }
        if !self.contains(alias_name) {
            return Err(AliasError::UnknownAlias(alias_name.to_string()));
        }

        let previous = self.bindings.insert(device, alias_name.to_string());
        info!(%device, alias = alias_name, ?previous, "device bound");
        self.publish(AliasEvent::HardwareAssigned {
            alias: Some(alias_name.to_string()),
            device,
        });
        Ok(())
    }

    pub fn unassign_hardware(&mut self, device: DeviceId) {
        // Cannot fail for a wildcard name.
        let _ = self.assign_hardware(ANY_ALIAS, device);
    }

    pub fn create_alias(&mut self, name: &str) -> Result<(), AliasError> {
        let name = validate_name(name)?;
        if self.contains(name) {
            return Err(AliasError::AlreadyExists(name.to_string()));
        }
        self.aliases.push(name.to_string());
        debug!(alias = name, "alias created");
        self.publish(AliasEvent::Created(name.to_string()));
        Ok(())
    }

    /// Renames an alias.  Device bindings follow the new name.
    pub fn rename_alias(&mut self, from: &str, to: &str) -> Result<(), AliasError> {
        let to = validate_name(to)?;
        let index = self
            .aliases
            .iter()
            .position(|a| a == from)
            .ok_or_else(|| AliasError::UnknownAlias(from.to_string()))?;
        if from == to {
            return Ok(());
        }
        if self.contains(to) {
            return Err(AliasError::AlreadyExists(to.to_string()));
        }

        self.aliases[index] = to.to_string();
        for alias in self.bindings.values_mut().filter(|a| a.as_str() == from) {
            *alias = to.to_string();
        }
        info!(from, to, "alias renamed");
        self.publish(AliasEvent::Renamed {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// Removes an alias and unbinds its devices.
    pub fn remove_alias(&mut self, name: &str) -> Result<(), AliasError> {
        let index = self
            .aliases
            .iter()
            .position(|a| a == name)
            .ok_or_else(|| AliasError::UnknownAlias(name.to_string()))?;
        self.aliases.remove(index);
        self.bindings.retain(|_, alias| alias.as_str() != name);
        info!(alias = name, "alias removed");
        self.publish(AliasEvent::Removed(name.to_string()));
        Ok(())
    }

    fn publish(&self, event: AliasEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn validate_name(name: &str) -> Result<&str, AliasError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AliasError::Empty);
    }
    if is_wildcard_name(trimmed) {
        return Err(AliasError::Reserved(trimmed.to_string()));
    }
    Ok(trimmed)
}
