//! Device identities and alias keys.
//!
//! A [`DeviceId`] is whatever opaque handle the OS hands out for a physical
//! input device; it is only stable for one connection session and is never
//! persisted.  Users instead name their devices with *aliases* ("Left Pad",
//! "Numpad") and zones target an alias.  The engine compares aliases through
//! an [`AliasKey`], a stable 64-bit hash of the alias name that can be
//! recomputed from persisted configuration at any time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alias name meaning "match every device".
pub const ANY_ALIAS: &str = "Any / Master";

/// Alias name shown for devices that have not been bound yet; also a wildcard.
pub const UNASSIGNED_ALIAS: &str = "Unassigned";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Opaque OS-assigned identifier of a physical input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{:x}", self.0)
    }
}

/// Numeric key derived from an alias name.  `AliasKey::WILDCARD` (0) matches any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AliasKey(pub u64);

impl AliasKey {
    /// The reserved wildcard key.
    pub const WILDCARD: AliasKey = AliasKey(0);

    /// Returns `true` if this key matches every device.
    pub fn is_wildcard(self) -> bool {
        self == Self::WILDCARD
    }
}

/// Returns `true` if `name` is one of the reserved wildcard alias names.
pub fn is_wildcard_name(name: &str) -> bool {
    name.is_empty() || name == ANY_ALIAS || name == UNASSIGNED_ALIAS
}

/// Computes the alias key for `name`.
///
/// The hash is 64-bit FNV-1a over the UTF-8 bytes, so the value is identical
/// across process runs and platforms.  Wildcard names resolve to
/// [`AliasKey::WILDCARD`].
pub fn alias_key(name: &str) -> AliasKey {
    if is_wildcard_name(name) {
        return AliasKey::WILDCARD;
    }
    let mut hash = FNV_OFFSET_BASIS;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // 0 is reserved for the wildcard.
    AliasKey(hash.max(1))
}
