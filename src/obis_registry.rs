//! Static names for the OBIS codes pushed by HAN meters.

use crate::obis_code::ObisCode;

/// What a registered object carries as its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueKind {
    /// An integer with a scaler/unit structure next to it.
    Scaled,
    /// A visible-string.
    Text,
    /// A 12-byte COSEM date-time octet-string.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RegistryEntry {
    pub code: ObisCode,
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn entry(code: [u8; 6], name: &'static str, kind: ValueKind) -> RegistryEntry {
    let [a, b, c, d, e, f] = code;
    RegistryEntry { code: ObisCode::new(a, b, c, d, e, f), name, kind }
}

#[rustfmt::skip]
static ENTRIES: [RegistryEntry; 16] = [
    entry([1, 0,  1, 7, 0, 255], "Active power+(Q1+Q4)",   ValueKind::Scaled),
    entry([1, 0,  2, 7, 0, 255], "Active power-(Q1+Q4)",   ValueKind::Scaled),
    entry([1, 0,  3, 7, 0, 255], "Reactive power+(Q1+Q2)", ValueKind::Scaled),
    entry([1, 0,  4, 7, 0, 255], "Reactive power-(Q1+Q2)", ValueKind::Scaled),
    entry([1, 0, 31, 7, 0, 255], "IL1",                    ValueKind::Scaled),
    entry([1, 0, 51, 7, 0, 255], "IL2",                    ValueKind::Scaled),
    entry([1, 0, 71, 7, 0, 255], "IL3",                    ValueKind::Scaled),
    entry([1, 0, 32, 7, 0, 255], "UL1",                    ValueKind::Scaled),
    entry([1, 0, 52, 7, 0, 255], "UL2",                    ValueKind::Scaled),
    entry([1, 0, 72, 7, 0, 255], "UL3",                    ValueKind::Scaled),
    entry([0, 0,  1, 0, 0, 255], "Clock",                  ValueKind::Timestamp),
    entry([1, 0,  1, 8, 0, 255], "A+cumul",                ValueKind::Scaled),
    entry([1, 0,  2, 8, 0, 255], "A-cumul",                ValueKind::Scaled),
    entry([1, 0,  3, 8, 0, 255], "R+cumul",                ValueKind::Scaled),
    // The meter population labels reactive export with the active export name.
    entry([1, 0,  4, 8, 0, 255], "A-cumul",                ValueKind::Scaled),
    entry([1, 1,  0, 2, 129, 255], "OBIS list version id", ValueKind::Text),
];

/// Process-wide, read-only OBIS code lookup.
#[derive(Debug)]
pub enum ObisRegistry {}

impl ObisRegistry {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn lookup(code: &ObisCode) -> Option<&'static RegistryEntry> {
        ENTRIES.iter().find(|entry| entry.code == *code)
    }

    /// Display name of `code`, [`Self::UNKNOWN`] when unregistered.
    pub fn name(code: &ObisCode) -> &'static str {
        Self::lookup(code).map_or(Self::UNKNOWN, |entry| entry.name)
    }

    pub fn entries() -> &'static [RegistryEntry] {
        &ENTRIES
    }
}
