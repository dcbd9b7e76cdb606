use core::fmt;

use derive_try_from_primitive::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

/// Physical units reported by HAN meters in the enum half of a scaler/unit structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
#[rustfmt::skip]
pub enum PhysicalUnit {
  Power        = 27,
  VA           = 28,
  VAR          = 29,
  ActiveEnergy = 30,
  VARh         = 32,
  Ampere       = 33,
  Voltage      = 35,
}

impl PhysicalUnit {
    #[rustfmt::skip]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Power        => "W",
            Self::VA           => "VA",
            Self::VAR          => "var",
            Self::ActiveEnergy => "Wh",
            Self::VARh         => "varh",
            Self::Ampere       => "A",
            Self::Voltage      => "V",
        }
    }
}

impl fmt::Display for PhysicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Decoded value of a DLMS enum byte.
///
/// Unknown codes are kept rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitCode {
    Physical(PhysicalUnit),
    UnknownUnit(u8),
}

impl UnitCode {
    pub fn physical(&self) -> Option<PhysicalUnit> {
        match self {
            Self::Physical(unit) => Some(*unit),
            Self::UnknownUnit(_) => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Physical(unit) => *unit as u8,
            Self::UnknownUnit(code) => *code,
        }
    }
}

impl From<u8> for UnitCode {
    fn from(code: u8) -> Self {
        PhysicalUnit::try_from(code).map_or(Self::UnknownUnit(code), Self::Physical)
    }
}

impl From<PhysicalUnit> for UnitCode {
    fn from(unit: PhysicalUnit) -> Self {
        Self::Physical(unit)
    }
}

impl fmt::Display for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Physical(unit) => unit.fmt(f),
            Self::UnknownUnit(code) => write!(f, "unit({code})"),
        }
    }
}

#[cfg(feature = "serde")]
impl Serialize for UnitCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Physical(unit) => serializer.serialize_str(unit.as_str()),
            Self::UnknownUnit(code) => serializer.serialize_u8(*code),
        }
    }
}

/// Scaler and unit pair decoded from a `Structure(Integer, Enum)`.
///
/// The physical value is `raw × 10^scaler`, e.g. a voltage of `2319` with
/// scaler `-1` is 231.9 V.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ScalerUnit {
    pub scaler: i8,
    pub unit: UnitCode,
}

impl ScalerUnit {
    pub fn new(scaler: i8, unit: impl Into<UnitCode>) -> Self {
        Self { scaler, unit: unit.into() }
    }

    pub fn apply(&self, raw: i64) -> f64 {
        let factor = (0..self.scaler.unsigned_abs()).fold(1.0_f64, |acc, _| acc * 10.0);
        if self.scaler < 0 { raw as f64 / factor } else { raw as f64 * factor }
    }
}
