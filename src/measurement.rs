//! Named readings built from decoded rows.

use alloc::{string::String, vec::Vec};
use core::fmt;

use crate::{
    data::{Field, OctetSemantic, Value},
    date_time::CosemDateTime,
    list::Row,
    obis_code::ObisCode,
    obis_registry::ObisRegistry,
    unit::{ScalerUnit, UnitCode},
};

/// The value half of a row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Reading {
    /// A raw integer and, when the row carries one, its scaler/unit pair.
    Scalar { raw: i64, scaler_unit: Option<ScalerUnit> },
    Text(String),
    Timestamp(CosemDateTime),
    Bytes(Vec<u8>),
    /// A value with no reading interpretation, such as a bare enum or a nested list.
    Other(Field),
}

impl Reading {
    fn from_fields(value: &Field, scaler_unit: Option<&Field>) -> Self {
        match value.value() {
            Value::Integer(raw) => Self::Scalar { raw: *raw, scaler_unit: scaler_unit.and_then(Field::as_scaler_unit) },
            Value::VisibleString(text) => Self::Text(text.clone()),
            Value::OctetString { semantic: OctetSemantic::DateTime(date_time), .. } => Self::Timestamp(*date_time),
            Value::OctetString { bytes, .. } => Self::Bytes(bytes.clone()),
            Value::Enum(_) | Value::Structure(_) | Value::Array(_) => Self::Other(value.clone()),
        }
    }

    /// `raw × 10^scaler`, or the raw value itself without a scaler.
    pub fn scaled_value(&self) -> Option<f64> {
        match self {
            Self::Scalar { raw, scaler_unit: Some(scaler_unit) } => Some(scaler_unit.apply(*raw)),
            Self::Scalar { raw, scaler_unit: None } => Some(*raw as f64),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<UnitCode> {
        match self {
            Self::Scalar { scaler_unit, .. } => scaler_unit.map(|scaler_unit| scaler_unit.unit),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { raw, scaler_unit: Some(scaler_unit) } => {
                write!(f, "{} {}", scaler_unit.apply(*raw), scaler_unit.unit)
            }
            Self::Scalar { raw, scaler_unit: None } => write!(f, "{}", raw),
            Self::Text(text) => f.write_str(text),
            Self::Timestamp(date_time) => write!(f, "{}", date_time),
            Self::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
            Self::Other(field) => f.write_str(&hex::encode(field.raw())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Measurement {
    pub obis: ObisCode,
    pub name: &'static str,
    pub reading: Reading,
}

impl Measurement {
    /// Reads a row laid out as `[OBIS, value]` or `[OBIS, value, scaler/unit]`.
    ///
    /// Returns `None` when the first field is not an OBIS code or the value is missing.
    pub fn from_row(row: &Row) -> Option<Self> {
        let (obis, rest) = row.fields().split_first()?;
        let obis = obis.as_obis()?;
        let value = rest.first()?;

        Some(Self { obis, name: ObisRegistry::name(&obis), reading: Reading::from_fields(value, rest.get(1)) })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.obis, self.name, self.reading)
    }
}
