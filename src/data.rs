//! DLMS primitive codec: type tags, decoded fields and their encodings.

use alloc::{string::String, vec::Vec};

use nom::number::streaming::{be_i16, be_i32, be_u16, be_u32, i8, u8};

use crate::{
    Error, FLAG,
    cursor::ByteCursor,
    date_time::CosemDateTime,
    obis_code::ObisCode,
    unit::{ScalerUnit, UnitCode},
};

/// Type tags of the DLMS encodings pushed by HAN meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataType {
    Array,
    Structure,
    DoubleLong,
    DoubleLongUnsigned,
    OctetString,
    VisibleString,
    Integer,
    Long,
    Unsigned,
    LongUnsigned,
    Enum,
    Unknown(u8),
}

impl DataType {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Array => 0x01,
            Self::Structure => 0x02,
            Self::DoubleLong => 0x05,
            Self::DoubleLongUnsigned => 0x06,
            Self::OctetString => 0x09,
            Self::VisibleString => 0x0a,
            Self::Integer => 0x0f,
            Self::Long => 0x10,
            Self::Unsigned => 0x11,
            Self::LongUnsigned => 0x12,
            Self::Enum => 0x16,
            Self::Unknown(tag) => *tag,
        }
    }
}

impl From<u8> for DataType {
    fn from(tag: u8) -> Self {
        match tag {
            0x01 => Self::Array,
            0x02 => Self::Structure,
            0x05 => Self::DoubleLong,
            0x06 => Self::DoubleLongUnsigned,
            0x09 => Self::OctetString,
            0x0a => Self::VisibleString,
            0x0f => Self::Integer,
            0x10 => Self::Long,
            0x11 => Self::Unsigned,
            0x12 => Self::LongUnsigned,
            0x16 => Self::Enum,
            tag => Self::Unknown(tag),
        }
    }
}

/// What an octet-string is known to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum OctetSemantic {
    None,
    Obis(ObisCode),
    DateTime(CosemDateTime),
}

/// Caller knowledge about the octet-string expected at the cursor.
///
/// Six bytes are only read as an OBIS code under [`OctetHint::Obis`], since the
/// length alone does not identify one. Twelve bytes are read as a date-time unless an
/// OBIS code is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OctetHint {
    #[default]
    None,
    Obis,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    Integer(i64),
    OctetString { bytes: Vec<u8>, semantic: OctetSemantic },
    VisibleString(String),
    Enum(UnitCode),
    Structure(Vec<Field>),
    Array(Vec<Field>),
}

impl Value {
    pub fn obis(code: ObisCode) -> Self {
        Self::OctetString { bytes: code.to_bytes().to_vec(), semantic: OctetSemantic::Obis(code) }
    }

    pub fn date_time(date_time: CosemDateTime) -> Self {
        Self::OctetString {
            bytes: date_time.encode().to_vec(),
            semantic: OctetSemantic::DateTime(date_time),
        }
    }

    pub fn octets(bytes: impl Into<Vec<u8>>) -> Self {
        Self::OctetString { bytes: bytes.into(), semantic: OctetSemantic::None }
    }
}

/// A decoded value together with the bytes it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Field {
    data_type: DataType,
    declared: Option<u8>,
    value: Value,
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_hex"))]
    raw: Vec<u8>,
}

/// Outcome of a decode that may run into the frame terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Complete(T),
    /// The closing flag was reached. Carries whatever had been decoded before it.
    Terminated(Option<T>),
}

impl<T> Decoded<T> {
    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::Terminated(partial) => partial,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

impl Field {
    /// Encodes `value` with the given type tag.
    pub fn new(data_type: DataType, value: Value) -> Result<Self, Error> {
        let mut raw = Vec::new();
        raw.push(data_type.tag());
        let declared = encode_value(data_type, &value, &mut raw)?;
        Ok(Self { data_type, declared, value, raw })
    }

    pub fn integer(data_type: DataType, value: i64) -> Result<Self, Error> {
        Self::new(data_type, Value::Integer(value))
    }

    pub fn obis(code: ObisCode) -> Self {
        let mut raw = Vec::with_capacity(2 + ObisCode::LEN);
        raw.extend_from_slice(&[DataType::OctetString.tag(), ObisCode::LEN as u8]);
        raw.extend_from_slice(&code.to_bytes());
        Self {
            data_type: DataType::OctetString,
            declared: Some(ObisCode::LEN as u8),
            value: Value::obis(code),
            raw,
        }
    }

    pub fn date_time(date_time: CosemDateTime) -> Self {
        let mut raw = Vec::with_capacity(2 + CosemDateTime::LEN);
        raw.extend_from_slice(&[DataType::OctetString.tag(), CosemDateTime::LEN as u8]);
        raw.extend_from_slice(&date_time.encode());
        Self {
            data_type: DataType::OctetString,
            declared: Some(CosemDateTime::LEN as u8),
            value: Value::date_time(date_time),
            raw,
        }
    }

    pub fn visible_string(text: &str) -> Result<Self, Error> {
        Self::new(DataType::VisibleString, Value::VisibleString(text.into()))
    }

    pub fn unit(unit: impl Into<UnitCode>) -> Self {
        let unit = unit.into();
        Self {
            data_type: DataType::Enum,
            declared: None,
            value: Value::Enum(unit),
            raw: alloc::vec![DataType::Enum.tag(), unit.as_u8()],
        }
    }

    pub fn structure(elements: Vec<Field>) -> Result<Self, Error> {
        Self::new(DataType::Structure, Value::Structure(elements))
    }

    /// The `Structure(Integer, Enum)` pair that follows a scaled value.
    pub fn scaler_unit(scaler_unit: ScalerUnit) -> Self {
        let scaler = Self {
            data_type: DataType::Integer,
            declared: None,
            value: Value::Integer(scaler_unit.scaler.into()),
            raw: alloc::vec![DataType::Integer.tag(), scaler_unit.scaler as u8],
        };
        let unit = Self::unit(scaler_unit.unit);
        let mut raw = alloc::vec![DataType::Structure.tag(), 2];
        raw.extend_from_slice(&scaler.raw);
        raw.extend_from_slice(&unit.raw);
        Self {
            data_type: DataType::Structure,
            declared: Some(2),
            value: Value::Structure(alloc::vec![scaler, unit]),
            raw,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Element count or byte length announced on the wire, for length-prefixed types.
    pub fn declared_len(&self) -> Option<u8> {
        self.declared
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Tag, length and payload exactly as read.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// False for a compound cut short by the frame terminator.
    pub fn is_complete(&self) -> bool {
        match &self.value {
            Value::Structure(elements) | Value::Array(elements) => {
                self.declared.map(usize::from) == Some(elements.len())
                    && elements.iter().all(Field::is_complete)
            }
            _ => true,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            Value::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_obis(&self) -> Option<ObisCode> {
        match self.value {
            Value::OctetString { semantic: OctetSemantic::Obis(code), .. } => Some(code),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<&CosemDateTime> {
        match &self.value {
            Value::OctetString { semantic: OctetSemantic::DateTime(date_time), .. } => Some(date_time),
            _ => None,
        }
    }

    pub fn as_octets(&self) -> Option<&[u8]> {
        match &self.value {
            Value::OctetString { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::VisibleString(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_unit(&self) -> Option<UnitCode> {
        match self.value {
            Value::Enum(unit) => Some(unit),
            _ => None,
        }
    }

    /// Elements of a Structure or Array.
    pub fn elements(&self) -> Option<&[Field]> {
        match &self.value {
            Value::Structure(elements) | Value::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_scaler_unit(&self) -> Option<ScalerUnit> {
        let Value::Structure(elements) = &self.value else {
            return None;
        };
        match elements.as_slice() {
            [scaler, unit] => {
                let scaler = i8::try_from(scaler.as_integer()?).ok()?;
                Some(ScalerUnit::new(scaler, unit.as_unit()?))
            }
            _ => None,
        }
    }
}

/// Decodes the value whose type tag sits at the cursor.
///
/// Returns [`Decoded::Terminated`] instead of an error when the only byte left is the
/// closing flag. An unknown tag fails with [`Error::UnknownDataType`] and leaves the
/// cursor on that tag.
pub fn read_primitive(cursor: &mut ByteCursor<'_>) -> Result<Decoded<Field>, Error> {
    read_primitive_with(cursor, OctetHint::None)
}

/// Like [`read_primitive`], classifying a top-level octet-string according to `hint`.
pub fn read_primitive_with(cursor: &mut ByteCursor<'_>, hint: OctetHint) -> Result<Decoded<Field>, Error> {
    if cursor.remaining() == 1 && cursor.peek()? == FLAG {
        return Ok(Decoded::Terminated(None));
    }

    let start = cursor.position();
    let data_type = DataType::from(cursor.peek()?);
    if let DataType::Unknown(tag) = data_type {
        return Err(Error::UnknownDataType(tag));
    }
    cursor.skip(1)?;

    let (declared, value) = match data_type {
        DataType::Array | DataType::Structure => {
            let count = cursor.parse(u8)?;
            let mut elements = Vec::with_capacity(count.into());
            let mut terminated = false;
            for _ in 0..count {
                match read_primitive(cursor)? {
                    Decoded::Complete(element) => elements.push(element),
                    Decoded::Terminated(partial) => {
                        elements.extend(partial);
                        terminated = true;
                        break;
                    }
                }
            }
            let value = if data_type == DataType::Array {
                Value::Array(elements)
            } else {
                Value::Structure(elements)
            };
            let field = Field { data_type, declared: Some(count), value, raw: cursor.since(start).to_vec() };
            return Ok(if terminated { Decoded::Terminated(Some(field)) } else { Decoded::Complete(field) });
        }
        DataType::OctetString => {
            let len = cursor.parse(u8)?;
            let bytes = cursor.take(len.into())?;
            let semantic = octet_semantic(bytes, hint);
            (Some(len), Value::OctetString { bytes: bytes.to_vec(), semantic })
        }
        DataType::VisibleString => {
            let len = cursor.parse(u8)?;
            let bytes = cursor.take(len.into())?;
            (Some(len), Value::VisibleString(String::from_utf8_lossy(bytes).into_owned()))
        }
        DataType::DoubleLong => (None, Value::Integer(cursor.parse(be_i32)?.into())),
        DataType::DoubleLongUnsigned => (None, Value::Integer(cursor.parse(be_u32)?.into())),
        DataType::Integer => (None, Value::Integer(cursor.parse(i8)?.into())),
        DataType::Long => (None, Value::Integer(cursor.parse(be_i16)?.into())),
        DataType::Unsigned => (None, Value::Integer(cursor.parse(u8)?.into())),
        DataType::LongUnsigned => (None, Value::Integer(cursor.parse(be_u16)?.into())),
        DataType::Enum => (None, Value::Enum(UnitCode::from(cursor.parse(u8)?))),
        DataType::Unknown(tag) => return Err(Error::UnknownDataType(tag)),
    };

    Ok(Decoded::Complete(Field { data_type, declared, value, raw: cursor.since(start).to_vec() }))
}

fn octet_semantic(bytes: &[u8], hint: OctetHint) -> OctetSemantic {
    match hint {
        OctetHint::Obis => ObisCode::from_slice(bytes).map_or(OctetSemantic::None, OctetSemantic::Obis),
        OctetHint::None | OctetHint::DateTime => match <&[u8; CosemDateTime::LEN]>::try_from(bytes) {
            Ok(raw) => OctetSemantic::DateTime(CosemDateTime::decode(raw)),
            Err(_) => OctetSemantic::None,
        },
    }
}

/// Appends the encoding of `value` after its tag, returning the declared length.
fn encode_value(data_type: DataType, value: &Value, out: &mut Vec<u8>) -> Result<Option<u8>, Error> {
    let out_of_range = || Error::ValueOutOfRange(data_type);

    match (data_type, value) {
        (DataType::Structure, Value::Structure(elements)) | (DataType::Array, Value::Array(elements)) => {
            let count = u8::try_from(elements.len()).map_err(|_| out_of_range())?;
            out.push(count);
            for element in elements {
                out.extend_from_slice(element.raw());
            }
            Ok(Some(count))
        }
        (DataType::OctetString, Value::OctetString { bytes, .. }) => {
            let len = u8::try_from(bytes.len()).map_err(|_| out_of_range())?;
            out.push(len);
            out.extend_from_slice(bytes);
            Ok(Some(len))
        }
        (DataType::VisibleString, Value::VisibleString(text)) => {
            let len = u8::try_from(text.len()).map_err(|_| out_of_range())?;
            out.push(len);
            out.extend_from_slice(text.as_bytes());
            Ok(Some(len))
        }
        (DataType::Enum, Value::Enum(unit)) => {
            out.push(unit.as_u8());
            Ok(None)
        }
        (DataType::Integer, Value::Integer(v)) => {
            out.extend(i8::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        (DataType::Unsigned, Value::Integer(v)) => {
            out.extend(u8::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        (DataType::Long, Value::Integer(v)) => {
            out.extend(i16::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        (DataType::LongUnsigned, Value::Integer(v)) => {
            out.extend(u16::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        (DataType::DoubleLong, Value::Integer(v)) => {
            out.extend(i32::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        (DataType::DoubleLongUnsigned, Value::Integer(v)) => {
            out.extend(u32::try_from(*v).map_err(|_| out_of_range())?.to_be_bytes());
            Ok(None)
        }
        _ => Err(Error::ValueTypeMismatch(data_type)),
    }
}

#[cfg(feature = "serde")]
fn serialize_hex<S>(raw: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&hex::encode(raw))
}
