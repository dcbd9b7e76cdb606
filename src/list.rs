//! Assembly of a DLMS payload into a list of rows.
//!
//! The payload is an Array whose elements are Structures, one per COSEM object:
//!
//! ```text
//! 01 NN                           array of NN rows
//!   02 03                         structure of three fields
//!     09 06 01 00 20 07 00 ff     OBIS code
//!     12 09 0f                    raw value
//!     02 02 0f ff 16 23           scaler/unit pair
//! ```
//!
//! Problems inside a row never fail the whole list. They are kept as [`Diagnostic`]s
//! next to whatever could be decoded.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    Error, FLAG,
    cursor::ByteCursor,
    data::{DataType, Decoded, Field, OctetHint, Value, read_primitive, read_primitive_with},
    measurement::Measurement,
    obis_code::ObisCode,
    obis_registry::{ObisRegistry, ValueKind},
};

/// One top-level Structure of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Row {
    declared: u8,
    fields: Vec<Field>,
    #[cfg_attr(feature = "serde", serde(skip))]
    raw: Vec<u8>,
}

impl Row {
    pub fn declared_len(&self) -> u8 {
        self.declared
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_complete(&self) -> bool {
        self.fields.len() == usize::from(self.declared) && self.fields.iter().all(Field::is_complete)
    }

    /// The OBIS code naming this row.
    pub fn obis(&self) -> Option<ObisCode> {
        self.fields.first()?.as_obis()
    }

    pub fn name(&self) -> Option<&'static str> {
        self.obis().map(|code| ObisRegistry::name(&code))
    }

    pub fn measurement(&self) -> Option<Measurement> {
        Measurement::from_row(self)
    }
}

/// A recoverable problem met while decoding a list.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub row: usize,
    pub field: Option<usize>,
    #[cfg_attr(feature = "serde", serde(serialize_with = "serialize_display"))]
    pub error: Error,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "row {}, field {}: {}", self.row, field, self.error),
            None => write!(f, "row {}: {}", self.row, self.error),
        }
    }
}

/// The decoded payload of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct List {
    declared_rows: u8,
    rows: Vec<Row>,
    diagnostics: Vec<Diagnostic>,
    terminated: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    trailer: Vec<u8>,
}

impl List {
    /// Row count announced by the Array header.
    pub fn declared_rows(&self) -> u8 {
        self.declared_rows
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Decoding reached the closing flag before every declared value was read.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Fewer rows than declared, or a row missing fields.
    pub fn is_partial(&self) -> bool {
        self.rows.len() < usize::from(self.declared_rows) || self.rows.iter().any(|row| !row.is_complete())
    }

    pub fn is_clean(&self) -> bool {
        !self.is_partial() && self.diagnostics.is_empty()
    }

    /// Bytes after the last row, normally the frame check sequence and the closing flag.
    pub fn trailer(&self) -> &[u8] {
        &self.trailer
    }

    pub fn measurements(&self) -> impl Iterator<Item = Measurement> + '_ {
        self.rows.iter().filter_map(Row::measurement)
    }
}

enum RowEnd {
    Complete,
    Terminated,
    Failed { field: Option<usize>, error: Error },
}

/// Decodes an Array of Structures.
///
/// Fails only when the payload does not start with an Array header. Everything after
/// that is best effort: a truncated or terminated list is returned partial, an unknown
/// type tag drops the rest of its row and decoding resumes at the next row.
pub fn decode_list(payload: &[u8]) -> Result<List, Error> {
    let mut cursor = ByteCursor::new(payload);

    let found = DataType::from(cursor.read_u8()?);
    if found != DataType::Array {
        return Err(Error::UnexpectedDataType { expected: DataType::Array, found });
    }
    let declared_rows = cursor.read_u8()?;

    let mut list = List {
        declared_rows,
        rows: Vec::with_capacity(declared_rows.into()),
        diagnostics: Vec::new(),
        terminated: false,
        trailer: Vec::new(),
    };

    for index in 0..usize::from(declared_rows) {
        let (row, end) = decode_row(&mut cursor, index, &mut list.diagnostics);
        list.rows.extend(row);

        match end {
            RowEnd::Complete => {}
            RowEnd::Terminated => {
                list.terminated = true;
                break;
            }
            RowEnd::Failed { field, error: error @ Error::UnknownDataType(_) } => {
                push_diagnostic(&mut list.diagnostics, index, field, error);
                // Drop the offending tag and resume at the next thing shaped like a row.
                if cursor.skip(1).is_err() {
                    break;
                }
                match next_row_start(cursor.rest()) {
                    Some(offset) if cursor.skip(offset).is_ok() => {}
                    _ => break,
                }
            }
            RowEnd::Failed { field, error } => {
                push_diagnostic(&mut list.diagnostics, index, field, error);
                break;
            }
        }
    }

    list.trailer = cursor.rest().to_vec();

    if list.is_partial() {
        log::warn!(
            "partial list: {} of {} rows decoded{}",
            list.rows.len(),
            declared_rows,
            if list.terminated { ", stopped at closing flag" } else { "" }
        );
    }
    log::debug!(
        "decoded list of {} rows, {} diagnostics, trailer {}",
        list.rows.len(),
        list.diagnostics.len(),
        hex::encode(&list.trailer)
    );

    Ok(list)
}

fn decode_row(cursor: &mut ByteCursor<'_>, index: usize, diagnostics: &mut Vec<Diagnostic>) -> (Option<Row>, RowEnd) {
    let start = cursor.position();

    let header = match cursor.peek() {
        Ok(tag) if cursor.remaining() == 1 && tag == FLAG => return (None, RowEnd::Terminated),
        Ok(tag) => DataType::from(tag),
        Err(error) => return (None, RowEnd::Failed { field: None, error }),
    };

    if let DataType::Unknown(tag) = header {
        return (None, RowEnd::Failed { field: None, error: Error::UnknownDataType(tag) });
    }

    if header != DataType::Structure {
        // A bare value where a row was expected. Keep it as a one-field row.
        push_diagnostic(diagnostics, index, None, Error::UnexpectedDataType {
            expected: DataType::Structure,
            found: header,
        });
        return match read_primitive(cursor) {
            Ok(Decoded::Complete(field)) => {
                let row = Row { declared: 1, fields: alloc::vec![field], raw: cursor.since(start).to_vec() };
                (Some(row), RowEnd::Complete)
            }
            Ok(Decoded::Terminated(partial)) => {
                let row = partial.map(|field| Row { declared: 1, fields: alloc::vec![field], raw: cursor.since(start).to_vec() });
                (row, RowEnd::Terminated)
            }
            Err(error) => (None, RowEnd::Failed { field: None, error }),
        };
    }

    let declared = match cursor.skip(1).and_then(|()| cursor.read_u8()) {
        Ok(count) => count,
        Err(error) => return (None, RowEnd::Failed { field: None, error }),
    };

    let mut fields: Vec<Field> = Vec::with_capacity(declared.into());
    let mut end = RowEnd::Complete;

    for position in 0..usize::from(declared) {
        let hint = match position {
            0 => OctetHint::Obis,
            1 => value_hint(&fields[0]),
            _ => OctetHint::None,
        };

        match read_primitive_with(cursor, hint) {
            Ok(Decoded::Complete(field)) => {
                if let Some(error) = check_hint(&field, hint) {
                    push_diagnostic(diagnostics, index, Some(position), error);
                }
                fields.push(field);
            }
            Ok(Decoded::Terminated(partial)) => {
                fields.extend(partial);
                end = RowEnd::Terminated;
                break;
            }
            Err(error) => {
                end = RowEnd::Failed { field: Some(position), error };
                break;
            }
        }
    }

    let row = Row { declared, fields, raw: cursor.since(start).to_vec() };
    (Some(row), end)
}

/// What the registry says the value after `obis_field` is.
fn value_hint(obis_field: &Field) -> OctetHint {
    let kind = obis_field
        .as_obis()
        .and_then(|code| ObisRegistry::lookup(&code))
        .map(|entry| entry.kind);

    match kind {
        Some(ValueKind::Timestamp) => OctetHint::DateTime,
        _ => OctetHint::None,
    }
}

fn check_hint(field: &Field, hint: OctetHint) -> Option<Error> {
    let expected = match hint {
        OctetHint::None => return None,
        OctetHint::Obis | OctetHint::DateTime => DataType::OctetString,
    };

    let Value::OctetString { bytes, .. } = field.value() else {
        return Some(Error::UnexpectedDataType { expected, found: field.data_type() });
    };

    match hint {
        OctetHint::Obis if field.as_obis().is_none() => Some(Error::MalformedObis(bytes.len())),
        OctetHint::DateTime if field.as_date_time().is_none() => Some(Error::MalformedDateTime(bytes.len())),
        _ => None,
    }
}

/// Offset of the next `Structure` header followed by an OBIS octet-string.
fn next_row_start(bytes: &[u8]) -> Option<usize> {
    bytes.windows(4).position(|window| {
        window[0] == DataType::Structure.tag()
            && window[2] == DataType::OctetString.tag()
            && usize::from(window[3]) == ObisCode::LEN
    })
}

fn push_diagnostic(diagnostics: &mut Vec<Diagnostic>, row: usize, field: Option<usize>, error: Error) {
    let diagnostic = Diagnostic { row, field, error };
    log::warn!("{}", diagnostic);
    diagnostics.push(diagnostic);
}

#[cfg(feature = "serde")]
fn serialize_display<S>(value: &Error, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(value)
}
