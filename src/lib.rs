//! Decoder for DLMS/COSEM telemetry pushed by an electricity meter's HAN port.
//!
//! Meters on the HAN (Home Area Network) port periodically push HDLC frames whose
//! information field is a DLMS `data-notification` carrying an Array of Structures,
//! one per measured quantity. This crate turns the raw serial byte stream into
//! decoded lists of typed fields:
//!
//! ```text
//! raw bytes ──► try_extract_frame ──► decode_preamble ──► decode_list ──► List
//!               (frame.rs)            (hdlc.rs)           (list.rs)
//! ```
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use han_dlms::{decode_frame, try_extract_frame, PhysicalUnit, UnitCode};
//!
//! let mut buffer = BytesMut::from(&[
//!     0x7e, 0xa0, 0x2a, 0x41, 0x08, 0x83, 0x13, 0x04, 0x13, 0xe6, 0xe7, 0x00,
//!     0x0f, 0x40, 0x00, 0x00, 0x00, 0x00,
//!     0x01, 0x01, 0x02, 0x03, 0x09, 0x06, 0x01, 0x00, 0x01, 0x07, 0x00, 0xff,
//!     0x06, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x0f, 0x00, 0x16, 0x1b,
//!     0xae, 0x27, 0x7e,
//! ][..]);
//!
//! let frame = try_extract_frame(&mut buffer).expect("one complete frame");
//! let decoded = decode_frame(&frame).unwrap();
//! let measurement = decoded.list.rows()[0].measurement().unwrap();
//!
//! assert_eq!(measurement.name, "Active power+(Q1+Q4)");
//! assert_eq!(measurement.reading.scaled_value(), Some(0.0));
//! assert_eq!(measurement.reading.unit(), Some(UnitCode::Physical(PhysicalUnit::Power)));
//! ```
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::string::String;

pub mod cursor;
pub mod data;
pub mod date_time;
pub mod frame;
pub mod hdlc;
pub mod input;
pub mod list;
pub mod measurement;
pub mod obis_code;
pub mod obis_registry;
#[cfg(feature = "std")]
pub mod stream;
pub mod unit;


pub use cursor::ByteCursor;
pub use data::{DataType, Decoded, Field, OctetHint, OctetSemantic, Value, read_primitive, read_primitive_with};
pub use date_time::{ClockStatus, CosemDateTime, Date, Time};
pub use frame::{FLAG, Frame, ListKind, MAX_FRAME_SIZE, try_extract_frame};
pub use hdlc::{DecodedFrame, Preamble, decode_frame, decode_preamble};
pub use list::{Diagnostic, List, Row, decode_list};
pub use measurement::{Measurement, Reading};
pub use obis_code::ObisCode;
pub use obis_registry::{ObisRegistry, RegistryEntry, ValueKind};
#[cfg(feature = "std")]
pub use stream::{FrameReader, StreamError};
pub use unit::{PhysicalUnit, ScalerUnit, UnitCode};

/// Errors raised while extracting, decoding or encoding HAN telemetry.
///
/// None of these abort a read loop: a frame that fails to decode is reported and the
/// stream moves on to the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Not enough bytes yet; retry once more data has arrived.
    #[error("input ended before the value was complete")]
    Truncated,
    /// A type tag outside the supported set.
    #[error("unknown DLMS data type tag 0x{0:02x}")]
    UnknownDataType(u8),
    /// The frame cannot carry the fixed HDLC/LLC preamble.
    #[error("frame of {0} bytes is too short for the HDLC/LLC preamble")]
    FrameTooShort(usize),
    /// An octet-string expected to hold an OBIS code has the wrong length.
    #[error("expected a 6-byte OBIS code, found {0} bytes")]
    MalformedObis(usize),
    /// An octet-string expected to hold a COSEM date-time has the wrong length.
    #[error("expected a 12-byte COSEM date-time, found {0} bytes")]
    MalformedDateTime(usize),
    /// A value of an unexpected type where the layout requires a specific one.
    #[error("expected {expected:?}, found {found:?}")]
    UnexpectedDataType { expected: DataType, found: DataType },
    /// The value does not fit the width of the requested encoding.
    #[error("value does not fit a {0:?} encoding")]
    ValueOutOfRange(DataType),
    /// The value variant cannot be encoded with the requested type tag.
    #[error("value cannot be encoded as {0:?}")]
    ValueTypeMismatch(DataType),
    /// Capture text is not valid hexadecimal.
    #[error("invalid hexadecimal capture: {0}")]
    InvalidHexText(String),
}

impl<I> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(err: nom::Err<nom::error::Error<I>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Self::Truncated,
            // The streaming parsers used by this crate only fail on short input.
            nom::Err::Error(_) | nom::Err::Failure(_) => Self::Truncated,
        }
    }
}
