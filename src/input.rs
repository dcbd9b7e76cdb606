//! Normalisation of stored captures into raw bytes.
//!
//! Captures come either as the raw serial bytes or as hexadecimal text, two digits per
//! byte separated by spaces and line breaks:
//!
//! ```text
//! 7e a0 2a 41 08 83 13 04 13 e6 e7 00 0f 40 00 00 00 00 01 01 02 03 09 06 01 00 ...
//! ```

use alloc::{borrow::Cow, string::ToString, vec::Vec};

use crate::Error;

/// Decodes whitespace-separated hexadecimal text.
pub fn bytes_from_hex_text(text: &str) -> Result<Vec<u8>, Error> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    hex::decode(digits).map_err(|err| Error::InvalidHexText(err.to_string()))
}

/// Whether `bytes` looks like a hex text capture rather than raw serial data.
///
/// Raw frames always contain the `0x7E` flag, which is not a hex digit, so any buffer
/// made only of hex digits and whitespace is taken as text.
pub fn is_hex_text(bytes: &[u8]) -> bool {
    bytes.iter().any(u8::is_ascii_hexdigit)
        && bytes.iter().all(|b| b.is_ascii_hexdigit() || b.is_ascii_whitespace())
}

/// Returns the raw bytes of a capture, decoding it first if it is hex text.
pub fn normalize(bytes: &[u8]) -> Result<Cow<'_, [u8]>, Error> {
    if !is_hex_text(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }

    let text = core::str::from_utf8(bytes).map_err(|err| Error::InvalidHexText(err.to_string()))?;
    let decoded = bytes_from_hex_text(text)?;
    log::debug!("decoded {} bytes of hex text into {} bytes", bytes.len(), decoded.len());
    Ok(Cow::Owned(decoded))
}
