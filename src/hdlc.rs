//! Removal of the fixed HDLC/LLC preamble in front of the pushed list.
//!
//! ```text
//! +------+--------+-----------------+------+-----+--------------+-------------------+-----+------+
//! | Flag | Format | Dest/Src/Ctrl   | HCS  | LLC | data-notif.  | invoke-id/prio    | dt  | APDU |..
//! | 7E   | (2)    | (3)             | (2)  | (3) | 0F           | (4)               | 00  |      |
//! +------+--------+-----------------+------+-----+--------------+-------------------+-----+------+
//! \_____________ HDLC segment, 12 bytes ______/ \______ LLC segment, 6 bytes ___________/
//! ```
//!
//! Neither segment is validated. Address, control and checksum bytes are kept as read.

use nom::{Parser, bytes::streaming::take};

use crate::{
    Error,
    frame::{Frame, ListKind},
    list::{List, decode_list},
    measurement::Measurement,
};

pub const HDLC_SEGMENT_LEN: usize = 12;
pub const LLC_SEGMENT_LEN: usize = 6;
pub const PREAMBLE_LEN: usize = HDLC_SEGMENT_LEN + LLC_SEGMENT_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    hdlc: [u8; HDLC_SEGMENT_LEN],
    llc: [u8; LLC_SEGMENT_LEN],
}

impl Preamble {
    /// Opening flag, format, addresses, control, header check sequence and LLC bytes.
    pub fn hdlc_segment(&self) -> &[u8; HDLC_SEGMENT_LEN] {
        &self.hdlc
    }

    /// The data-notification header in front of the list.
    pub fn llc_segment(&self) -> &[u8; LLC_SEGMENT_LEN] {
        &self.llc
    }

    /// HDLC frame format type, `0xA` for type 3.
    pub fn frame_format(&self) -> u8 {
        self.hdlc[1] >> 4
    }

    pub fn is_segmented(&self) -> bool {
        (self.hdlc[1] & 0x08) != 0
    }

    /// Frame length from the format field, excluding both flags.
    pub fn declared_length(&self) -> u16 {
        u16::from_be_bytes([self.hdlc[1] & 0x07, self.hdlc[2]])
    }

    pub fn long_invoke_id_and_priority(&self) -> u32 {
        u32::from_be_bytes([self.llc[1], self.llc[2], self.llc[3], self.llc[4]])
    }

    pub fn invoke_id(&self) -> u32 {
        self.long_invoke_id_and_priority() & 0x00ff_ffff
    }
}

/// Splits a frame into its preamble and the payload that follows it.
///
/// The payload runs to the end of the frame, frame check sequence and closing flag
/// included.
pub fn decode_preamble(frame: &Frame) -> Result<(Preamble, &[u8]), Error> {
    let bytes = frame.as_bytes();
    if bytes.len() <= PREAMBLE_LEN {
        return Err(Error::FrameTooShort(bytes.len()));
    }

    let (payload, (hdlc, llc)) =
        (take::<_, _, nom::error::Error<&[u8]>>(HDLC_SEGMENT_LEN), take(LLC_SEGMENT_LEN)).parse(bytes)?;
    let mut preamble = Preamble { hdlc: [0; HDLC_SEGMENT_LEN], llc: [0; LLC_SEGMENT_LEN] };
    preamble.hdlc.copy_from_slice(hdlc);
    preamble.llc.copy_from_slice(llc);

    Ok((preamble, payload))
}

/// A frame together with its decoded preamble and list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub preamble: Preamble,
    pub list: List,
}

impl DecodedFrame {
    pub fn list_kind(&self) -> Option<ListKind> {
        self.frame.list_kind()
    }

    pub fn measurements(&self) -> impl Iterator<Item = Measurement> + '_ {
        self.list.measurements()
    }
}

pub fn decode_frame(frame: &Frame) -> Result<DecodedFrame, Error> {
    let (preamble, payload) = decode_preamble(frame)?;
    log::debug!(
        "frame of {} bytes, declared length {}, invoke id {}, payload {}",
        frame.len(),
        preamble.declared_length(),
        preamble.invoke_id(),
        hex::encode(payload)
    );

    let list = decode_list(payload)?;
    Ok(DecodedFrame { frame: frame.clone(), preamble, list })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST1_FRAME: [u8; 44] = [
        0x7e, 0xa0, 0x2a, 0x41, 0x08, 0x83, 0x13, 0x04, 0x13, 0xe6, 0xe7, 0x00, 0x0f, 0x40, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x01, 0x02, 0x03, 0x09, 0x06, 0x01, 0x00, 0x01, 0x07, 0x00, 0xff, 0x06, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x02, 0x0f, 0x00, 0x16, 0x1b, 0xae, 0x27, 0x7e,
    ];

    fn frame(bytes: &[u8]) -> Frame {
        Frame::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_preamble_fields() {
        let frame = frame(&LIST1_FRAME);
        let (preamble, payload) = decode_preamble(&frame).unwrap();

        assert_eq!(preamble.hdlc_segment(), &LIST1_FRAME[..12]);
        assert_eq!(preamble.llc_segment(), &[0x0f, 0x40, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(preamble.frame_format(), 0xa);
        assert!(!preamble.is_segmented());
        assert_eq!(usize::from(preamble.declared_length()), LIST1_FRAME.len() - 2);
        assert_eq!(preamble.long_invoke_id_and_priority(), 0x4000_0000);
        assert_eq!(preamble.invoke_id(), 0);
        assert_eq!(payload, &LIST1_FRAME[18..]);
    }

    #[test]
    fn test_invoke_id_masks_priority_bits() {
        let mut bytes = LIST1_FRAME;
        bytes[13..17].copy_from_slice(&[0xc0, 0x00, 0x01, 0x2c]);
        let (preamble, _) = decode_preamble(&frame(&bytes)).unwrap();

        assert_eq!(preamble.long_invoke_id_and_priority(), 0xc000_012c);
        assert_eq!(preamble.invoke_id(), 300);
    }

    #[test]
    fn test_frame_too_short() {
        let mut short = [0u8; PREAMBLE_LEN];
        short[0] = 0x7e;
        short[PREAMBLE_LEN - 1] = 0x7e;

        assert_eq!(decode_preamble(&frame(&short)), Err(Error::FrameTooShort(PREAMBLE_LEN)));
        assert_eq!(decode_preamble(&frame(&[0x7e, 0x7e])), Err(Error::FrameTooShort(2)));
    }

    #[test]
    fn test_shortest_frame_has_flag_payload() {
        let mut bytes = [0u8; PREAMBLE_LEN + 1];
        bytes[0] = 0x7e;
        bytes[PREAMBLE_LEN] = 0x7e;

        let frame = frame(&bytes);
        let (_, payload) = decode_preamble(&frame).unwrap();
        assert_eq!(payload, &[0x7e]);
    }

    #[test]
    fn test_decode_frame() {
        let decoded = decode_frame(&frame(&LIST1_FRAME)).unwrap();

        assert_eq!(decoded.list_kind(), Some(ListKind::List1));
        assert_eq!(decoded.list.rows().len(), 1);
        assert_eq!(decoded.list.trailer(), &[0xae, 0x27, 0x7e]);
        assert_eq!(decoded.measurements().count(), 1);
    }

    #[test]
    fn test_decode_frame_without_array() {
        let mut bytes = LIST1_FRAME;
        bytes[18] = 0x02;

        assert!(matches!(
            decode_frame(&frame(&bytes)),
            Err(Error::UnexpectedDataType { found: crate::DataType::Structure, .. })
        ));
    }
}
