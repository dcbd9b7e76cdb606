//! Frame boundary detection on a raw HAN byte stream.
//!
//! Frames are delimited by the HDLC flag:
//!
//! ```text
//! .. noise .. 7E <frame body> 7E 7E <next frame body> 7E ..
//! ```
//!
//! Meters push frames back to back, each with its own opening and closing flag, so two
//! adjacent flags mark the boundary between two frames. Bytes before the first flag are
//! resynchronisation noise and are dropped.

use core::fmt;

use bytes::{Buf, Bytes, BytesMut};

/// HDLC frame delimiter.
pub const FLAG: u8 = 0x7e;

/// Largest HDLC frame a meter sends.
pub const MAX_FRAME_SIZE: usize = 2048;

/// One flag-delimited frame, both flags included.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    /// Copies bytes already known to form a single frame, such as a stored capture.
    ///
    /// Returns `None` unless `bytes` is at least two bytes long and starts and ends
    /// with [`FLAG`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [FLAG, .., FLAG] => Some(Self(Bytes::copy_from_slice(bytes))),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, a frame holds at least its two flags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Which push list the frame carries, judged by its length.
    pub fn list_kind(&self) -> Option<ListKind> {
        ListKind::from_frame_len(self.len())
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", hex::encode(&self.0))
    }
}

/// The push lists of Norwegian HAN meters.
///
/// List 1 carries active power only, List 2 adds currents, voltages and reactive
/// power, List 3 adds the clock and cumulative energy registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ListKind {
    List1,
    List2,
    List3,
}

impl ListKind {
    pub fn from_frame_len(len: usize) -> Option<Self> {
        match len {
            301.. => Some(Self::List3),
            101..=300 => Some(Self::List2),
            41..=100 => Some(Self::List1),
            _ => None,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List1 => f.write_str("List 1"),
            Self::List2 => f.write_str("List 2"),
            Self::List3 => f.write_str("List 3"),
        }
    }
}

/// Removes and returns the first complete frame in `buffer`.
///
/// Returns `None` and leaves `buffer` untouched when no complete frame is buffered
/// yet. Otherwise the noise before the frame and the frame itself, closing flag
/// included, are removed.
pub fn try_extract_frame(buffer: &mut BytesMut) -> Option<Frame> {
    let first = buffer.iter().position(|&b| b == FLAG)?;
    let open = match buffer.get(first + 1) {
        Some(&FLAG) => first + 1,
        _ => first,
    };
    let close = open + 1 + buffer.get(open + 1..)?.iter().position(|&b| b == FLAG)?;

    if open > 0 {
        log::trace!("dropping {} bytes before frame: {}", open, hex::encode(&buffer[..open]));
        buffer.advance(open);
    }
    let frame = buffer.split_to(close - open + 1).freeze();
    log::debug!("extracted frame of {} bytes: {}", frame.len(), hex::encode(&frame));

    Some(Frame(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIST1_FRAME: [u8; 44] = [
        0x7e, 0xa0, 0x2a, 0x41, 0x08, 0x83, 0x13, 0x04, 0x13, 0xe6, 0xe7, 0x00, 0x0f, 0x40, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x01, 0x02, 0x03, 0x09, 0x06, 0x01, 0x00, 0x01, 0x07, 0x00, 0xff, 0x06, 0x00, 0x00, 0x00, 0x00, 0x02,
        0x02, 0x0f, 0x00, 0x16, 0x1b, 0xae, 0x27, 0x7e,
    ];

    #[test]
    fn test_extract_single_frame() {
        let mut buffer = BytesMut::from(&LIST1_FRAME[..]);
        let frame = try_extract_frame(&mut buffer).unwrap();

        assert_eq!(frame.as_bytes(), &LIST1_FRAME);
        assert!(buffer.is_empty());
        assert_eq!(frame.list_kind(), Some(ListKind::List1));
    }

    #[test]
    fn test_noise_before_frame_is_dropped() {
        let mut buffer = BytesMut::from(&[0x00, 0x13, 0xa0][..]);
        buffer.extend_from_slice(&LIST1_FRAME);
        buffer.extend_from_slice(&[0x55, 0xaa]);

        let frame = try_extract_frame(&mut buffer).unwrap();
        assert_eq!(frame.as_bytes(), &LIST1_FRAME);
        assert_eq!(&buffer[..], &[0x55, 0xaa]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&LIST1_FRAME);
        buffer.extend_from_slice(&LIST1_FRAME);

        let first = try_extract_frame(&mut buffer).unwrap();
        let second = try_extract_frame(&mut buffer).unwrap();

        assert_eq!(first.as_bytes(), &LIST1_FRAME);
        assert_eq!(second.as_bytes(), &LIST1_FRAME);
        assert!(buffer.is_empty());
        assert_eq!(try_extract_frame(&mut buffer), None);
    }

    #[test]
    fn test_doubled_flag_after_partial_read() {
        // A stray closing flag from a frame whose start was missed.
        let mut buffer = BytesMut::from(&[0x27, 0x7e][..]);
        buffer.extend_from_slice(&LIST1_FRAME);

        let frame = try_extract_frame(&mut buffer).unwrap();
        assert_eq!(frame.as_bytes(), &LIST1_FRAME);
    }

    #[test]
    fn test_incomplete_frame_has_no_side_effect() {
        let input = [0x00, 0x7e, 0xa0, 0x2a, 0x41];
        let mut buffer = BytesMut::from(&input[..]);

        assert_eq!(try_extract_frame(&mut buffer), None);
        assert_eq!(&buffer[..], &input);
    }

    #[test]
    fn test_short_buffers() {
        for input in [&[][..], &[0x7e][..], &[0x7e, 0x7e][..], &[0x01, 0x02][..]] {
            let mut buffer = BytesMut::from(input);
            assert_eq!(try_extract_frame(&mut buffer), None);
            assert_eq!(&buffer[..], input);
        }
    }

    #[test]
    fn test_frame_from_bytes() {
        assert!(Frame::from_slice(&LIST1_FRAME).is_some());
        assert!(Frame::from_slice(&[0x7e]).is_none());
        assert!(Frame::from_slice(&[0x7e, 0x00]).is_none());
        assert!(Frame::from_slice(&[0x00, 0x7e]).is_none());
    }

    #[test]
    fn test_list_kind_thresholds() {
        assert_eq!(ListKind::from_frame_len(40), None);
        assert_eq!(ListKind::from_frame_len(41), Some(ListKind::List1));
        assert_eq!(ListKind::from_frame_len(100), Some(ListKind::List1));
        assert_eq!(ListKind::from_frame_len(101), Some(ListKind::List2));
        assert_eq!(ListKind::from_frame_len(300), Some(ListKind::List2));
        assert_eq!(ListKind::from_frame_len(301), Some(ListKind::List3));
        assert_eq!(ListKind::List3.to_string(), "List 3");
    }

    fn frame_body() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>().prop_filter("flag", |b| *b != FLAG), 1..64)
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        [&[FLAG][..], body, &[FLAG][..]].concat()
    }

    proptest! {
        #[test]
        fn prop_frame_then_noise(body in frame_body(), noise in proptest::collection::vec(any::<u8>(), 0..32)) {
            let frame = framed(&body);
            let mut buffer = BytesMut::from(&frame[..]);
            buffer.extend_from_slice(&noise);

            let extracted = try_extract_frame(&mut buffer).unwrap();
            prop_assert_eq!(extracted.as_bytes(), &frame[..]);
            prop_assert_eq!(&buffer[..], &noise[..]);
        }

        #[test]
        fn prop_doubled_flag_separates(first in frame_body(), second in frame_body()) {
            let mut buffer = BytesMut::from(&framed(&first)[..]);
            buffer.extend_from_slice(&framed(&second));

            let a = try_extract_frame(&mut buffer).unwrap();
            let b = try_extract_frame(&mut buffer).unwrap();
            prop_assert_eq!(a.as_bytes(), &framed(&first)[..]);
            prop_assert_eq!(b.as_bytes(), &framed(&second)[..]);
            prop_assert!(buffer.is_empty());
        }

        #[test]
        fn prop_strict_prefix_yields_nothing(body in frame_body(), cut in any::<prop::sample::Index>()) {
            let frame = framed(&body);
            let prefix = &frame[..cut.index(frame.len())];
            let mut buffer = BytesMut::from(prefix);

            prop_assert_eq!(try_extract_frame(&mut buffer), None);
            prop_assert_eq!(&buffer[..], prefix);
        }
    }
}
