//! Pull-based read loop over a serial port, capture file or any other [`Read`] source.
//!
//! ```no_run
//! use std::fs::File;
//! use han_dlms::FrameReader;
//!
//! # fn main() -> std::io::Result<()> {
//! for decoded in FrameReader::new(File::open("capture.bin")?) {
//!     match decoded {
//!         Ok(frame) => {
//!             for measurement in frame.measurements() {
//!                 println!("{measurement}");
//!             }
//!         }
//!         Err(err) => eprintln!("{err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{self, Read};

use bytes::{Buf, BytesMut};

use crate::{
    Error,
    frame::{FLAG, Frame, MAX_FRAME_SIZE, try_extract_frame},
    hdlc::{DecodedFrame, decode_frame},
};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The source failed. Iteration stops after this.
    #[error("failed to read from source: {0}")]
    Io(#[from] io::Error),
    /// One frame could not be decoded. The stream moves on to the next frame.
    #[error("failed to decode {frame:?}: {error}")]
    Decode {
        frame: Frame,
        #[source]
        error: Error,
    },
}

/// Reads chunks from `R`, extracts frames and decodes them.
///
/// As an [`Iterator`] it yields one item per extracted frame and ends at end of input
/// or after the first I/O error. A frame that fails to decode is yielded as
/// [`StreamError::Decode`] and does not end iteration.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buffer: BytesMut,
    chunk_size: usize,
    max_buffered: usize,
    eof: bool,
    failed: bool,
}

impl<R: Read> FrameReader<R> {
    pub const DEFAULT_CHUNK_SIZE: usize = 256;

    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            max_buffered: MAX_FRAME_SIZE,
            eof: false,
            failed: false,
        }
    }

    /// Bytes requested from the source per read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Bytes held without a complete frame before older bytes are dropped.
    ///
    /// Complete frames are always extracted first, so a single large read or
    /// [`feed`](Self::feed) never loses them.
    pub fn with_max_buffered(mut self, max_buffered: usize) -> Self {
        self.max_buffered = max_buffered.max(2);
        self
    }

    /// Appends bytes ahead of anything still to be read from the source.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes read but not yet part of an extracted frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads until a complete frame is buffered.
    ///
    /// Returns `Ok(None)` at end of input. Bytes of an unfinished frame at that point
    /// stay in [`buffered`](Self::buffered).
    pub fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if let Some(frame) = try_extract_frame(&mut self.buffer) {
                return Ok(Some(frame));
            }
            self.enforce_limit();
            if self.eof {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        let start = self.buffer.len();
        self.buffer.resize(start + self.chunk_size, 0);

        let read = loop {
            match self.inner.read(&mut self.buffer[start..]) {
                Ok(read) => break read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.buffer.truncate(start);
                    return Err(err);
                }
            }
        };
        self.buffer.truncate(start + read);

        if read == 0 {
            self.eof = true;
            if !self.buffer.is_empty() {
                log::debug!("end of input with {} unframed bytes: {}", self.buffer.len(), hex::encode(&self.buffer));
            }
        } else {
            log::trace!("read {} bytes", read);
        }

        Ok(())
    }

    /// Drops everything before the last flag once the buffer grows past its limit.
    ///
    /// Only called when no complete frame is buffered.
    fn enforce_limit(&mut self) {
        let len = self.buffer.len();
        if len <= self.max_buffered {
            return;
        }

        let keep_from = match self.buffer.iter().rposition(|&b| b == FLAG) {
            Some(last_flag) if len - last_flag <= self.max_buffered => last_flag,
            _ => len,
        };
        log::warn!("{} bytes buffered without a complete frame, dropping {} bytes", len, keep_from);
        self.buffer.advance(keep_from);
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<DecodedFrame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_frame() {
            Ok(Some(frame)) => Some(decode_frame(&frame).map_err(|error| {
                log::warn!("skipping frame of {} bytes: {}", frame.len(), error);
                StreamError::Decode { frame, error }
            })),
            Ok(None) => None,
            Err(err) => {
                log::warn!("stopping after read error: {}", err);
                self.failed = true;
                Some(Err(StreamError::Io(err)))
            }
        }
    }
}
