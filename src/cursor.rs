use nom::Parser;

use crate::Error;

/// Read position over a borrowed byte buffer.
///
/// Every read advances the position and nothing ever rewinds it. Reading past the end
/// yields [`Error::Truncated`] and leaves the position untouched, so
/// `position() <= len()` holds at every observation point.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Bytes consumed since `start`, which must be a position previously observed on
    /// this cursor.
    pub fn since(&self, start: usize) -> &'a [u8] {
        &self.buf[start.min(self.pos)..self.pos]
    }

    /// Returns the next byte without consuming it.
    pub fn peek(&self) -> Result<u8, Error> {
        self.rest().first().copied().ok_or(Error::Truncated)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.take(n).map(|_| ())
    }

    /// Consumes exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if n > self.remaining() {
            return Err(Error::Truncated);
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Runs a nom parser over the unread tail and advances by what it consumed.
    pub fn parse<P>(&mut self, mut parser: P) -> Result<P::Output, Error>
    where
        P: Parser<&'a [u8], Error = nom::error::Error<&'a [u8]>>,
    {
        let (rest, value) = parser.parse(self.rest())?;
        self.pos = self.buf.len() - rest.len();
        Ok(value)
    }
}
