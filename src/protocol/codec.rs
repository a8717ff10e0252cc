//! Protocol codec
//!
//! Encoding and decoding of frames.
//!
//! ## Wire Format
//!
//! ```text
//! Array        * <count> CRLF <frame> ... <frame>
//! Bulk string  $ <len>   CRLF <len bytes> CRLF        ($-1 CRLF = null)
//! Error        - <message> CRLF
//! Command id   ! <i32 big-endian, 4 bytes> CRLF
//! ```
//!
//! Counts and lengths are decimal ASCII. Arrays only contain non-array
//! frames.

use std::io::{BufRead, ErrorKind, Read, Write};

use bytes::{BufMut, BytesMut};

use crate::error::{Result, SegDbError};

use super::frame::{
    Frame, ARRAY_TAG, BULK_STRING_TAG, COMMAND_ID_TAG, ERROR_TAG, NULL_BULK_LENGTH,
};

const CRLF: &[u8; 2] = b"\r\n";

/// Maximum bulk string size (16 MB)
pub const MAX_BULK_LENGTH: usize = 16 * 1024 * 1024;

/// Maximum number of frames in an array
pub const MAX_ARRAY_LENGTH: usize = 1024;

/// Maximum length of a header or error line
const MAX_LINE_LENGTH: usize = 64 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a frame to bytes
pub fn encode_frame(frame: &Frame) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_into(frame, &mut buf);
    buf
}

/// Append the encoding of `frame` to `buf`
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) {
    match frame {
        Frame::Array(items) => {
            buf.put_u8(ARRAY_TAG);
            buf.put_slice(items.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            for item in items {
                encode_into(item, buf);
            }
        }
        Frame::BulkString(Some(data)) => {
            buf.put_u8(BULK_STRING_TAG);
            buf.put_slice(data.len().to_string().as_bytes());
            buf.put_slice(CRLF);
            buf.put_slice(data);
            buf.put_slice(CRLF);
        }
        Frame::BulkString(None) => {
            buf.put_u8(BULK_STRING_TAG);
            buf.put_slice(NULL_BULK_LENGTH.to_string().as_bytes());
            buf.put_slice(CRLF);
        }
        Frame::Error(message) => {
            buf.put_u8(ERROR_TAG);
            // An error line cannot carry a line break
            for byte in message.bytes() {
                buf.put_u8(if byte == b'\r' || byte == b'\n' { b' ' } else { byte });
            }
            buf.put_slice(CRLF);
        }
        Frame::CommandId(id) => {
            buf.put_u8(COMMAND_ID_TAG);
            buf.put_i32(*id);
            buf.put_slice(CRLF);
        }
    }
}

/// Write a frame to a stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    let bytes = encode_frame(frame);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Decode a single frame from a byte slice
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    FrameReader::new(bytes)
        .read_frame()?
        .ok_or_else(|| SegDbError::Protocol("empty input".to_string()))
}

// =============================================================================
// Decoding
// =============================================================================

/// Reads frames from a buffered stream
pub struct FrameReader<R: BufRead> {
    inner: R,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` on a clean end of stream (before any tag byte).
    /// A stream that ends inside a frame is an `UnexpectedEof` I/O error.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(tag) = self.read_tag()? else {
            return Ok(None);
        };

        if tag == ARRAY_TAG {
            return self.read_array().map(Some);
        }
        self.read_scalar(tag).map(Some)
    }

    fn read_array(&mut self) -> Result<Frame> {
        let count = self.read_number()?;
        if count < 0 {
            return Err(SegDbError::Protocol(format!("invalid array length {}", count)));
        }
        let count = count as usize;
        if count > MAX_ARRAY_LENGTH {
            return Err(SegDbError::Protocol(format!(
                "array too large: {} elements (max {})",
                count, MAX_ARRAY_LENGTH
            )));
        }

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = self
                .read_tag()?
                .ok_or_else(|| SegDbError::Io(ErrorKind::UnexpectedEof.into()))?;
            if tag == ARRAY_TAG {
                return Err(SegDbError::Protocol("nested arrays are not supported".to_string()));
            }
            items.push(self.read_scalar(tag)?);
        }
        Ok(Frame::Array(items))
    }

    fn read_scalar(&mut self, tag: u8) -> Result<Frame> {
        match tag {
            BULK_STRING_TAG => self.read_bulk_string(),
            ERROR_TAG => {
                let line = self.read_line()?;
                Ok(Frame::Error(String::from_utf8_lossy(&line).into_owned()))
            }
            COMMAND_ID_TAG => {
                let mut id = [0u8; 4];
                self.inner.read_exact(&mut id)?;
                self.expect_crlf()?;
                Ok(Frame::CommandId(i32::from_be_bytes(id)))
            }
            other => Err(SegDbError::Protocol(format!(
                "unknown frame tag 0x{:02x}",
                other
            ))),
        }
    }

    fn read_bulk_string(&mut self) -> Result<Frame> {
        let len = self.read_number()?;
        if len == NULL_BULK_LENGTH {
            return Ok(Frame::BulkString(None));
        }
        if len < 0 {
            return Err(SegDbError::Protocol(format!("invalid bulk string length {}", len)));
        }
        let len = len as usize;
        if len > MAX_BULK_LENGTH {
            return Err(SegDbError::Protocol(format!(
                "bulk string too large: {} bytes (max {})",
                len, MAX_BULK_LENGTH
            )));
        }

        let mut data = vec![0u8; len];
        self.inner.read_exact(&mut data)?;
        self.expect_crlf()?;
        Ok(Frame::bulk(data))
    }

    fn read_tag(&mut self) -> Result<Option<u8>> {
        let mut tag = [0u8; 1];
        loop {
            match self.inner.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a line up to CRLF, returning it without the terminator
    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = (&mut self.inner)
            .take(MAX_LINE_LENGTH as u64 + 2)
            .read_until(b'\n', &mut line)?;

        if read == 0 || line.last() != Some(&b'\n') {
            if read as u64 >= MAX_LINE_LENGTH as u64 + 2 {
                return Err(SegDbError::Protocol("line too long".to_string()));
            }
            return Err(SegDbError::Io(ErrorKind::UnexpectedEof.into()));
        }
        if !line.ends_with(CRLF) {
            return Err(SegDbError::Protocol("line not terminated by CRLF".to_string()));
        }
        line.truncate(line.len() - 2);
        Ok(line)
    }

    fn read_number(&mut self) -> Result<i64> {
        let line = self.read_line()?;
        std::str::from_utf8(&line)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                SegDbError::Protocol(format!(
                    "expected a decimal length, got {:?}",
                    String::from_utf8_lossy(&line)
                ))
            })
    }

    fn expect_crlf(&mut self) -> Result<()> {
        let mut end = [0u8; 2];
        self.inner.read_exact(&mut end)?;
        if &end != CRLF {
            return Err(SegDbError::Protocol(format!(
                "expected CRLF, got {:?}",
                String::from_utf8_lossy(&end)
            )));
        }
        Ok(())
    }
}
