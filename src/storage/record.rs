//! Record codec
//!
//! A segment file is nothing but a concatenation of records:
//!
//! ```text
//! ┌──────────────┬───────────┬────────────────┬─────────────┐
//! │ KeyLen i32 BE│ Key bytes │ ValueLen i32 BE│ Value bytes │
//! └──────────────┴───────────┴────────────────┴─────────────┘
//! ```
//!
//! `ValueLen == -1` marks a tombstone; no value bytes follow.

use std::io::{ErrorKind, Read};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, SegDbError};

/// Two 4-byte length prefixes
pub const HEADER_SIZE: u64 = 8;

/// Value length written for a tombstone
pub const TOMBSTONE_MARKER: i32 = -1;

/// A single stored unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A key bound to a value
    Put { key: Vec<u8>, value: Vec<u8> },

    /// A key marked as deleted
    Tombstone { key: Vec<u8> },
}

impl Record {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Record::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Record::Tombstone { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Record::Put { key, .. } | Record::Tombstone { key } => key,
        }
    }

    /// The value, or `None` for a tombstone
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Record::Put { value, .. } => Some(value),
            Record::Tombstone { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            Record::Put { value, .. } => Some(value),
            Record::Tombstone { .. } => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Record::Tombstone { .. })
    }

    /// Size on disk: key + value + 8 header bytes
    pub fn size(&self) -> u64 {
        let value_len = self.value().map_or(0, |v| v.len());
        HEADER_SIZE + self.key().len() as u64 + value_len as u64
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size() as usize);
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoded record to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        let key = self.key();
        buf.put_i32(length_prefix(key.len())?);
        buf.put_slice(key);

        match self.value() {
            Some(value) => {
                buf.put_i32(length_prefix(value.len())?);
                buf.put_slice(value);
            }
            None => buf.put_i32(TOMBSTONE_MARKER),
        }
        Ok(())
    }

    /// Decode exactly one record
    ///
    /// Returns:
    /// - `Ok(Some(record))` — a complete record
    /// - `Ok(None)` — clean end of stream (no bytes left)
    /// - `Err(Corruption)` — truncated or malformed record
    pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Record>> {
        let mut len_buf = [0u8; 4];
        match read_fully(reader, &mut len_buf)? {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(SegDbError::Corruption(format!(
                    "truncated key length: got {} of 4 bytes",
                    n
                )))
            }
        }

        let key_len = i32::from_be_bytes(len_buf);
        if key_len < 0 {
            return Err(SegDbError::Corruption(format!(
                "negative key length {}",
                key_len
            )));
        }
        let key = read_exact_vec(reader, key_len as usize, "key")?;

        if read_fully(reader, &mut len_buf)? != 4 {
            return Err(SegDbError::Corruption(
                "truncated value length".to_string(),
            ));
        }
        let value_len = i32::from_be_bytes(len_buf);

        match value_len {
            TOMBSTONE_MARKER => Ok(Some(Record::Tombstone { key })),
            len if len < 0 => Err(SegDbError::Corruption(format!(
                "invalid value length {}",
                len
            ))),
            len => {
                let value = read_exact_vec(reader, len as usize, "value")?;
                Ok(Some(Record::Put { key, value }))
            }
        }
    }
}

fn length_prefix(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| SegDbError::RecordTooLarge(len))
}

/// Read until `buf` is full or the stream ends; returns bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Read exactly `len` bytes without trusting `len` for the allocation
fn read_exact_vec<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(len.min(64 * 1024));
    let read = reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if read != len {
        return Err(SegDbError::Corruption(format!(
            "truncated {}: expected {} bytes, got {}",
            what, len, read
        )));
    }
    Ok(data)
}

/// Iterates over the records of a segment stream, yielding each record with
/// the offset it starts at.
pub struct RecordReader<R: Read> {
    inner: R,
    offset: u64,
    failed: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            failed: false,
        }
    }

    /// Offset just past the last record read
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next record with its starting offset
    pub fn next_record(&mut self) -> Result<Option<(u64, Record)>> {
        let start = self.offset;
        match Record::decode(&mut self.inner) {
            Ok(Some(record)) => {
                self.offset += record.size();
                Ok(Some((start, record)))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e.context(format!("at offset {}", start))),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
