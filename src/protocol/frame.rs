//! Frame definitions
//!
//! The four frame kinds of the wire protocol.

use bytes::Bytes;

/// Tag byte of an array frame
pub const ARRAY_TAG: u8 = b'*';

/// Tag byte of a bulk string frame
pub const BULK_STRING_TAG: u8 = b'$';

/// Tag byte of an error frame
pub const ERROR_TAG: u8 = b'-';

/// Tag byte of a command id frame
pub const COMMAND_ID_TAG: u8 = b'!';

/// Length announced by a null bulk string
pub const NULL_BULK_LENGTH: i64 = -1;

/// A decoded wire frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `*<count>\r\n` followed by `count` frames
    Array(Vec<Frame>),

    /// `$<len>\r\n<bytes>\r\n`, or `$-1\r\n` for `None`
    BulkString(Option<Bytes>),

    /// `-<message>\r\n`
    Error(String),

    /// `!` + 4-byte big-endian id + `\r\n`
    CommandId(i32),
}

impl Frame {
    /// A non-null bulk string
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(data.into()))
    }

    /// The null bulk string
    pub fn null() -> Self {
        Frame::BulkString(None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Payload of a non-null bulk string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Frame::BulkString(Some(data)) => Some(data),
            _ => None,
        }
    }

    /// Human readable rendering; arrays join their elements with spaces
    pub fn as_string(&self) -> Option<String> {
        match self {
            Frame::BulkString(Some(data)) => Some(String::from_utf8_lossy(data).into_owned()),
            Frame::BulkString(None) => None,
            Frame::Error(message) => Some(message.clone()),
            Frame::CommandId(id) => Some(id.to_string()),
            Frame::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Frame::as_string)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
        }
    }

    /// Short name of the frame kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Array(_) => "array",
            Frame::BulkString(_) => "bulk string",
            Frame::Error(_) => "error",
            Frame::CommandId(_) => "command id",
        }
    }
}
