//! Response definitions
//!
//! A command answers with exactly one frame: a bulk string (possibly null)
//! on success, an error frame on failure.

use bytes::Bytes;

use super::frame::Frame;

/// The result of executing a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Optional payload (status message, value or previous value)
    Success(Option<Vec<u8>>),

    /// Error message, already rendered with its cause chain
    Error(String),
}

impl Response {
    /// Success carrying a payload
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Response::Success(Some(payload.into()))
    }

    /// Success without a payload (serialized as a null bulk string)
    pub fn null() -> Self {
        Response::Success(None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    pub fn into_frame(self) -> Frame {
        match self {
            Response::Success(payload) => Frame::BulkString(payload.map(Bytes::from)),
            Response::Error(message) => Frame::Error(message),
        }
    }

    /// Interpret a frame received from a server
    ///
    /// Returns `None` for frames a server never answers with.
    pub fn from_frame(frame: Frame) -> Option<Self> {
        match frame {
            Frame::BulkString(payload) => Some(Response::Success(payload.map(|p| p.to_vec()))),
            Frame::Error(message) => Some(Response::Error(message)),
            Frame::Array(_) | Frame::CommandId(_) => None,
        }
    }
}
