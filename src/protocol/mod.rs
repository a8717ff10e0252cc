//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frames
//! ```text
//! ┌─────┬──────────────────────────────┬──────────────────────────────┐
//! │ Tag │ Header                       │ Body                         │
//! ├─────┼──────────────────────────────┼──────────────────────────────┤
//! │  *  │ element count, CRLF          │ `count` non-array frames     │
//! │  $  │ byte length (-1 = null), CRLF│ bytes, CRLF                  │
//! │  -  │ message, CRLF                │                              │
//! │  !  │ 4-byte big-endian id, CRLF   │                              │
//! └─────┴──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! ### Requests
//! An array: command id, command name, then the arguments.
//!
//! | Command         | Elements | Arguments                    |
//! |-----------------|----------|------------------------------|
//! | CREATE_DATABASE | 3        | database                     |
//! | CREATE_TABLE    | 4        | database, table              |
//! | SET_KEY         | 6        | database, table, key, value  |
//! | GET_KEY         | 5        | database, table, key         |
//! | DELETE_KEY      | 5        | database, table, key         |
//!
//! ### Responses
//! One bulk string on success (null when there is no value), one error
//! frame on failure.

mod codec;
mod command;
mod frame;
mod response;

pub use codec::{
    decode_frame, encode_frame, encode_into, write_frame, FrameReader, MAX_ARRAY_LENGTH,
    MAX_BULK_LENGTH,
};
pub use command::{ArgumentError, Command, CommandType, Request};
pub use frame::Frame;
pub use response::Response;
