//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET   - Payload: if_none_match (8) + key_len (4) + key
//! - 0x02: PUT   - Payload: if_match (8) + key_len (4) + key + value
//! - 0x03: DEL   - Payload: key_len (4) + key
//! - 0x04: PING  - Payload: empty
//! - 0x05: FIND  - Payload: prefix
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes (HTTP equivalent)
//! - 0x00: OK (200)           - GET: version (8) + last_modified (8) + value; FIND: key list
//! - 0x01: NOT_FOUND (404)
//! - 0x02: ERROR (500)
//! - 0x03: NO_CONTENT (204)   - PUT: new version (8); DELETE: empty
//! - 0x04: NOT_MODIFIED (304) - version (8) + last_modified (8)
//! - 0x05: CONFLICT (409)
//! - 0x06: GONE (410)
//! - 0x07: BAD_REQUEST (400)
//! - 0x08: TOO_LARGE (413)

mod codec;
mod command;
mod response;

pub use codec::{
    decode_command, decode_entry, decode_keys, decode_response, decode_version_tag,
    encode_command, encode_response, read_command, read_response, write_command, write_response,
    HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{Command, CommandType};
pub use response::{Response, Status};
