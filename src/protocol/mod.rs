//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Framed JSON)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │ EnvLen (4) │ Envelope (JSON) │ Attachment │
//! └──────────┴──────────┴─────────────────────────────────────────────┘
//! ```
//! The envelope is `{"user": <id>, "body": {...}, "filename": "..."}`;
//! only avatar uploads carry an attachment.
//!
//! ### Commands
//! - 0x01: GET_STATE          GET  /state/{user}
//! - 0x02: SAVE_BOOK          POST /state/book
//! - 0x03: DELETE_BOOK        POST /state/book/delete
//! - 0x04: SAVE_SHELF         POST /state/shelf
//! - 0x05: DELETE_SHELF       POST /state/shelf/delete
//! - 0x06: ADD_SHELF_MEMBERS  POST /state/shelf/members
//! - 0x07: IMPORT             POST /state/import
//! - 0x08: UPDATE_PROFILE     POST /state/profile
//! - 0x09: UPLOAD_AVATAR      POST /state/avatar
//! - 0x0A: RESET_ALL          POST /state/reset
//! - 0x0B: PING
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │     Body (JSON object)      │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK            (200)
//! - 0x01: BAD_REQUEST   (400)
//! - 0x02: NOT_FOUND     (404)
//! - 0x03: UNSUPPORTED   (501)
//! - 0x04: ERROR         (500)

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
