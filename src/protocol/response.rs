//! Response definitions
//!
//! Represents responses to clients. Every body is a JSON object carrying
//! `"status": "success"` or `"status": "error"`.

use serde_json::{json, Map, Value};

use crate::error::ShelfError;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    BadRequest = 0x01,
    NotFound = 0x02,
    Unsupported = 0x03,
    Error = 0x04,
}

impl Status {
    /// Parse a status byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::BadRequest),
            0x02 => Some(Status::NotFound),
            0x03 => Some(Status::Unsupported),
            0x04 => Some(Status::Error),
            _ => None,
        }
    }

    /// Equivalent HTTP status code
    pub fn http_code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Unsupported => 501,
            Status::Error => 500,
        }
    }

    /// Status for an HTTP code (unknown codes map to `Error`)
    pub fn from_http_code(code: u16) -> Self {
        match code {
            200 => Status::Ok,
            400 => Status::BadRequest,
            404 => Status::NotFound,
            501 => Status::Unsupported,
            _ => Status::Error,
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// JSON object body
    pub body: Value,
}

impl Response {
    /// Create a success response from `fields`
    ///
    /// Non-object `fields` are placed under `"data"`. The `"status"` key is
    /// always `"success"`.
    pub fn success(fields: Value) -> Self {
        let mut body = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        body.insert("status".to_string(), Value::from("success"));
        Self {
            status: Status::Ok,
            body: Value::Object(body),
        }
    }

    /// Create a bare acknowledgement
    pub fn ack() -> Self {
        Self::success(Value::Null)
    }

    /// Create an error response for `error`
    pub fn from_error(error: &ShelfError) -> Self {
        let code = error.status_code();
        Self {
            status: Status::from_http_code(code),
            body: json!({
                "status": "error",
                "code": code,
                "message": error.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Ok
    }

    /// Error message, if this is an error response
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}
