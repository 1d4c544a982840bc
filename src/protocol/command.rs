//! Command definitions
//!
//! Represents requests from clients. Bodies stay as raw JSON here; the
//! engine validates them so field errors surface as 400 responses.

use serde_json::Value;

use crate::state::UserId;

static NULL_BODY: Value = Value::Null;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    GetState = 0x01,
    SaveBook = 0x02,
    DeleteBook = 0x03,
    SaveShelf = 0x04,
    DeleteShelf = 0x05,
    AddShelfMembers = 0x06,
    Import = 0x07,
    UpdateProfile = 0x08,
    UploadAvatar = 0x09,
    ResetAll = 0x0A,
    Ping = 0x0B,
}

impl CommandType {
    /// Parse a command byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        let command_type = match byte {
            0x01 => CommandType::GetState,
            0x02 => CommandType::SaveBook,
            0x03 => CommandType::DeleteBook,
            0x04 => CommandType::SaveShelf,
            0x05 => CommandType::DeleteShelf,
            0x06 => CommandType::AddShelfMembers,
            0x07 => CommandType::Import,
            0x08 => CommandType::UpdateProfile,
            0x09 => CommandType::UploadAvatar,
            0x0A => CommandType::ResetAll,
            0x0B => CommandType::Ping,
            _ => return None,
        };
        Some(command_type)
    }

    /// Method and path of the equivalent HTTP endpoint (for logs)
    pub fn route(&self) -> (&'static str, &'static str) {
        match self {
            CommandType::GetState => ("GET", "/state/{user}"),
            CommandType::SaveBook => ("POST", "/state/book"),
            CommandType::DeleteBook => ("POST", "/state/book/delete"),
            CommandType::SaveShelf => ("POST", "/state/shelf"),
            CommandType::DeleteShelf => ("POST", "/state/shelf/delete"),
            CommandType::AddShelfMembers => ("POST", "/state/shelf/members"),
            CommandType::Import => ("POST", "/state/import"),
            CommandType::UpdateProfile => ("POST", "/state/profile"),
            CommandType::UploadAvatar => ("POST", "/state/avatar"),
            CommandType::ResetAll => ("POST", "/state/reset"),
            CommandType::Ping => ("GET", "/ping"),
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Unified view of every book, plus shelves, profile and stats
    GetState { user: UserId },

    /// `{id, status?, progress_percent?, shelves?, ...metadata}`
    SaveBook { user: UserId, body: Value },

    /// `{id}`
    DeleteBook { user: UserId, body: Value },

    /// `{id?, name, is_public?}`
    SaveShelf { user: UserId, body: Value },

    /// `{id}`
    DeleteShelf { user: UserId, body: Value },

    /// `{shelfId, bookIds}`
    AddShelfMembers { user: UserId, body: Value },

    /// `{books: [{title, status}]}`
    Import { user: UserId, body: Value },

    /// `{key: value, ...}`
    UpdateProfile { user: UserId, body: Value },

    /// Raw image bytes plus the uploaded filename
    UploadAvatar {
        user: UserId,
        filename: String,
        data: Vec<u8>,
    },

    /// Drop every status and progress record of the user
    ResetAll { user: UserId },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::GetState { .. } => CommandType::GetState,
            Command::SaveBook { .. } => CommandType::SaveBook,
            Command::DeleteBook { .. } => CommandType::DeleteBook,
            Command::SaveShelf { .. } => CommandType::SaveShelf,
            Command::DeleteShelf { .. } => CommandType::DeleteShelf,
            Command::AddShelfMembers { .. } => CommandType::AddShelfMembers,
            Command::Import { .. } => CommandType::Import,
            Command::UpdateProfile { .. } => CommandType::UpdateProfile,
            Command::UploadAvatar { .. } => CommandType::UploadAvatar,
            Command::ResetAll { .. } => CommandType::ResetAll,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Acting user, `None` for `Ping`
    pub fn user(&self) -> Option<UserId> {
        match self {
            Command::GetState { user }
            | Command::SaveBook { user, .. }
            | Command::DeleteBook { user, .. }
            | Command::SaveShelf { user, .. }
            | Command::DeleteShelf { user, .. }
            | Command::AddShelfMembers { user, .. }
            | Command::Import { user, .. }
            | Command::UpdateProfile { user, .. }
            | Command::UploadAvatar { user, .. }
            | Command::ResetAll { user } => Some(*user),
            Command::Ping => None,
        }
    }

    /// JSON body, `Null` for commands without one
    pub fn body(&self) -> &Value {
        match self {
            Command::SaveBook { body, .. }
            | Command::DeleteBook { body, .. }
            | Command::SaveShelf { body, .. }
            | Command::DeleteShelf { body, .. }
            | Command::AddShelfMembers { body, .. }
            | Command::Import { body, .. }
            | Command::UpdateProfile { body, .. } => body,
            _ => &NULL_BODY,
        }
    }
}
