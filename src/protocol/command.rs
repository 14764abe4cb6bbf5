//! Command definitions
//!
//! Represents requests from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Get = 0x01,
    Put = 0x02,
    Delete = 0x03,
    Ping = 0x04,
    Find = 0x05,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Get),
            0x02 => Some(CommandType::Put),
            0x03 => Some(CommandType::Delete),
            0x04 => Some(CommandType::Ping),
            0x05 => Some(CommandType::Find),
            _ => None,
        }
    }
}

/// A parsed command
///
/// Version fields carry entity tags; `0` means "no precondition".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read a key, returning NOT_MODIFIED when `if_none_match` is current
    Get { key: Vec<u8>, if_none_match: u64 },

    /// Create (`if_match == 0`) or update a key
    Put {
        key: Vec<u8>,
        value: Vec<u8>,
        if_match: u64,
    },

    /// Delete a key (unconditional)
    Delete { key: Vec<u8> },

    /// Ping (health check)
    Ping,

    /// List keys starting with `prefix`
    Find { prefix: Vec<u8> },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Get { .. } => CommandType::Get,
            Command::Put { .. } => CommandType::Put,
            Command::Delete { .. } => CommandType::Delete,
            Command::Ping => CommandType::Ping,
            Command::Find { .. } => CommandType::Find,
        }
    }
}
