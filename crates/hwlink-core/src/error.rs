//! Error types for the control-channel protocol stack
//!
//! Three layers of failure are kept apart on purpose: the transport never
//! produced a usable reply ([`TransportError`]), the reply arrived but a
//! table inside it failed validation ([`ParseError`]), and everything a
//! command exchange as a whole can surface ([`ProtocolError`]). A device
//! answering with an error code is a well-formed answer, not a transport
//! fault, and is reported as [`ProtocolError::Device`].

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Transport Port failure: the raw exchange did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No reply arrived within the exchange's deadline
    #[error("transfer timed out")]
    Timeout,

    /// The device went away mid-exchange
    #[error("device disconnected")]
    Disconnected,

    /// Any other transport-level failure
    #[error("transfer failed: {0}")]
    Io(String),
}

/// Table validation failure
///
/// A buffer that trips any of these is discarded whole; partially trusted
/// tables are never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Buffer cannot contain what was asked of it
    #[error("buffer too short: {len} bytes, need at least {need}")]
    TooShort {
        /// Bytes available
        len: usize,
        /// Bytes required
        need: usize,
    },

    /// Header-declared payload size exceeds the containing buffer
    #[error("table declares {declared} payload bytes but only {available} remain")]
    SizeMismatch {
        /// Payload size the header declares
        declared: usize,
        /// Payload bytes actually present
        available: usize,
    },

    /// Stored CRC32 disagrees with the one computed over the payload
    #[error("table CRC mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    CrcMismatch {
        /// CRC32 carried in the table header
        stored: u32,
        /// CRC32 computed over the payload range
        computed: u32,
    },

    /// Table version has no known structural layout
    #[error("unsupported table version 0x{version:04X}")]
    UnsupportedVersion {
        /// The version number found in the header
        version: u16,
    },

    /// Buffer holds a different table than the caller asked to decode
    #[error("wrong table type: expected {expected}, found {found}")]
    WrongTableType {
        /// Table type the caller's layout decodes
        expected: u16,
        /// Table type the header carries
        found: u16,
    },
}

/// Anything a command exchange can surface to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The Transport Port failed or timed out; never retried by the core
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response too short to carry even the echoed-opcode header
    #[error("response too short to carry an opcode echo: {len} bytes")]
    MalformedResponse {
        /// Bytes the transport returned
        len: usize,
    },

    /// The device answered with an error code instead of echoing the opcode
    #[error("device reported \"{name}\" (code {code})")]
    Device {
        /// The status code the device returned in the opcode field
        code: i32,
        /// Fixed human-readable name for the code
        name: &'static str,
    },

    /// Table contents failed structural or integrity validation
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Caller handed a single frame more payload than the channel carries
    #[error("payload of {len} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge {
        /// Payload length the caller supplied
        len: usize,
        /// Per-frame payload limit
        max: usize,
    },

    /// A size-known chunked transfer was requested for an unregistered table
    ///
    /// This is a configuration bug at the call site, not a runtime device
    /// condition.
    #[error("no known transfer size for command 0x{opcode:02X}, table 0x{table_id:04X}")]
    UnknownTransferSize {
        /// Command opcode
        opcode: u8,
        /// Target table id
        table_id: u16,
    },

    /// First chunk of a size-declaring transfer cannot hold a table header
    #[error("first response ({len} bytes) too short to declare a table size")]
    TableTooSmall {
        /// Bytes in the first response
        len: usize,
    },

    /// Retry budget exhausted on a transiently-busy device
    #[error("device not ready after {attempts} attempts, last code {last_code}")]
    DeviceNotReady {
        /// Status code seen on the final attempt
        last_code: i32,
        /// Attempts issued before giving up
        attempts: u32,
    },
}
