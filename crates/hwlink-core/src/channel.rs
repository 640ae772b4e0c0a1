//! Command Channel: one request/response exchange per call
//!
//! The channel encodes a [`Command`] through the frame codec, hands it to
//! the Transport Port, and verifies the echoed opcode. A device that echoes
//! something else is answering with a status code; that is mapped to
//! [`ProtocolError::Device`] rather than a transport failure. No retries,
//! no state between calls.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ProtocolError, Result};
use crate::frame;
use crate::transport::{TransportPort, DEFAULT_TIMEOUT};

/// Command opcodes understood by the sensor's management channel
pub mod opcodes {
    /// Read the firmware log buffer
    pub const GET_FW_LOG: u8 = 0x0F;
    /// Read the version/date block (GVD)
    pub const GVD: u8 = 0x10;
    /// Read a calibration table
    pub const GET_CALIB_TABLE: u8 = 0x15;
    /// Write a calibration table
    pub const SET_CALIB_TABLE: u8 = 0x16;
    /// Read a burst of raw flash
    pub const READ_FLASH: u8 = 0x09;
    /// Write a burst of raw flash
    pub const WRITE_FLASH: u8 = 0x0A;
    /// Read a configuration table, whole or by id
    pub const GET_CONFIG_TABLE: u8 = 0xA6;
    /// Write a configuration table
    pub const SET_CONFIG_TABLE: u8 = 0xA7;
}

/// Status codes the device reports in place of the echoed opcode
pub mod status {
    /// Command completed
    pub const SUCCESS: i32 = 0;
    /// Opcode not recognized by this firmware
    pub const INVALID_COMMAND: i32 = -1;
    /// A parameter was outside the accepted range
    pub const PARAM_OUT_OF_RANGE: i32 = -2;
    /// Requested table is not present on the device
    pub const TABLE_NOT_EXIST: i32 = -3;
    /// Requested table exists but holds no data
    pub const TABLE_IS_EMPTY: i32 = -4;
    /// Device cannot service the command yet
    pub const DEVICE_BUSY: i32 = -5;
    /// Integrity check failed on the device side
    pub const CRC_ERROR: i32 = -6;
    /// Flash write did not complete
    pub const FLASH_WRITE_FAILED: i32 = -7;
    /// Device-internal operation timed out
    pub const RESPONSE_TIMEOUT: i32 = -8;
}

/// Fixed, hardware-defined name for a device status code
///
/// Unknown codes are reported as unrecognized, never guessed.
pub fn response_name(code: i32) -> &'static str {
    match code {
        status::SUCCESS => "success",
        status::INVALID_COMMAND => "invalid command",
        status::PARAM_OUT_OF_RANGE => "parameter out of range",
        status::TABLE_NOT_EXIST => "table not exist",
        status::TABLE_IS_EMPTY => "table is empty",
        status::DEVICE_BUSY => "device busy",
        status::CRC_ERROR => "CRC error",
        status::FLASH_WRITE_FAILED => "flash write failed",
        status::RESPONSE_TIMEOUT => "timeout",
        _ => "unrecognized",
    }
}

/// One command to exchange over the channel
///
/// Immutable during the exchange. `param4` is reserved by the extended
/// buffer layer to carry chunk position; callers of chunked commands must
/// leave it at 0.
#[derive(Debug, Clone)]
pub struct Command {
    /// Opcode, widened to a 4-byte field on the wire
    pub opcode: u8,
    /// First command parameter (table id for table reads)
    pub param1: u32,
    /// Second command parameter
    pub param2: u32,
    /// Third command parameter
    pub param3: u32,
    /// Fourth command parameter; reserved for chunk position
    pub param4: u32,
    /// Payload carried in the request frame
    pub data: Vec<u8>,
    /// Whether the device is expected to reply
    pub require_response: bool,
    /// Deadline for the exchange
    pub timeout: Duration,
}

impl Command {
    /// New command with default parameters and a 5000 ms timeout.
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            param1: 0,
            param2: 0,
            param3: 0,
            param4: 0,
            data: Vec::new(),
            require_response: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the first parameter.
    pub fn with_param1(mut self, value: u32) -> Self {
        self.param1 = value;
        self
    }

    /// Set the second parameter.
    pub fn with_param2(mut self, value: u32) -> Self {
        self.param2 = value;
        self
    }

    /// Set the third parameter.
    pub fn with_param3(mut self, value: u32) -> Self {
        self.param3 = value;
        self
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Mark the command one-directional: the device will not reply.
    pub fn one_directional(mut self) -> Self {
        self.require_response = false;
        self
    }

    /// Override the exchange deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Command channel over a shared Transport Port
pub struct CommandChannel<P: TransportPort + ?Sized> {
    port: Arc<P>,
}

impl<P: TransportPort + ?Sized> Clone for CommandChannel<P> {
    fn clone(&self) -> Self {
        Self {
            port: Arc::clone(&self.port),
        }
    }
}

impl<P: TransportPort + ?Sized> CommandChannel<P> {
    /// New channel over `port`. Several channels may share one port; the
    /// port itself serializes exchanges.
    pub fn new(port: Arc<P>) -> Self {
        Self { port }
    }

    /// Perform exactly one request/response exchange.
    ///
    /// One-directional commands return an empty payload as soon as the send
    /// completes. Transport failures surface untouched; retry, if any, is
    /// the retry policy's business, layered outside.
    pub fn send(&self, command: &Command) -> Result<Vec<u8>> {
        let request = frame::encode_request(
            command.opcode,
            command.param1,
            command.param2,
            command.param3,
            command.param4,
            &command.data,
        )?;

        if !command.require_response {
            log::debug!("opcode 0x{:02X}: one-directional send", command.opcode);
            self.port.send_receive(&request, command.timeout, false)?;
            return Ok(Vec::new());
        }

        let response = self.port.send_receive(&request, command.timeout, true)?;
        let (echoed, payload) = frame::decode_response(&response)?;

        if echoed != command.opcode as u32 {
            let code = echoed as i32;
            log::debug!(
                "opcode 0x{:02X}: device answered code {} ({})",
                command.opcode,
                code,
                response_name(code)
            );
            return Err(ProtocolError::Device {
                code,
                name: response_name(code),
            });
        }

        log::debug!(
            "opcode 0x{:02X}: {} payload bytes",
            command.opcode,
            payload.len()
        );
        Ok(payload.to_vec())
    }
}
