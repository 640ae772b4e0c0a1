//! Bounded retry for transiently-busy devices
//!
//! Opt-in per call site. Most commands must never be retried silently — a
//! busy or error code on a write is a meaningful answer — so nothing here
//! is wired into the plain send path. The policy exists for version/date
//! style reads that a device answers with a busy code while it is still
//! initializing.

use std::time::Duration;

use crate::channel::{status, Command, CommandChannel};
use crate::error::{ProtocolError, Result};
use crate::transport::TransportPort;

/// Delay between retry attempts
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Attempts issued before giving up
pub const MAX_ATTEMPTS: u32 = 50;

/// Bounded retry-with-delay over a set of transient status codes
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Sleep between attempts
    pub interval: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Status codes worth retrying; everything else propagates immediately
    pub retryable: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: RETRY_INTERVAL,
            max_attempts: MAX_ATTEMPTS,
            retryable: vec![status::DEVICE_BUSY],
        }
    }
}

impl RetryPolicy {
    /// Policy retrying the given status codes with the default bounds.
    pub fn for_codes(retryable: &[i32]) -> Self {
        Self {
            retryable: retryable.to_vec(),
            ..Self::default()
        }
    }
}

/// Byte offsets of fixed fields inside the version/date block
pub mod gvd {
    /// Firmware version, 4 bytes, minor-first
    pub const FW_VERSION_OFFSET: usize = 12;
    /// Module serial number
    pub const MODULE_SERIAL_OFFSET: usize = 48;
    /// Serial number width in bytes
    pub const MODULE_SERIAL_SIZE: usize = 6;
}

/// Render the firmware version field of a version/date block.
pub fn fw_version_string(block: &[u8]) -> Option<String> {
    let bytes = block.get(gvd::FW_VERSION_OFFSET..gvd::FW_VERSION_OFFSET + 4)?;
    Some(format!(
        "{}.{}.{}.{}",
        bytes[3], bytes[2], bytes[1], bytes[0]
    ))
}

/// Render the module serial field of a version/date block as hex digits.
pub fn module_serial_string(block: &[u8]) -> Option<String> {
    let bytes =
        block.get(gvd::MODULE_SERIAL_OFFSET..gvd::MODULE_SERIAL_OFFSET + gvd::MODULE_SERIAL_SIZE)?;
    Some(bytes.iter().map(|b| format!("{b:02X}")).collect())
}

impl<P: TransportPort + ?Sized> CommandChannel<P> {
    /// Send `command`, retrying while the device reports a code in the
    /// policy's retryable set.
    ///
    /// Succeeds on the first echo-correct response. A non-retryable error
    /// — device code, transport failure, framing — propagates immediately.
    /// An exhausted budget fails with [`ProtocolError::DeviceNotReady`]
    /// carrying the last code seen.
    pub fn send_with_retry(&self, command: &Command, policy: &RetryPolicy) -> Result<Vec<u8>> {
        let mut last_code = status::SUCCESS;

        for attempt in 1..=policy.max_attempts {
            match self.send(command) {
                Ok(payload) => return Ok(payload),
                Err(ProtocolError::Device { code, .. }) if policy.retryable.contains(&code) => {
                    last_code = code;
                    log::debug!(
                        "opcode 0x{:02X}: device not ready (code {code}), attempt {attempt}/{}",
                        command.opcode,
                        policy.max_attempts
                    );
                    if attempt < policy.max_attempts {
                        std::thread::sleep(policy.interval);
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(ProtocolError::DeviceNotReady {
            last_code,
            attempts: policy.max_attempts,
        })
    }

    /// Read `size` bytes of the version/date block with the given opcode,
    /// retrying transient busy codes.
    ///
    /// `retryable` overrides the default busy-only set. The device
    /// answering fewer than `size` bytes is an error — the block cannot
    /// contain the fields the caller will read. Longer blocks are
    /// truncated to `size`.
    pub fn get_gvd(&self, size: usize, opcode: u8, retryable: Option<&[i32]>) -> Result<Vec<u8>> {
        let policy = match retryable {
            Some(codes) => RetryPolicy::for_codes(codes),
            None => RetryPolicy::default(),
        };
        self.get_gvd_with_policy(size, opcode, &policy)
    }

    /// [`get_gvd`](Self::get_gvd) with full control over the retry bounds.
    pub fn get_gvd_with_policy(
        &self,
        size: usize,
        opcode: u8,
        policy: &RetryPolicy,
    ) -> Result<Vec<u8>> {
        let mut payload = self.send_with_retry(&Command::new(opcode), policy)?;
        if payload.len() < size {
            return Err(ProtocolError::MalformedResponse {
                len: payload.len(),
            });
        }
        payload.truncate(size);
        Ok(payload)
    }
}
