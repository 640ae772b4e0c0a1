//! Error types for the USB transport backend

use hwlink_core::TransportError;
use thiserror::Error;

/// Result type for USB transport operations
pub type Result<T> = std::result::Result<T, UsbError>;

/// Errors raised while opening or driving the USB device
#[derive(Debug, Error)]
pub enum UsbError {
    /// No matching device on the bus
    #[error("sensor device not found")]
    DeviceNotFound,

    /// Failed to open the device
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to claim the control interface
    #[error("failed to claim interface: {0}")]
    ClaimFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {0}")]
    TransferFailed(String),

    /// Transfer deadline expired
    #[error("timeout during USB transfer")]
    Timeout,

    /// Device went away mid-transfer
    #[error("device disconnected")]
    Disconnected,
}

impl From<nusb::Error> for UsbError {
    fn from(e: nusb::Error) -> Self {
        UsbError::TransferFailed(e.to_string())
    }
}

impl From<UsbError> for TransportError {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::Timeout => TransportError::Timeout,
            UsbError::Disconnected => TransportError::Disconnected,
            other => TransportError::Io(other.to_string()),
        }
    }
}
