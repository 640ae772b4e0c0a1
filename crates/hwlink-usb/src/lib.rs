//! hwlink-usb - USB bulk transport backend for the sensor control channel
//!
//! Realizes the `hwlink-core` transfer trait over a pair of USB bulk
//! endpoints. The backend contains no protocol logic: it sends one frame,
//! optionally reads one reply within the deadline, and reports everything
//! else as a transport failure.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hwlink_core::{Command, CommandChannel, LockedTransfer};
//! use hwlink_core::channel::opcodes;
//! use hwlink_usb::UsbCommandPort;
//!
//! let port = UsbCommandPort::open()?;
//! println!("Device: {}", port.product_string());
//!
//! let channel = CommandChannel::new(Arc::new(LockedTransfer::new(port)));
//! let gvd = channel.get_gvd(0x50, opcodes::GVD, None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod device;
mod error;

pub use device::{UsbCommandPort, UsbPortConfig, SENSOR_USB_PRODUCTS, SENSOR_USB_VENDOR};
pub use error::{Result, UsbError};
