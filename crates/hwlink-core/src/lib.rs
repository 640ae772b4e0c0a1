//! hwlink-core - Command/response protocol core for the sensor control channel
//!
//! This crate implements the management-channel protocol a host uses to
//! talk to a sensor device over a narrow, fixed-size control channel: frame
//! encoding, opcode-echo verification, chunked transfers for payloads
//! beyond the per-frame limit, validated binary table decoding, and opt-in
//! retry for transiently-busy devices.
//!
//! The physical transport is injected behind [`transport::RawTransfer`];
//! see the `hwlink-usb` crate for the USB bulk backend. The whole stack is
//! synchronous: each exchange blocks the calling thread until the port
//! replies or times out, and the only lock lives in the transport adapter.
//!
//! # Example
//!
//! ```ignore
//! use hwlink_core::{Command, CommandChannel, channel::opcodes};
//!
//! let port = std::sync::Arc::new(hwlink_core::LockedTransfer::new(raw));
//! let channel = CommandChannel::new(port);
//!
//! let gvd = channel.get_gvd(0x50, opcodes::GVD, None)?;
//! let table = channel.send_extended(
//!     &Command::new(opcodes::GET_CONFIG_TABLE),
//! )?;
//! # Ok::<(), hwlink_core::ProtocolError>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod channel;
pub mod error;
pub mod frame;
pub mod retry;
pub mod tables;
pub mod transport;
pub mod xbuffer;

pub use channel::{Command, CommandChannel};
pub use error::{ParseError, ProtocolError, Result, TransportError};
pub use tables::parse_table;
pub use transport::{LockedTransfer, RawTransfer, TransportPort};
