//! USB device implementation
//!
//! Discovers the sensor by VID/PID, claims its control interface, and
//! performs one raw request/response exchange per call over the bulk
//! endpoint pair. All protocol knowledge lives above, in `hwlink-core`;
//! this backend only moves bytes within a deadline.

use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, In, Out, TransferError};
use nusb::{Endpoint, Interface, MaybeFuture};

use hwlink_core::frame::HW_MONITOR_BUFFER_SIZE;
use hwlink_core::{RawTransfer, TransportError};

use crate::error::{Result, UsbError};

/// Vendor id of the supported sensor family
pub const SENSOR_USB_VENDOR: u16 = 0x8086;

/// Product ids carrying the management channel this backend drives
pub const SENSOR_USB_PRODUCTS: &[u16] = &[0x0AD3, 0x0B07, 0x0B3A];

/// Interface number exposing the bulk command endpoints
const CONTROL_INTERFACE: u8 = 0;

/// Bulk OUT endpoint for requests
const BULK_OUT_EP: u8 = 0x01;

/// Bulk IN endpoint for responses
const BULK_IN_EP: u8 = 0x81;

/// Configuration options for opening a sensor device
#[derive(Debug, Clone, Default)]
pub struct UsbPortConfig {
    /// Device index when several sensors are connected
    pub device_index: usize,
    /// Select by USB serial number instead of index
    pub serial: Option<String>,
}

/// One sensor's command channel over USB bulk transfers
///
/// Implements [`RawTransfer`]; wrap it in
/// [`LockedTransfer`](hwlink_core::LockedTransfer) to share between
/// channels.
pub struct UsbCommandPort {
    interface: Interface,
    out_endpoint: u8,
    in_endpoint: u8,
    product_string: String,
    serial: String,
}

impl UsbCommandPort {
    /// Open the first available sensor device.
    pub fn open() -> Result<Self> {
        Self::open_with_config(UsbPortConfig::default())
    }

    /// Open a sensor device with the specified configuration.
    pub fn open_with_config(config: UsbPortConfig) -> Result<Self> {
        let devices: Vec<_> = nusb::list_devices()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?
            .filter(|d| {
                d.vendor_id() == SENSOR_USB_VENDOR
                    && SENSOR_USB_PRODUCTS.contains(&d.product_id())
            })
            .collect();

        if devices.is_empty() {
            return Err(UsbError::DeviceNotFound);
        }

        let device_info = if let Some(ref serial) = config.serial {
            devices
                .iter()
                .find(|d| d.serial_number() == Some(serial.as_str()))
                .ok_or(UsbError::DeviceNotFound)?
        } else {
            devices
                .get(config.device_index)
                .ok_or(UsbError::DeviceNotFound)?
        };

        log::info!(
            "Opening sensor at bus {} address {}",
            device_info.busnum(),
            device_info.device_address()
        );

        let product_string = device_info.product_string().unwrap_or("").to_string();
        let serial = device_info.serial_number().unwrap_or("").to_string();

        let device = device_info
            .open()
            .wait()
            .map_err(|e| UsbError::OpenFailed(e.to_string()))?;

        let interface = device
            .claim_interface(CONTROL_INTERFACE)
            .wait()
            .map_err(|e| UsbError::ClaimFailed(e.to_string()))?;

        log::info!("Claimed control interface of \"{product_string}\" (serial {serial})");

        Ok(Self {
            interface,
            out_endpoint: BULK_OUT_EP,
            in_endpoint: BULK_IN_EP,
            product_string,
            serial,
        })
    }

    /// Product string reported by the device descriptor.
    pub fn product_string(&self) -> &str {
        &self.product_string
    }

    /// USB serial number reported by the device descriptor.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Bulk write of one request frame.
    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let mut out_ep: Endpoint<Bulk, Out> = self
            .interface
            .endpoint(self.out_endpoint)
            .map_err(|e| UsbError::TransferFailed(e.to_string()))?;

        let mut out_buf = Buffer::new(data.len());
        out_buf.extend_from_slice(data);

        let completion = out_ep.transfer_blocking(out_buf, timeout);
        match completion.into_result() {
            Ok(_) => Ok(()),
            Err(TransferError::Cancelled) => Err(UsbError::Timeout),
            Err(TransferError::Disconnected) => Err(UsbError::Disconnected),
            Err(e) => Err(UsbError::TransferFailed(e.to_string())),
        }
    }

    /// Bulk read of one response buffer.
    fn bulk_read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut in_ep: Endpoint<Bulk, In> = self
            .interface
            .endpoint(self.in_endpoint)
            .map_err(|e| UsbError::TransferFailed(e.to_string()))?;

        let max_packet_size = in_ep.max_packet_size();
        let request_len = buf.len().div_ceil(max_packet_size) * max_packet_size;
        let mut in_buf = Buffer::new(request_len);
        in_buf.set_requested_len(request_len);

        let completion = in_ep.transfer_blocking(in_buf, timeout);
        let data = match completion.into_result() {
            Ok(data) => data,
            Err(TransferError::Cancelled) => return Err(UsbError::Timeout),
            Err(TransferError::Disconnected) => return Err(UsbError::Disconnected),
            Err(e) => return Err(UsbError::TransferFailed(e.to_string())),
        };

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }
}

impl RawTransfer for UsbCommandPort {
    fn transfer(
        &mut self,
        request: &[u8],
        timeout: Duration,
        expect_response: bool,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        self.bulk_write(request, timeout)
            .map_err(TransportError::from)?;

        if !expect_response {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; HW_MONITOR_BUFFER_SIZE];
        let len = self
            .bulk_read(&mut buf, timeout)
            .map_err(TransportError::from)?;
        buf.truncate(len);
        Ok(buf)
    }
}
