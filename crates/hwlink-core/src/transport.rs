//! Transport Port abstraction
//!
//! The protocol core treats the physical transport as a byte-in/byte-out
//! remote call with a deadline. Concrete backends (USB bulk, a test mock)
//! implement [`RawTransfer`]; [`LockedTransfer`] serializes access so that
//! several channels can share one device handle. The core performs no
//! locking of its own and assumes at most one in-flight exchange per port.

use std::sync::Mutex;
use std::time::Duration;

use crate::error::TransportError;

/// Default deadline for one exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// One raw request/response exchange against the device
///
/// Implementations need exclusive access for the duration of the exchange;
/// wrap them in [`LockedTransfer`] to share.
pub trait RawTransfer {
    /// Send `request` and return the device's reply within `timeout`.
    ///
    /// When `expect_response` is false the device will not reply; the
    /// implementation returns an empty buffer after the send completes.
    fn transfer(
        &mut self,
        request: &[u8],
        timeout: Duration,
        expect_response: bool,
    ) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Shared handle the protocol core sends through
pub trait TransportPort {
    /// Perform one serialized request/response exchange.
    fn send_receive(
        &self,
        request: &[u8],
        timeout: Duration,
        expect_response: bool,
    ) -> std::result::Result<Vec<u8>, TransportError>;
}

/// Mutex-guarded adapter over a [`RawTransfer`]
///
/// This is the "locked transfer": the only synchronization point in the
/// stack. Concurrent callers queue here; each exchange runs to completion
/// before the next begins.
pub struct LockedTransfer<T: RawTransfer> {
    inner: Mutex<T>,
}

impl<T: RawTransfer> LockedTransfer<T> {
    /// Wrap a raw transfer backend.
    pub fn new(raw: T) -> Self {
        Self {
            inner: Mutex::new(raw),
        }
    }
}

impl<T: RawTransfer> TransportPort for LockedTransfer<T> {
    fn send_receive(
        &self,
        request: &[u8],
        timeout: Duration,
        expect_response: bool,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let mut raw = self
            .inner
            .lock()
            .map_err(|_| TransportError::Io("transport lock poisoned".to_string()))?;
        raw.transfer(request, timeout, expect_response)
    }
}
