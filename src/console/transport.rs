//! Outbound byte sink abstraction
//!
//! Writes are fire-and-forget: `send` only hands the bytes over and reports
//! whether that was possible. Nothing waits for the console.

use bytes::Bytes;

use crate::error::TransportError;

/// Something the console actor can write wire bytes to
pub trait Transport: Send + Sync {
    /// Name used in logs and status output
    fn name(&self) -> &str;

    /// Queue bytes for transmission
    fn send(&self, bytes: Bytes) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Transport that keeps every write for inspection
    #[derive(Clone)]
    pub struct RecordingTransport {
        name: String,
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        connected: Arc<AtomicBool>,
    }

    impl RecordingTransport {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                writes: Arc::new(Mutex::new(Vec::new())),
                connected: Arc::new(AtomicBool::new(true)),
            }
        }

        pub fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().clone()
        }

        pub fn take(&self) -> Vec<Vec<u8>> {
            std::mem::take(&mut *self.writes.lock())
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.store(connected, Ordering::SeqCst);
        }
    }

    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            &self.name
        }

        fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
            if !self.is_connected() {
                return Err(TransportError::NotConnected(self.name.clone()));
            }
            self.writes.lock().push(bytes.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }
}
