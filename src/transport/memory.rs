//! In-memory output port
//!
//! Records everything sent to it, so routing can be exercised without MIDI
//! hardware.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::OutputPort;
use crate::error::{BridgeError, Result};
use crate::midi::format_hex;

pub struct MemoryOutput {
    name: String,
    sent: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl MemoryOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Copy of every message sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    /// Drain the recorded messages
    pub fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl OutputPort for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Send {
                port: self.name.clone(),
                message: "port unavailable".to_string(),
            });
        }

        debug!("TX -> {} (memory): {}", self.name, format_hex(data));
        self.sent.lock().push(data.to_vec());
        Ok(())
    }
}
