//! MIDI transport seam
//!
//! Output ports are shared behind [`OutputPort`]; every input port pushes the
//! messages it receives onto one ordered inbound queue.

pub mod hardware;
pub mod memory;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::error::Result;

pub use memory::MemoryOutput;

/// An output port that can be written from several tasks
///
/// Implementations serialize concurrent sends themselves.
pub trait OutputPort: Send + Sync {
    /// Port name for logs
    fn name(&self) -> &str;

    /// Send raw MIDI bytes
    fn send(&self, data: &[u8]) -> Result<()>;
}

/// Shared handle to an output port
pub type SharedOutput = Arc<dyn OutputPort>;

/// Which configured device an inbound message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOrigin {
    Source,
    /// Index into the configured target list
    Target(usize),
}

/// A raw message received on an input port
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub origin: PortOrigin,
    pub data: Vec<u8>,
    pub timestamp: Instant,
}

impl InboundEvent {
    pub fn new(origin: PortOrigin, data: impl Into<Vec<u8>>) -> Self {
        Self {
            origin,
            data: data.into(),
            timestamp: Instant::now(),
        }
    }
}

/// Producer side of the inbound queue, one clone per input port
pub type InboundSender = mpsc::UnboundedSender<InboundEvent>;

/// Consumer side of the inbound queue, owned by the router
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundEvent>;

pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

/// Drop the trailing token of an advertised port name
///
/// Port names carry an index suffix ("MPK mini 3 1"); configured device
/// names do not. A name without a space strips to "".
pub fn strip_port_suffix(port_name: &str) -> &str {
    port_name
        .rsplit_once(' ')
        .map(|(device, _)| device)
        .unwrap_or("")
}

/// Index of the first port whose stripped name equals `device_name`
pub fn resolve_port<'a>(
    port_names: impl IntoIterator<Item = &'a str>,
    device_name: &str,
) -> Option<usize> {
    port_names
        .into_iter()
        .position(|name| strip_port_suffix(name) == device_name)
}
