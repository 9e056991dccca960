//! Router module - relays MIDI between the source and target devices
//!
//! Every input port feeds one ordered queue. The router drains it:
//! - source messages go to every target, and in switch mode a pressed pad
//!   toggles its LED through the PadActor
//! - target messages go back to the source only


use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::Mode;
use crate::context::BridgeContext;
use crate::midi::{format_hex, MidiMessage};
use crate::pads::PadMatrixHandle;
use crate::transport::{InboundEvent, InboundReceiver, PortOrigin, SharedOutput};

/// Routes inbound events to their outputs
pub struct EventRouter {
    ctx: Arc<BridgeContext>,
    /// Source device output
    source: SharedOutput,
    /// Opened target outputs, in configuration order
    targets: Vec<SharedOutput>,
    pads: PadMatrixHandle,
}

impl EventRouter {
    /// Build a router over already opened outputs
    ///
    /// # Arguments
    /// * `source` - Output of the source device, for target traffic
    /// * `targets` - Outputs of the target devices, in configuration order
    /// * `pads` - Handle used for switch-mode toggles
    pub fn new(
        ctx: Arc<BridgeContext>,
        source: SharedOutput,
        targets: Vec<SharedOutput>,
        pads: PadMatrixHandle,
    ) -> Self {
        Self {
            ctx,
            source,
            targets,
            pads,
        }
    }

    /// Route one inbound event
    ///
    /// Sends happen inline; a failed send is logged and never stops routing.
    pub fn handle(&self, event: &InboundEvent) {
        trace!(
            origin = ?event.origin,
            queued_us = event.timestamp.elapsed().as_micros() as u64,
            "Routing event"
        );

        match event.origin {
            PortOrigin::Source => self.handle_source(&event.data),
            PortOrigin::Target(index) => self.handle_target(index, &event.data),
        }
    }

    fn handle_source(&self, data: &[u8]) {
        if self.ctx.config.mode == Mode::Switch {
            self.toggle_pressed_pad(data);
        }

        for target in &self.targets {
            if let Err(e) = target.send(data) {
                warn!("Forward to target '{}' failed: {}", target.name(), e);
            }
        }
    }

    fn handle_target(&self, index: usize, data: &[u8]) {
        debug!("Target #{} -> source: {}", index, format_hex(data));
        if let Err(e) = self.source.send(data) {
            warn!("Forward from target #{} to source failed: {}", index, e);
        }
    }

    /// CC with a nonzero value on a mapped pad flips that pad
    fn toggle_pressed_pad(&self, data: &[u8]) {
        let Some((cc, value)) = MidiMessage::parse(data).and_then(|m| m.as_control_change())
        else {
            return;
        };

        if value == 0 {
            return;
        }

        match self.ctx.pad_for_cc(cc) {
            Some(index) => {
                debug!(cc, index, "Pad pressed, toggling");
                self.pads.toggle(index);
            }
            None => debug!(cc, "CC does not address a configured pad"),
        }
    }

    /// Drain the inbound queue until every input has been released
    pub async fn run(self, mut rx: InboundReceiver) {
        info!(
            targets = self.targets.len(),
            mode = ?self.ctx.config.mode,
            "Event router started"
        );

        let mut routed: u64 = 0;
        while let Some(event) = rx.recv().await {
            self.handle(&event);
            routed += 1;
        }

        info!(routed, "Event router stopped (inbound queue closed)");
    }

    /// Run the router on its own task
    pub fn spawn(self, rx: InboundReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
