//! PadMatrixHandle - public API for the PadActor
//!
//! Mutations are fire-and-forget so MIDI callbacks never wait on the actor.
//! Queries await a oneshot reply.

use tokio::sync::{mpsc, oneshot};

use super::commands::{BatchSource, PadCommand};
use super::{PadMatrix, PadState, Rgb};
use crate::error::{BridgeError, Result};

/// Cloneable handle to the PadActor
///
/// Every clone feeds the same command queue, so commands from the router and
/// the console bridge are applied in the order they were sent.
#[derive(Clone)]
pub struct PadMatrixHandle {
    cmd_tx: mpsc::UnboundedSender<PadCommand>,
}

impl PadMatrixHandle {
    /// Wrap the sending side of an actor's command queue
    pub fn new(cmd_tx: mpsc::UnboundedSender<PadCommand>) -> Self {
        Self { cmd_tx }
    }

    // =========================================================================
    // Mutations (fire-and-forget)
    //
    // Each mutation that applies is followed by one LED frame. Out-of-range
    // indices are dropped by the actor without a frame.
    // =========================================================================

    /// Flip the `on` flag of a pad
    ///
    /// # Arguments
    /// * `index` - Pad index in configuration order
    pub fn toggle(&self, index: usize) {
        let _ = self.cmd_tx.send(PadCommand::Toggle { index });
    }

    /// Set the `on` flag of a pad
    ///
    /// # Arguments
    /// * `index` - Pad index in configuration order
    /// * `on` - New flag value
    pub fn set_on(&self, index: usize, on: bool) {
        let _ = self.cmd_tx.send(PadCommand::SetOn { index, on });
    }

    /// Change the color a pad shows while lit
    pub fn set_color(&self, index: usize, color: Rgb) {
        let _ = self.cmd_tx.send(PadCommand::SetColor { index, color });
    }

    /// Apply `(index, on)` pairs as one update with a single frame
    ///
    /// # Arguments
    /// * `source` - What produced the batch (logged)
    /// * `updates` - Pairs applied in order; out-of-range pairs are skipped
    pub fn apply_batch(&self, source: BatchSource, updates: Vec<(usize, bool)>) {
        let _ = self.cmd_tx.send(PadCommand::ApplyBatch { source, updates });
    }

    /// Send the current frame again
    pub fn refresh(&self) {
        let _ = self.cmd_tx.send(PadCommand::Refresh);
    }

    /// Send the current frame and wait until the actor has written it
    ///
    /// # Returns
    /// `Err(ActorGone)` if the actor stopped before handling the request
    pub async fn refresh_and_wait(&self) -> Result<()> {
        self.refresh();
        // The actor answers queries in queue order, after the refresh
        self.snapshot().await.map(|_| ())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state of one pad
    ///
    /// # Returns
    /// `None` when the index is out of range or the actor is gone
    pub async fn get(&self, index: usize) -> Option<PadState> {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(PadCommand::Get { index, response }).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Copy of the whole matrix
    ///
    /// Resolves after every command sent before it has been processed.
    ///
    /// # Returns
    /// `Err(ActorGone)` if the actor stopped
    pub async fn snapshot(&self) -> Result<PadMatrix> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx
            .send(PadCommand::Snapshot { response })
            .map_err(|_| BridgeError::ActorGone)?;
        rx.await.map_err(|_| BridgeError::ActorGone)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Whether the actor is still accepting commands
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Ask the actor to stop after the commands already queued
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(PadCommand::Shutdown);
    }
}
