//! Commands accepted by the PadActor
//!
//! Mutating commands are fire-and-forget: the actor applies them, re-encodes
//! the matrix and sends the frame to the source device before it looks at the
//! next command. Queries answer over a oneshot channel.

use tokio::sync::oneshot;

use super::{PadMatrix, PadState, Rgb};

/// Why a batch of pad updates was issued (for logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchSource {
    ConsoleParameters,
    ConsoleButtons,
}

#[derive(Debug)]
pub enum PadCommand {
    // -------------------------------------------------------------------------
    // Mutations (each one ends with a frame sent to the source device)
    // -------------------------------------------------------------------------
    /// Flip a pad's `on` flag
    Toggle { index: usize },

    /// Set a pad's `on` flag
    SetOn { index: usize, on: bool },

    /// Change a pad's color
    SetColor { index: usize, color: Rgb },

    /// Set several `on` flags, then send a single frame
    ///
    /// The frame goes out even when no update applied.
    ApplyBatch {
        source: BatchSource,
        updates: Vec<(usize, bool)>,
    },

    /// Re-send the current frame without changing anything
    Refresh,

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------
    Get {
        index: usize,
        response: oneshot::Sender<Option<PadState>>,
    },

    Snapshot {
        response: oneshot::Sender<PadMatrix>,
    },

    /// Stop the actor loop
    Shutdown,
}
