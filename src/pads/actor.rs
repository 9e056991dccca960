//! PadActor - sole owner of the pad matrix
//!
//! The router (local toggles) and the console bridge (Voicemeeter state)
//! both change pads concurrently. Routing every change through one task makes
//! each read-modify-encode-send sequence atomic with respect to the others:
//! frames are never torn and toggles are never lost.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::actor_handle::PadMatrixHandle;
use super::commands::{BatchSource, PadCommand};
use super::PadMatrix;
use crate::midi::{format_hex, sysex};
use crate::transport::SharedOutput;

/// Task owning the matrix; driven through [`PadMatrixHandle`]
pub struct PadActor {
    matrix: PadMatrix,
    /// Source device output, where LED frames go
    output: SharedOutput,
    command_rx: mpsc::UnboundedReceiver<PadCommand>,
    frames_sent: u64,
}

impl PadActor {
    /// Spawn the actor on the current runtime
    ///
    /// The join handle resolves once the actor has stopped, either through
    /// [`PadMatrixHandle::shutdown`] or when every handle is dropped.
    pub fn spawn(matrix: PadMatrix, output: SharedOutput) -> (PadMatrixHandle, JoinHandle<()>) {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();

        let actor = PadActor {
            matrix,
            output,
            command_rx,
            frames_sent: 0,
        };

        if actor.matrix.is_empty() {
            warn!("PadActor spawned without pads; frames carry only the header");
        }
        info!(pads = actor.matrix.len(), "PadActor spawned");
        let task = tokio::spawn(actor.run());

        (PadMatrixHandle::new(cmd_tx), task)
    }

    async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing pad command");

            match cmd {
                PadCommand::Toggle { index } => {
                    if self.matrix.toggle(index) {
                        debug!(index, "Pad toggled");
                        self.send_frame();
                    } else {
                        debug!(index, "Toggle ignored: pad index out of range");
                    }
                }
                PadCommand::SetOn { index, on } => {
                    if self.matrix.set_on(index, on) {
                        self.send_frame();
                    } else {
                        debug!(index, "SetOn ignored: pad index out of range");
                    }
                }
                PadCommand::SetColor { index, color } => {
                    if self.matrix.set_color(index, color) {
                        self.send_frame();
                    } else {
                        debug!(index, "SetColor ignored: pad index out of range");
                    }
                }
                PadCommand::ApplyBatch { source, updates } => {
                    self.apply_batch(source, &updates);
                    self.send_frame();
                }
                PadCommand::Refresh => self.send_frame(),
                PadCommand::Get { index, response } => {
                    let _ = response.send(self.matrix.get(index).cloned());
                }
                PadCommand::Snapshot { response } => {
                    let _ = response.send(self.matrix.clone());
                }
                PadCommand::Shutdown => {
                    info!("PadActor received shutdown command");
                    break;
                }
            }
        }

        info!(frames_sent = self.frames_sent, "PadActor run loop terminated");
    }

    fn apply_batch(&mut self, source: BatchSource, updates: &[(usize, bool)]) {
        let applied = updates
            .iter()
            .filter(|(index, on)| self.matrix.set_on(*index, *on))
            .count();

        debug!(
            ?source,
            applied,
            requested = updates.len(),
            "Pad batch applied"
        );
    }

    /// Encode the matrix and send it to the source device
    ///
    /// A failed send is logged; the state change it reflects is kept.
    fn send_frame(&mut self) {
        let bytes = sysex(&self.matrix.encode());
        match self.output.send(&bytes) {
            Ok(()) => {
                self.frames_sent += 1;
                trace!("LED frame -> {}: {}", self.output.name(), format_hex(&bytes));
            }
            Err(e) => warn!("Failed to send LED frame: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PadConfig;
    use crate::pads::frame::FRAME_HEADER;
    use crate::pads::Rgb;
    use crate::transport::MemoryOutput;
    use std::sync::Arc;

    fn matrix(count: usize) -> PadMatrix {
        let pads: Vec<PadConfig> = (0..count)
            .map(|i| PadConfig {
                cc: 10 + i as u8,
                rgb: [255, 0, 0],
                is_static: false,
                reverse: false,
            })
            .collect();
        PadMatrix::new(&pads)
    }

    #[tokio::test]
    async fn test_toggle_sends_frame() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(2), output.clone());

        handle.toggle(0);
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.get(0).unwrap().on);

        let sent = output.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], 0xF0);
        assert_eq!(&sent[0][1..7], &FRAME_HEADER);
        assert_eq!(&sent[0][7..13], &[0x0F, 0x0F, 0, 0, 0, 0]);
        assert_eq!(*sent[0].last().unwrap(), 0xF7);
    }

    #[tokio::test]
    async fn test_out_of_range_sends_nothing() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(2), output.clone());

        handle.toggle(5);
        handle.set_on(7, true);
        handle.set_color(9, Rgb::new(1, 1, 1));
        assert_eq!(handle.snapshot().await.unwrap(), matrix(2));
        assert!(output.sent().is_empty());
    }

    #[tokio::test]
    async fn test_batch_sends_one_frame() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(3), output.clone());

        handle.apply_batch(
            BatchSource::ConsoleParameters,
            vec![(0, true), (1, true), (2, false), (42, true)],
        );
        let snapshot = handle.snapshot().await.unwrap();

        assert!(snapshot.get(0).unwrap().on);
        assert!(snapshot.get(1).unwrap().on);
        assert!(!snapshot.get(2).unwrap().on);
        assert_eq!(output.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_still_sends() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(1), output.clone());

        handle.apply_batch(BatchSource::ConsoleButtons, Vec::new());
        handle.snapshot().await.unwrap();
        assert_eq!(output.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_state() {
        let output = Arc::new(MemoryOutput::new("source"));
        output.set_failing(true);
        let (handle, _task) = PadActor::spawn(matrix(1), output.clone());

        handle.toggle(0);
        assert!(handle.get(0).await.unwrap().on);
        assert!(output.sent().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_toggles_are_not_lost() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(1), output.clone());

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    handle.toggle(0);
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // 100 toggles: back to off, one complete frame per toggle
        assert!(!handle.get(0).await.unwrap().on);
        let sent = output.sent();
        assert_eq!(sent.len(), 100);
        assert!(sent.iter().all(|frame| frame.len() == 2 + 6 + 6));
    }

    #[tokio::test]
    async fn test_empty_matrix_sends_header_only() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, _task) = PadActor::spawn(matrix(0), output.clone());

        handle.refresh_and_wait().await.unwrap();
        let mut expected = vec![0xF0];
        expected.extend_from_slice(&FRAME_HEADER);
        expected.push(0xF7);
        assert_eq!(output.sent(), vec![expected]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_actor() {
        let output = Arc::new(MemoryOutput::new("source"));
        let (handle, task) = PadActor::spawn(matrix(1), output);

        handle.shutdown();
        task.await.unwrap();
        assert!(handle.snapshot().await.is_err());
    }
}
