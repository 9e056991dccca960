//! Console state synchronisation
//!
//! The console (Voicemeeter) signals that a class of its state changed; the
//! bridge re-reads every mapped entry of that class and pushes the result to
//! the pads as one batch, so one notification yields one LED frame.

pub mod memory;
pub mod voicemeeter;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::BridgeContext;
use crate::error::Result;
use crate::pads::commands::BatchSource;
use crate::pads::PadMatrixHandle;

pub use memory::MemoryConsole;
pub use voicemeeter::VoicemeeterRemote;

/// Notification tag for "parameters changed"
pub const PARAMETERS_DIRTY: &str = "pdirty";

/// Notification tag for "macro buttons changed"
pub const BUTTONS_DIRTY: &str = "mdirty";

/// Parameter string the console reports for an engaged switch
pub const PARAMETER_ON: &str = "1.000";

/// A state-change notification from the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ParametersDirty,
    ButtonsDirty,
    Other(String),
}

impl Notification {
    /// Tag the console uses for this notification
    pub fn tag(&self) -> &str {
        match self {
            Notification::ParametersDirty => PARAMETERS_DIRTY,
            Notification::ButtonsDirty => BUTTONS_DIRTY,
            Notification::Other(tag) => tag,
        }
    }
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}

/// Remote-control connection to a mixing console
#[async_trait]
pub trait ConsoleRemote: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    /// Open the connection; failure is fatal at startup
    async fn login(&self) -> Result<()>;

    /// Stop notifications and close the connection
    async fn logout(&self) -> Result<()>;

    /// Deliver the requested notification kinds to `sink`, in order,
    /// until logout
    async fn subscribe(&self, kinds: &[Notification], sink: NotificationSender) -> Result<()>;

    /// Current value of a parameter, as the console formats it
    async fn get_parameter_string(&self, name: &str) -> Result<String>;

    /// Whether a macro button is engaged
    async fn get_button_state(&self, index: u32) -> Result<bool>;
}

/// Keeps pad `on` flags in step with console parameters and buttons
pub struct ConsoleSyncBridge {
    ctx: Arc<BridgeContext>,
    console: Arc<dyn ConsoleRemote>,
    pads: PadMatrixHandle,
}

impl ConsoleSyncBridge {
    /// # Arguments
    /// * `ctx` - Shared context holding both mapping tables and the cc lookup
    /// * `console` - Logged-in console to query
    /// * `pads` - Handle to the pad actor that receives the batches
    pub fn new(
        ctx: Arc<BridgeContext>,
        console: Arc<dyn ConsoleRemote>,
        pads: PadMatrixHandle,
    ) -> Self {
        Self { ctx, console, pads }
    }

    /// Notification kinds the bridge reacts to
    pub fn subscribed_kinds() -> [Notification; 2] {
        [Notification::ParametersDirty, Notification::ButtonsDirty]
    }

    /// Re-read the state class named by `notification` and update the pads
    pub async fn sync(&self, notification: &Notification) {
        debug!("Console notification '{}'", notification.tag());
        match notification {
            Notification::ParametersDirty => self.sync_parameters().await,
            Notification::ButtonsDirty => self.sync_buttons().await,
            Notification::Other(_) => debug!("Unknown notification kind, ignored"),
        }
    }

    /// Sync both classes once, as if both notifications had arrived
    pub async fn prime(&self) {
        info!("Priming pads from {} state", self.console.name());
        self.sync(&Notification::ParametersDirty).await;
        self.sync(&Notification::ButtonsDirty).await;
    }

    async fn sync_parameters(&self) {
        let mut updates = Vec::with_capacity(self.ctx.config.vm_parameter_to_cc.len());

        for (parameter, &cc) in &self.ctx.config.vm_parameter_to_cc {
            let Some(index) = self.ctx.pad_for_cc(cc) else {
                debug!("Parameter '{}' maps to cc {} which is not a pad", parameter, cc);
                continue;
            };

            match self.console.get_parameter_string(parameter).await {
                Ok(value) => {
                    let on = value == PARAMETER_ON;
                    debug!("{} = '{}' -> pad {} {}", parameter, value, index, on_off(on));
                    updates.push((index, on));
                }
                Err(e) => warn!("Failed to read parameter '{}': {}", parameter, e),
            }
        }

        self.pads.apply_batch(BatchSource::ConsoleParameters, updates);
    }

    async fn sync_buttons(&self) {
        let mut updates = Vec::with_capacity(self.ctx.config.vm_button_to_cc.len());

        for (&button, &cc) in &self.ctx.config.vm_button_to_cc {
            let Some(index) = self.ctx.pad_for_cc(cc) else {
                debug!("Button {} maps to cc {} which is not a pad", button, cc);
                continue;
            };

            match self.console.get_button_state(button).await {
                Ok(on) => {
                    debug!("Button {} -> pad {} {}", button, index, on_off(on));
                    updates.push((index, on));
                }
                Err(e) => warn!("Failed to read button {}: {}", button, e),
            }
        }

        self.pads.apply_batch(BatchSource::ConsoleButtons, updates);
    }

    /// Prime, then sync on every notification until the stream ends
    pub async fn run(self, mut rx: NotificationReceiver) {
        self.prime().await;
        info!("Console sync started");

        while let Some(notification) = rx.recv().await {
            self.sync(&notification).await;
        }

        info!("Console sync stopped (notification stream closed)");
    }

    /// Run the bridge on its own task
    pub fn spawn(self, rx: NotificationReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
