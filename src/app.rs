//! Application lifecycle
//!
//! Startup order: console library, MIDI ports, console login, pad actor,
//! initial LED frame, router, console sync. Shutdown releases everything in
//! reverse: console, inputs, router, pad actor, outputs.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, Mode};
use crate::console::{notification_channel, ConsoleRemote, ConsoleSyncBridge, VoicemeeterRemote};
use crate::context::BridgeContext;
use crate::error::{BridgeError, Result};
use crate::pads::{PadActor, PadMatrix, PadMatrixHandle};
use crate::router::EventRouter;
use crate::transport::hardware::{self, MidirOutput};
use crate::transport::{inbound_channel, InboundReceiver, PortOrigin, SharedOutput};

/// Keeps an input port open until dropped
pub type InputGuard = Box<dyn Send>;

/// Opened ports handed to [`Bridge::start`]
pub struct BridgeIo {
    pub source: SharedOutput,
    pub targets: Vec<SharedOutput>,
    /// Input connections; each one holds a sender of `inbound`
    pub inputs: Vec<InputGuard>,
    pub inbound: InboundReceiver,
}

struct ConsoleLink {
    remote: Arc<dyn ConsoleRemote>,
    task: JoinHandle<()>,
}

/// A running bridge
pub struct Bridge {
    pads: PadMatrixHandle,
    pad_task: JoinHandle<()>,
    router_task: JoinHandle<()>,
    console: Option<ConsoleLink>,
    inputs: Vec<InputGuard>,
    source: SharedOutput,
    targets: Vec<SharedOutput>,
}

impl Bridge {
    /// Start routing over already opened ports
    ///
    /// With a console, login happens first; a failed login aborts startup
    /// before anything is spawned.
    pub async fn start(
        ctx: Arc<BridgeContext>,
        io: BridgeIo,
        console: Option<Arc<dyn ConsoleRemote>>,
    ) -> Result<Self> {
        if let Some(remote) = &console {
            remote.login().await?;
        }

        let matrix = PadMatrix::new(&ctx.config.pads_config);
        let (pads, pad_task) = PadActor::spawn(matrix, io.source.clone());

        // Written before the router starts draining inputs that are already open
        pads.refresh_and_wait().await?;
        debug!(pads = ctx.pad_count(), "Initial LED frame sent");

        let router = EventRouter::new(
            ctx.clone(),
            io.source.clone(),
            io.targets.clone(),
            pads.clone(),
        );
        let router_task = router.spawn(io.inbound);

        let console = match console {
            Some(remote) => {
                let (sink, notifications) = notification_channel();
                if let Err(e) = remote
                    .subscribe(&ConsoleSyncBridge::subscribed_kinds(), sink)
                    .await
                {
                    warn!("{} notifications unavailable: {}", remote.name(), e);
                }
                let bridge = ConsoleSyncBridge::new(ctx.clone(), remote.clone(), pads.clone());
                let task = bridge.spawn(notifications);
                Some(ConsoleLink { remote, task })
            }
            None => None,
        };

        info!("✅ Bridge running ({:?} mode)", ctx.config.mode);

        Ok(Self {
            pads,
            pad_task,
            router_task,
            console,
            inputs: io.inputs,
            source: io.source,
            targets: io.targets,
        })
    }

    /// Handle to the running pad actor
    pub fn pads(&self) -> &PadMatrixHandle {
        &self.pads
    }

    /// Tear down in reverse acquisition order
    pub async fn shutdown(self) {
        info!("Shutting down...");

        if let Some(link) = self.console {
            if let Err(e) = link.remote.logout().await {
                warn!("{} logout failed: {}", link.remote.name(), e);
            }
            if let Err(e) = link.task.await {
                warn!("Console sync task failed: {}", e);
            }
        }

        // Dropping the inputs closes the inbound queue, which stops the router
        drop(self.inputs);
        if let Err(e) = self.router_task.await {
            warn!("Router task failed: {}", e);
        }

        self.pads.shutdown();
        if let Err(e) = self.pad_task.await {
            warn!("Pad actor task failed: {}", e);
        }

        drop(self.targets);
        drop(self.source);
        info!("Shutdown complete");
    }
}

/// Run the bridge on the configured hardware until `shutdown` resolves
pub async fn run(config: AppConfig, shutdown: impl Future<Output = ()>) -> Result<()> {
    if let Err(e) = hardware::log_ports() {
        warn!("Could not enumerate MIDI ports: {}", e);
    }

    let ctx = Arc::new(BridgeContext::new(config));

    let console = match ctx.config.mode {
        Mode::Vm => {
            let remote = VoicemeeterRemote::load(&ctx.config.voicemeeter)?;
            Some(Arc::new(remote) as Arc<dyn ConsoleRemote>)
        }
        Mode::Switch | Mode::Forward => None,
    };

    let io = open_hardware(&ctx.config)?;
    let bridge = Bridge::start(ctx, io, console).await?;

    shutdown.await;
    bridge.shutdown().await;
    Ok(())
}

/// Open source and target ports
///
/// A missing source is fatal. A missing target is fatal unless
/// `allow_missing_targets` is set.
fn open_hardware(config: &AppConfig) -> Result<BridgeIo> {
    let (tx, inbound) = inbound_channel();

    let source: SharedOutput = Arc::new(MidirOutput::open(&config.source_device_name)?);
    let mut inputs: Vec<InputGuard> = vec![Box::new(hardware::open_input(
        &config.source_device_name,
        PortOrigin::Source,
        tx.clone(),
    )?)];
    info!("Source device '{}' connected", config.source_device_name);

    let mut targets: Vec<SharedOutput> = Vec::with_capacity(config.target_devices_names.len());
    for (index, name) in config.target_devices_names.iter().enumerate() {
        let opened = MidirOutput::open(name).and_then(|output| {
            let input = hardware::open_input(name, PortOrigin::Target(index), tx.clone())?;
            Ok((output, input))
        });

        match opened {
            Ok((output, input)) => {
                targets.push(Arc::new(output));
                inputs.push(Box::new(input));
                info!("Target device '{}' connected", name);
            }
            Err(e @ BridgeError::PortNotFound { .. }) if config.allow_missing_targets => {
                warn!("Skipping target '{}': {}", name, e);
            }
            Err(e) => return Err(e),
        }
    }

    if targets.is_empty() {
        warn!("No target devices connected; only pad LEDs will be driven");
    }

    Ok(BridgeIo {
        source,
        targets,
        inputs,
        inbound,
    })
}
