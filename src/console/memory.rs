//! In-memory console
//!
//! Holds parameter strings and button states set by the caller and emits
//! notifications on demand.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{ConsoleRemote, Notification, NotificationSender};
use crate::error::{BridgeError, Result};

#[derive(Default)]
struct Inner {
    logged_in: bool,
    parameters: HashMap<String, String>,
    buttons: HashMap<u32, bool>,
    subscription: Option<(Vec<Notification>, NotificationSender)>,
    queried_parameters: Vec<String>,
}

#[derive(Default)]
pub struct MemoryConsole {
    inner: Mutex<Inner>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().parameters.insert(name.into(), value.into());
    }

    pub fn set_button(&self, index: u32, on: bool) {
        self.inner.lock().buttons.insert(index, on);
    }

    /// Emit a notification to the subscriber, if it asked for that kind
    ///
    /// Returns whether the notification was delivered.
    pub fn notify(&self, notification: Notification) -> bool {
        let inner = self.inner.lock();
        match &inner.subscription {
            Some((kinds, sink)) if kinds.contains(&notification) => {
                sink.send(notification).is_ok()
            }
            _ => false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.lock().logged_in
    }

    /// Parameter names queried so far, in query order
    pub fn queried_parameters(&self) -> Vec<String> {
        self.inner.lock().queried_parameters.clone()
    }
}

#[async_trait]
impl ConsoleRemote for MemoryConsole {
    fn name(&self) -> &str {
        "memory console"
    }

    async fn login(&self) -> Result<()> {
        self.inner.lock().logged_in = true;
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.logged_in = false;
        // Dropping the sink ends the subscriber's stream
        inner.subscription = None;
        Ok(())
    }

    async fn subscribe(&self, kinds: &[Notification], sink: NotificationSender) -> Result<()> {
        debug!(?kinds, "Memory console subscription");
        self.inner.lock().subscription = Some((kinds.to_vec(), sink));
        Ok(())
    }

    async fn get_parameter_string(&self, name: &str) -> Result<String> {
        let mut inner = self.inner.lock();
        inner.queried_parameters.push(name.to_string());
        inner
            .parameters
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::Console(format!("unknown parameter '{name}'")))
    }

    async fn get_button_state(&self, index: u32) -> Result<bool> {
        self.inner
            .lock()
            .buttons
            .get(&index)
            .copied()
            .ok_or_else(|| BridgeError::Console(format!("unknown button {index}")))
    }
}
