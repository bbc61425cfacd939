use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatEngine, ConversationLog};
use crate::config::MonitorConfig;
use crate::store::SessionStore;

use super::loop_worker::{monitor_loop, MonitorEvent, SignalSuite};

/// Owns the running monitor task: start spawns the loop, stop cancels it and
/// waits for the finalize step inside the loop to complete.
pub struct MonitorController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl MonitorController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        config: MonitorConfig,
        store: SessionStore,
        signals: SignalSuite,
        chat: ChatEngine,
        conversation: ConversationLog,
    ) -> Result<UnboundedReceiver<MonitorEvent>> {
        if self.handle.is_some() {
            bail!("monitor already active");
        }

        let cancel_token = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(monitor_loop(
            config,
            store,
            signals,
            chat,
            conversation,
            events_tx,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(events_rx)
    }

    /// Signal the loop to stop and wait for its finalize step (log flush,
    /// conversation summary, marker cleanup) to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("monitor loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Default for MonitorController {
    fn default() -> Self {
        Self::new()
    }
}
