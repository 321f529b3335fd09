//! Controller runtime wiring the UI loop to the sync layer.
//!
//! The [`SyncController`] is single-threaded. This module moves it into one
//! background tokio task and talks to it exclusively through channels, so
//! transport callbacks and UI input never touch controller state directly.
//!
//! # Architecture
//!
//! ```text
//! UI (main loop)  ─── NetCommand ──→  controller task  ←── TaggedEvent ───  sync sockets
//!                 ←── ViewEvent ────
//! ```
//!
//! The UI sends [`NetCommand`]s (publish, settings changes) and drains
//! [`ViewEvent`]s. Sockets push [`TaggedEvent`]s through their
//! [`EventSink`](crate::sync::EventSink); the task feeds them to
//! [`SyncController::handle_event`], which drops anything from a binding
//! that is no longer current.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::{Settings, SyncConfig};
use crate::controller::{ControllerError, SyncController, ViewEvent};
use crate::peers::PeerEntry;
use crate::sync::{SocketFactory, TaggedEvent};

/// Commands sent from the UI loop to the controller task.
#[derive(Debug)]
pub enum NetCommand {
    /// Publish a chat message to the current room.
    Publish {
        /// The message text.
        text: String,
    },
    /// Apply a settings update (absent fields are left alone).
    UpdateSettings(Settings),
    /// Ask the view to refit the digest tree.
    Refit,
    /// Request the current peer table.
    Snapshot {
        /// Where to send the table.
        reply: oneshot::Sender<Vec<(String, PeerEntry)>>,
    },
    /// Tear down the binding and stop the task.
    Shutdown,
}

/// Handles to a running controller task.
#[derive(Debug)]
pub struct ControllerHandle {
    /// Command queue into the controller task.
    pub commands: mpsc::Sender<NetCommand>,
    /// Notifications for the UI.
    pub views: mpsc::UnboundedReceiver<ViewEvent>,
    /// The controller task itself.
    pub task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Queue `text` for publishing. Returns `false` if the task is gone.
    pub async fn publish(&self, text: impl Into<String>) -> bool {
        self.commands
            .send(NetCommand::Publish { text: text.into() })
            .await
            .is_ok()
    }

    /// Queue a settings update. Returns `false` if the task is gone.
    pub async fn update_settings(&self, settings: Settings) -> bool {
        self.commands
            .send(NetCommand::UpdateSettings(settings))
            .await
            .is_ok()
    }

    /// Current peer table, or `None` if the task is gone.
    pub async fn snapshot(&self) -> Option<Vec<(String, PeerEntry)>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(NetCommand::Snapshot { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Stop the controller task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(NetCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "controller task ended abnormally");
        }
    }
}

/// Build a controller and spawn the task that owns it.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`ControllerError::Transport`] if the initial binding fails.
pub fn spawn_controller<F>(
    factory: F,
    config: SyncConfig,
    settings: Settings,
) -> Result<ControllerHandle, ControllerError>
where
    F: SocketFactory + 'static,
{
    let capacity = config.channel_capacity;
    let (controller, events, views) = SyncController::new(factory, config, settings)?;
    let (commands, command_rx) = mpsc::channel(capacity.max(1));

    let task = tokio::spawn(async move {
        run_controller(controller, command_rx, events).await;
    });

    Ok(ControllerHandle {
        commands,
        views,
        task,
    })
}

/// Controller task: serialise commands and transport events onto the
/// controller until shutdown or until the UI drops its command sender.
async fn run_controller<F: SocketFactory>(
    mut controller: SyncController<F>,
    mut commands: mpsc::Receiver<NetCommand>,
    mut events: mpsc::Receiver<TaggedEvent>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(NetCommand::Shutdown) | None => break,
                    Some(command) => handle_command(&mut controller, command),
                }
            }
            Some(event) = events.recv() => controller.handle_event(event),
        }
    }

    tracing::info!("controller task shutting down");
    controller.shutdown();
}

fn handle_command<F: SocketFactory>(controller: &mut SyncController<F>, command: NetCommand) {
    match command {
        NetCommand::Publish { text } => {
            if let Err(e) = controller.publish(&text) {
                tracing::warn!(error = %e, "publish failed");
                controller.emit(ViewEvent::Error(format!("Publish failed: {e}")));
            }
        }
        NetCommand::UpdateSettings(settings) => match controller.update_settings(settings) {
            Ok(change) => tracing::debug!(?change, "settings command applied"),
            Err(e) => {
                tracing::warn!(error = %e, "settings update failed");
                controller.emit(ViewEvent::Error(format!("Cannot join room: {e}")));
            }
        },
        NetCommand::Refit => controller.refit(),
        NetCommand::Snapshot { reply } => {
            let _ = reply.send(controller.peers().snapshot());
        }
        NetCommand::Shutdown => {}
    }
}
