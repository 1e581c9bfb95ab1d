use super::{ComponentState, PreviewOrchestrator};
use crate::error::{Result, UvcPreviewError};
use crate::monitor::MonitorEvent;
use crate::session::SessionStateMachine;
use crate::surface::SurfaceEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

impl PreviewOrchestrator {
    /// Register with the device monitor and start pumping both event sources.
    ///
    /// Each source gets its own task, so events keep their order within a
    /// source but not across sources.
    pub async fn start(
        &mut self,
        monitor_events: mpsc::UnboundedReceiver<MonitorEvent>,
        surface_events: mpsc::UnboundedReceiver<SurfaceEvent>,
    ) -> Result<()> {
        if !self.pumps.is_empty() {
            return Err(UvcPreviewError::system("Orchestrator already started"));
        }
        info!("Starting UVC preview session host");
        self.set_component_state("session", ComponentState::Starting)
            .await;

        let machine = Arc::clone(&self.machine);
        tokio::task::spawn_blocking(move || machine.start())
            .await
            .map_err(|e| {
                UvcPreviewError::component("session".to_string(), format!("start failed: {}", e))
            })?;

        self.pumps.push(spawn_pump(
            "monitor",
            Arc::clone(&self.machine),
            monitor_events,
            self.cancellation_token.clone(),
            SessionStateMachine::handle_monitor_event,
        ));
        self.pumps.push(spawn_pump(
            "surface",
            Arc::clone(&self.machine),
            surface_events,
            self.cancellation_token.clone(),
            SessionStateMachine::handle_surface_event,
        ));

        self.set_component_state("session", ComponentState::Running)
            .await;
        info!("Session host running");
        Ok(())
    }
}

/// Feed events from one source into the state machine, one at a time.
/// Handlers call into the camera driver synchronously, so they run on the
/// blocking pool.
///
/// On cancellation the channel is closed and whatever is still queued is
/// handled before the pump exits, so a queued connect hands its control block
/// to the session instead of dropping it.
fn spawn_pump<E>(
    name: &'static str,
    machine: Arc<SessionStateMachine>,
    mut events: mpsc::UnboundedReceiver<E>,
    token: CancellationToken,
    handler: fn(&SessionStateMachine, E),
) -> JoinHandle<()>
where
    E: Send + 'static,
{
    tokio::spawn(async move {
        debug!("{} event pump started", name);
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("{} event pump cancelled", name);
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("{} event source closed", name);
                        return;
                    };
                    dispatch(name, &machine, handler, event).await;
                }
            }
        }

        events.close();
        let mut drained = 0usize;
        while let Some(event) = events.recv().await {
            dispatch(name, &machine, handler, event).await;
            drained += 1;
        }
        if drained > 0 {
            debug!("{} event pump handled {} queued events on shutdown", name, drained);
        }
    })
}

async fn dispatch<E>(
    name: &'static str,
    machine: &Arc<SessionStateMachine>,
    handler: fn(&SessionStateMachine, E),
    event: E,
) where
    E: Send + 'static,
{
    let machine = Arc::clone(machine);
    if let Err(e) = tokio::task::spawn_blocking(move || handler(&machine, event)).await {
        error!("{} event handler failed: {}", name, e);
    }
}
