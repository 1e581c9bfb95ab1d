use super::{ComponentState, PreviewOrchestrator};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const PUMP_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl PreviewOrchestrator {
    /// Stop the event pumps, handle what they still had queued, then release
    /// the session and destroy the device monitor. Returns the process exit code.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.set_component_state("session", ComponentState::Stopping)
            .await;

        self.cancellation_token.cancel();

        let mut exit_code = 0;
        for pump in self.pumps.drain(..) {
            match timeout(PUMP_STOP_TIMEOUT, pump).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("Event pump ended abnormally: {}", e);
                    exit_code = 1;
                }
                Err(_) => {
                    warn!("Event pump did not stop within {:?}", PUMP_STOP_TIMEOUT);
                    exit_code = 1;
                }
            }
        }

        let machine = Arc::clone(&self.machine);
        match tokio::task::spawn_blocking(move || machine.destroy()).await {
            Ok(()) => {
                self.set_component_state("session", ComponentState::Stopped)
                    .await;
            }
            Err(e) => {
                error!("Error stopping session: {}", e);
                self.set_component_state("session", ComponentState::Failed)
                    .await;
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }
}
