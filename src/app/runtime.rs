use super::{PreviewOrchestrator, ShutdownReason};
use crate::error::{Result, UvcPreviewError};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

impl PreviewOrchestrator {
    /// Run until a termination signal arrives or the cancellation token fires,
    /// then shut down. Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("UVC preview host is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| UvcPreviewError::system("Shutdown sender already taken"))?;
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| UvcPreviewError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let token = self.cancellation_token.clone();
        let shutdown_reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                UvcPreviewError::system("Shutdown channel closed unexpectedly")
            })?,
            _ = token.cancelled() => ShutdownReason::UserRequest,
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);
        self.shutdown().await
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
