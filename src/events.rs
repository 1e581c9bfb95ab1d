use crate::advisory::{Advisory, NoticeSink};
use crate::camera::NegotiatedFormat;
use crate::device::DeviceId;
use crate::error::EventBusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session notifications for UI collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// External camera connection status changed; `connected == false` shows
    /// the not-connected affordance
    CameraStatusChanged {
        connected: bool,
        device: Option<DeviceId>,
        timestamp: DateTime<Utc>,
    },
    /// A camera session was opened and configured
    SessionOpened {
        session_id: Uuid,
        device: DeviceId,
        format: NegotiatedFormat,
    },
    /// A camera session was torn down
    SessionClosed { session_id: Uuid },
    /// Frames are flowing to the render target
    StreamingStarted {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    /// Frames stopped flowing; the session may still be open
    StreamingStopped {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    /// Permission prompt requested for an attached device
    PermissionRequested { device: DeviceId },
    /// User declined the permission prompt
    PermissionCancelled { device: DeviceId },
    /// One-shot advisory shown to the user
    AdvisoryIssued { advisory: Advisory, message: String },
}

impl SessionEvent {
    pub fn camera_status(connected: bool, device: Option<DeviceId>) -> Self {
        SessionEvent::CameraStatusChanged {
            connected,
            device,
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::CameraStatusChanged { timestamp, .. } => *timestamp,
            SessionEvent::StreamingStarted { timestamp, .. } => *timestamp,
            SessionEvent::StreamingStopped { timestamp, .. } => *timestamp,
            SessionEvent::SessionOpened { .. } => Utc::now(),
            SessionEvent::SessionClosed { .. } => Utc::now(),
            SessionEvent::PermissionRequested { .. } => Utc::now(),
            SessionEvent::PermissionCancelled { .. } => Utc::now(),
            SessionEvent::AdvisoryIssued { .. } => Utc::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SessionEvent::CameraStatusChanged {
                connected, device, ..
            } => match (connected, device) {
                (true, Some(device)) => format!("Camera connected: {}", device),
                (true, None) => "Camera connected".to_string(),
                (false, _) => "Camera not connected".to_string(),
            },
            SessionEvent::SessionOpened {
                session_id,
                device,
                format,
            } => format!("Session {} opened on {} ({})", session_id, device, format),
            SessionEvent::SessionClosed { session_id } => {
                format!("Session {} closed", session_id)
            }
            SessionEvent::StreamingStarted { session_id, .. } => {
                format!("Preview started for session {}", session_id)
            }
            SessionEvent::StreamingStopped { session_id, .. } => {
                format!("Preview stopped for session {}", session_id)
            }
            SessionEvent::PermissionRequested { device } => {
                format!("Permission requested for {}", device)
            }
            SessionEvent::PermissionCancelled { device } => {
                format!("Permission cancelled for {}", device)
            }
            SessionEvent::AdvisoryIssued { message, .. } => message.clone(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::CameraStatusChanged { .. } => "camera_status_changed",
            SessionEvent::SessionOpened { .. } => "session_opened",
            SessionEvent::SessionClosed { .. } => "session_closed",
            SessionEvent::StreamingStarted { .. } => "streaming_started",
            SessionEvent::StreamingStopped { .. } => "streaming_stopped",
            SessionEvent::PermissionRequested { .. } => "permission_requested",
            SessionEvent::PermissionCancelled { .. } => "permission_cancelled",
            SessionEvent::AdvisoryIssued { .. } => "advisory_issued",
        }
    }
}

/// Event bus for session notifications using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers.
    ///
    /// Never blocks, so it is safe to call while holding the session lock.
    pub fn publish(&self, event: SessionEvent) -> Result<usize, EventBusError> {
        match &event {
            SessionEvent::CameraStatusChanged { connected, .. } => {
                if *connected {
                    info!("{}", event.description());
                } else {
                    warn!("{}", event.description());
                }
            }
            _ => debug!("Publishing event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, treating a bus without subscribers as a no-op
    pub fn notify(&self, event: SessionEvent) {
        if let Err(e) = self.publish(event) {
            debug!("Session event dropped: {}", e);
        }
    }
}

impl NoticeSink for EventBus {
    fn show(&self, advisory: Advisory, message: &str) {
        self.notify(SessionEvent::AdvisoryIssued {
            advisory,
            message: message.to_string(),
        });
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&SessionEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SessionEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SessionEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<SessionEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<SessionEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<SessionEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event currently queued that passes the filter
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match self.try_recv() {
                Ok(Some(event)) => events.push(event),
                // The oldest events were overwritten; keep what is still queued
                Err(EventBusError::Lagged { .. }) => continue,
                Ok(None) | Err(_) => break,
            }
        }
        events
    }
}
