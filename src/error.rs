use thiserror::Error;

#[derive(Error, Debug)]
pub enum UvcPreviewError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Device monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures reported by the camera resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera is busy or held by another process")]
    DeviceBusy,

    #[error("Camera did not get enough power from the USB port")]
    InsufficientPower,

    #[error("Preview format rejected: {format}")]
    UnsupportedFormat { format: String },

    #[error("Camera is not open")]
    NotOpen,

    #[error("Camera feature not supported: {feature}")]
    FeatureUnsupported { feature: String },

    #[error("Camera driver error: {details}")]
    Driver { details: String },
}

impl CameraError {
    pub fn driver<S: Into<String>>(details: S) -> Self {
        Self::Driver {
            details: details.into(),
        }
    }

    /// Whether the camera refused a preview format (as opposed to failing outright)
    pub fn is_format_rejection(&self) -> bool {
        matches!(self, CameraError::UnsupportedFormat { .. })
    }
}

/// Failures reported by the USB device monitor or a control block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Failed to register for device events: {details}")]
    Register { details: String },

    #[error("Failed to unregister from device events: {details}")]
    Unregister { details: String },

    #[error("Permission request failed: {details}")]
    PermissionRequest { details: String },

    #[error("Failed to close control block: {details}")]
    ControlBlockClose { details: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

impl UvcPreviewError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the condition clears on the next hotplug or surface event
    pub fn is_recoverable(&self) -> bool {
        match self {
            UvcPreviewError::Camera(_) => true,
            UvcPreviewError::Monitor(_) => true,
            UvcPreviewError::EventBus(EventBusError::Lagged { .. }) => true,
            UvcPreviewError::EventBus(_) => false,
            UvcPreviewError::Config(_)
            | UvcPreviewError::Deserialization(_)
            | UvcPreviewError::Io(_) => false,
            UvcPreviewError::System { .. } => false,
            UvcPreviewError::Component { .. } => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, UvcPreviewError>;
