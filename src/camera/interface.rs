use super::format::PreviewFormat;
use crate::error::CameraError;
use crate::monitor::ControlBlock;
use crate::surface::RenderTarget;

/// Low-level UVC camera driver bound to one control block.
///
/// All calls are synchronous and expected to return in bounded time. A
/// resource is opened at most once; after `release` it must not be used again.
pub trait CameraResource: Send {
    /// Open the camera over the given control block
    fn open(&mut self, control_block: &dyn ControlBlock) -> Result<(), CameraError>;

    fn set_preview_format(&mut self, format: &PreviewFormat) -> Result<(), CameraError>;

    fn set_auto_focus(&mut self, enabled: bool) -> Result<(), CameraError>;

    /// Point the preview output at a render target
    fn bind_render_target(&mut self, target: &RenderTarget) -> Result<(), CameraError>;

    fn start_stream(&mut self) -> Result<(), CameraError>;

    fn stop_stream(&mut self) -> Result<(), CameraError>;

    /// Close the device handle
    fn close(&mut self) -> Result<(), CameraError>;

    /// Free driver resources. Never fails.
    fn release(&mut self);
}

/// Produces a fresh, unopened camera resource for every connect
pub trait CameraFactory: Send + Sync {
    fn create(&self) -> Box<dyn CameraResource>;
}
