use super::format::NegotiatedFormat;
use super::interface::CameraResource;
use crate::config::PreviewSettings;
use tracing::{debug, error, info, warn};

/// Apply the preview format and auto-focus settings to a freshly opened camera.
///
/// A rejected primary format falls back to the secondary one. Nothing here is
/// fatal: a camera that accepts neither format keeps its own default, and
/// auto-focus failures are only logged.
pub fn configure_preview(
    camera: &mut dyn CameraResource,
    settings: &PreviewSettings,
) -> NegotiatedFormat {
    let negotiated = match camera.set_preview_format(&settings.primary_format) {
        Ok(()) => {
            info!("Preview format set to {}", settings.primary_format);
            NegotiatedFormat::Primary(settings.primary_format)
        }
        Err(e) if e.is_format_rejection() => {
            warn!(
                "Falling back to {} preview: {} rejected ({})",
                settings.fallback_format, settings.primary_format, e
            );
            match camera.set_preview_format(&settings.fallback_format) {
                Ok(()) => NegotiatedFormat::Fallback(settings.fallback_format),
                Err(e) => {
                    error!("Unable to configure preview size: {}", e);
                    NegotiatedFormat::Unconfigured
                }
            }
        }
        Err(e) => {
            error!("Unable to configure preview size: {}", e);
            NegotiatedFormat::Unconfigured
        }
    };

    if settings.auto_focus {
        match camera.set_auto_focus(true) {
            Ok(()) => debug!("Auto focus enabled"),
            Err(e) => warn!("Auto focus not supported on this USB camera: {}", e),
        }
    }

    negotiated
}
