//! Render surface availability.
//!
//! The windowing layer owns the render target; this tracker only mirrors the
//! latest availability transition so the session can check readiness and
//! borrow the current target while binding.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Opaque handle to a render target owned by the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl RenderTarget {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}

/// Surface transitions delivered from the UI execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Available { target: RenderTarget },
    SizeChanged { width: u32, height: u32 },
    Destroyed,
}

impl SurfaceEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SurfaceEvent::Available { .. } => "surface_available",
            SurfaceEvent::SizeChanged { .. } => "surface_size_changed",
            SurfaceEvent::Destroyed => "surface_destroyed",
        }
    }
}

#[derive(Debug, Default)]
pub struct SurfaceTracker {
    target: RwLock<Option<RenderTarget>>,
}

impl SurfaceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.target.read().is_some()
    }

    pub fn current_target(&self) -> Option<RenderTarget> {
        *self.target.read()
    }

    pub fn set_available(&self, target: RenderTarget) {
        debug!(
            "Surface {} became available: {}x{}",
            target.id, target.width, target.height
        );
        *self.target.write() = Some(target);
    }

    /// Record a new size. Ignored when no surface is available.
    pub fn resize(&self, width: u32, height: u32) {
        let mut guard = self.target.write();
        match guard.as_mut() {
            Some(target) => {
                debug!("Surface {} size changed: {}x{}", target.id, width, height);
                target.width = width;
                target.height = height;
            }
            None => debug!("Ignoring size change for missing surface"),
        }
    }

    pub fn clear(&self) {
        if self.target.write().take().is_some() {
            debug!("Surface destroyed");
        }
    }

    /// Apply a surface event to the tracked state
    pub fn apply(&self, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Available { target } => self.set_available(*target),
            SurfaceEvent::SizeChanged { width, height } => self.resize(*width, *height),
            SurfaceEvent::Destroyed => self.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_starts_unready() {
        let tracker = SurfaceTracker::new();
        assert!(!tracker.is_ready());
        assert_eq!(tracker.current_target(), None);
    }

    #[test]
    fn test_tracker_transitions() {
        let tracker = SurfaceTracker::new();
        let target = RenderTarget::new(7, 1920, 1080);

        tracker.apply(&SurfaceEvent::Available { target });
        assert!(tracker.is_ready());
        assert_eq!(tracker.current_target(), Some(target));

        tracker.apply(&SurfaceEvent::SizeChanged {
            width: 1080,
            height: 1920,
        });
        assert_eq!(
            tracker.current_target(),
            Some(RenderTarget::new(7, 1080, 1920))
        );

        tracker.apply(&SurfaceEvent::Destroyed);
        assert!(!tracker.is_ready());
    }

    #[test]
    fn test_resize_without_surface_is_ignored() {
        let tracker = SurfaceTracker::new();
        tracker.resize(800, 600);
        assert!(!tracker.is_ready());
    }
}
