//! One-shot user advisories.
//!
//! Each advisory is delivered at most once per notifier lifetime; the host
//! creates a single notifier at startup.

use crate::config::AdvisoryConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// The camera may be underpowered; suggest a powered OTG hub
    PowerHint,
    /// The host's internal camera may take priority over the external one
    PlatformQuirkHint,
}

/// Displays a non-blocking notice to the user
pub trait NoticeSink: Send + Sync {
    fn show(&self, advisory: Advisory, message: &str);
}

/// Sink that only writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn show(&self, advisory: Advisory, message: &str) {
        info!("Advisory {:?}: {}", advisory, message);
    }
}

pub struct AdvisoryNotifier {
    config: AdvisoryConfig,
    sink: Arc<dyn NoticeSink>,
    power_hint_shown: AtomicBool,
    platform_quirk_hint_shown: AtomicBool,
}

impl AdvisoryNotifier {
    pub fn new(config: AdvisoryConfig, sink: Arc<dyn NoticeSink>) -> Self {
        Self {
            config,
            sink,
            power_hint_shown: AtomicBool::new(false),
            platform_quirk_hint_shown: AtomicBool::new(false),
        }
    }

    pub fn notify_power_hint(&self) {
        if !Self::claim(&self.power_hint_shown) {
            return;
        }
        warn!("USB camera may need more power. Recommend connecting through a powered OTG hub.");
        self.deliver(Advisory::PowerHint, &self.config.power_hint_message);
    }

    pub fn notify_platform_quirk_hint(&self) {
        if !Self::claim(&self.platform_quirk_hint_shown) {
            return;
        }
        info!("Reminding user about internal camera priority quirks.");
        self.deliver(
            Advisory::PlatformQuirkHint,
            &self.config.platform_quirk_hint_message,
        );
    }

    pub fn notify(&self, advisory: Advisory) {
        match advisory {
            Advisory::PowerHint => self.notify_power_hint(),
            Advisory::PlatformQuirkHint => self.notify_platform_quirk_hint(),
        }
    }

    pub fn was_shown(&self, advisory: Advisory) -> bool {
        match advisory {
            Advisory::PowerHint => self.power_hint_shown.load(Ordering::Acquire),
            Advisory::PlatformQuirkHint => self.platform_quirk_hint_shown.load(Ordering::Acquire),
        }
    }

    /// First caller wins; everyone after sees the flag already set
    fn claim(flag: &AtomicBool) -> bool {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn deliver(&self, advisory: Advisory, message: &str) {
        if !self.config.enabled {
            debug!("Advisories disabled, suppressing {:?}", advisory);
            return;
        }
        self.sink.show(advisory, message);
    }
}
