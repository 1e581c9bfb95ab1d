use crate::camera::{FrameEncoding, PreviewFormat};
use crate::device::DeviceFilter;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PreviewConfig {
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    /// Format requested first after the camera opens
    #[serde(default = "default_primary_format")]
    pub primary_format: PreviewFormat,

    /// Format requested when the primary one is rejected
    #[serde(default = "default_fallback_format")]
    pub fallback_format: PreviewFormat,

    /// Try to enable auto focus after opening
    #[serde(default = "default_auto_focus")]
    pub auto_focus: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Accepted devices; empty accepts every attached camera
    #[serde(default)]
    pub filters: Vec<DeviceFilter>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AdvisoryConfig {
    /// Deliver advisories to the user
    #[serde(default = "default_advisory_enabled")]
    pub enabled: bool,

    #[serde(default = "default_power_hint_message")]
    pub power_hint_message: String,

    #[serde(default = "default_platform_quirk_hint_message")]
    pub platform_quirk_hint_message: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl PreviewConfig {
    /// Load configuration from a specific file path, with `UVCPREVIEW_*`
    /// environment variables taking precedence over the file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Self::environment())
    }

    /// Environment source for overrides: `UVCPREVIEW_<SECTION>__<KEY>`
    fn environment() -> Environment {
        Environment::with_prefix("UVCPREVIEW")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with_environment<P: AsRef<Path>>(
        path: P,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let primary = default_primary_format();
        let fallback = default_fallback_format();

        let settings = Config::builder()
            .set_default("preview.primary_format.width", primary.width)?
            .set_default("preview.primary_format.height", primary.height)?
            .set_default(
                "preview.primary_format.encoding",
                encoding_name(primary.encoding),
            )?
            .set_default("preview.fallback_format.width", fallback.width)?
            .set_default("preview.fallback_format.height", fallback.height)?
            .set_default(
                "preview.fallback_format.encoding",
                encoding_name(fallback.encoding),
            )?
            .set_default("preview.auto_focus", default_auto_focus())?
            .set_default("advisory.enabled", default_advisory_enabled())?
            .set_default("advisory.power_hint_message", default_power_hint_message())?
            .set_default(
                "advisory.platform_quirk_hint_message",
                default_platform_quirk_hint_message(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(environment)
            .build()?;

        let config: PreviewConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Parse configuration from a TOML string without consulting the environment
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preview.primary_format.is_empty() {
            return Err(ConfigError::Message(
                "Primary preview format must have a non-zero size".to_string(),
            ));
        }

        if self.preview.fallback_format.is_empty() {
            return Err(ConfigError::Message(
                "Fallback preview format must have a non-zero size".to_string(),
            ));
        }

        if self.preview.primary_format == self.preview.fallback_format {
            return Err(ConfigError::Message(
                "Fallback preview format must differ from the primary format".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            primary_format: default_primary_format(),
            fallback_format: default_fallback_format(),
            auto_focus: default_auto_focus(),
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_advisory_enabled(),
            power_hint_message: default_power_hint_message(),
            platform_quirk_hint_message: default_platform_quirk_hint_message(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

fn encoding_name(encoding: FrameEncoding) -> &'static str {
    match encoding {
        FrameEncoding::Mjpeg => "mjpeg",
        FrameEncoding::Yuyv => "yuyv",
    }
}

// Default value functions
fn default_primary_format() -> PreviewFormat {
    PreviewFormat::hd_mjpeg()
}
fn default_fallback_format() -> PreviewFormat {
    PreviewFormat::uvc_default()
}
fn default_auto_focus() -> bool {
    true
}

fn default_advisory_enabled() -> bool {
    true
}
fn default_power_hint_message() -> String {
    "The USB camera may need more power. Connect it through a powered OTG hub.".to_string()
}
fn default_platform_quirk_hint_message() -> String {
    "The built-in camera can take priority over USB cameras. Close other camera apps and grant access when asked.".to_string()
}

fn default_event_bus_capacity() -> usize {
    64
}

/// Documented default configuration in TOML format
pub const DEFAULT_CONFIG_TOML: &str = r#"[preview]
# Format requested right after the camera opens
primary_format = { width = 1280, height = 720, encoding = "mjpeg" }
# Format used when the camera rejects the primary one
fallback_format = { width = 640, height = 480, encoding = "yuyv" }
# Try to enable auto focus (failures are ignored)
auto_focus = true

[device]
# Accepted cameras; leave empty to accept every UVC device
# filters = [{ vendor_id = 0x046D }, { vendor_id = 0x0BDA, product_id = 0x5830 }]
filters = []

[advisory]
# Show one-shot hints (powered hub, internal camera priority)
enabled = true

[system]
# Session event bus capacity
event_bus_capacity = 64
"#;
