//! CPAL output device resolution.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::EngineError;

/// Specifies which physical output device an output channel routes to.
///
/// Registered per channel via
/// [`RouteAudioBuilder::add_output()`](crate::RouteAudioBuilder::add_output).
#[derive(Debug, Clone, Default)]
pub struct OutputTarget {
    pub(crate) device: Target,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Target {
    /// Use the system's default output device.
    #[default]
    SystemDefault,
    /// Use a specific device by name.
    ByName(String),
}

impl OutputTarget {
    /// Targets the system default output device.
    pub fn default_device() -> Self {
        Self {
            device: Target::SystemDefault,
        }
    }

    /// Targets a specific output device by name.
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            device: Target::ByName(name.into()),
        }
    }
}

/// Wrapper around a resolved CPAL output device.
#[must_use]
pub(crate) struct OutputDevice {
    device: Device,
}

impl OutputDevice {
    /// Resolves the target against the default host.
    pub fn open(target: &OutputTarget) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = match &target.device {
            Target::SystemDefault => host
                .default_output_device()
                .ok_or(EngineError::NoDefaultOutputDevice)?,
            Target::ByName(name) => find_output_by_name(&host, name)?,
        };
        Ok(Self { device })
    }

    /// Returns the device name.
    pub fn name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    pub(crate) fn raw(&self) -> &Device {
        &self.device
    }
}

fn find_output_by_name(host: &cpal::Host, name: &str) -> Result<Device, EngineError> {
    let devices = host
        .output_devices()
        .map_err(|e| EngineError::BackendError(e.to_string()))?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name == name {
                return Ok(device);
            }
        }
    }

    Err(EngineError::DeviceNotFound {
        name: name.to_string(),
    })
}
