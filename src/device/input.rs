//! CPAL input device resolution and sample-rate negotiation.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::EngineError;

/// Specifies which audio input device to capture from.
///
/// Passed to [`Engine::start()`](crate::Engine::start).
#[derive(Debug, Clone, Default)]
pub struct InputSelection {
    pub(crate) device: Selection,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum Selection {
    /// Use the system's default input device.
    #[default]
    SystemDefault,
    /// Use a specific device by name.
    ByName(String),
}

impl InputSelection {
    /// Selects the system default input device.
    pub fn default_device() -> Self {
        Self {
            device: Selection::SystemDefault,
        }
    }

    /// Selects a specific input device by name.
    pub fn device(name: impl Into<String>) -> Self {
        Self {
            device: Selection::ByName(name.into()),
        }
    }
}

/// Wrapper around a resolved CPAL input device.
///
/// Resolution and sample-rate negotiation happen here; stream construction
/// lives in the pipeline.
#[must_use]
pub(crate) struct InputDevice {
    device: Device,
}

impl InputDevice {
    /// Resolves the selection against the default host.
    ///
    /// # Errors
    ///
    /// Returns `NoDefaultInputDevice` or `DeviceNotFound` if resolution
    /// fails.
    pub fn open(selection: &InputSelection) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = match &selection.device {
            Selection::SystemDefault => host
                .default_input_device()
                .ok_or(EngineError::NoDefaultInputDevice)?,
            Selection::ByName(name) => find_input_by_name(&host, name)?,
        };
        Ok(Self { device })
    }

    /// Returns the device name.
    pub fn name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    /// Queries the device's native sample rate.
    ///
    /// This becomes the fixed session sample rate: the engine never
    /// resamples, so every stream in the session runs at this rate.
    pub fn native_sample_rate(&self) -> Result<u32, EngineError> {
        let config = self
            .device
            .default_input_config()
            .map_err(|e| EngineError::DeviceUnavailable {
                name: self.name(),
                reason: e.to_string(),
            })?;
        Ok(config.sample_rate().0)
    }

    pub(crate) fn raw(&self) -> &Device {
        &self.device
    }
}

fn find_input_by_name(host: &cpal::Host, name: &str) -> Result<Device, EngineError> {
    let devices = host
        .input_devices()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_selection_default() {
        let selection = InputSelection::default();
        assert!(matches!(selection.device, Selection::SystemDefault));
    }

    #[test]
    fn test_input_selection_by_name() {
        let selection = InputSelection::device("BlackHole 2ch");
        match selection.device {
            Selection::ByName(name) => assert_eq!(name, "BlackHole 2ch"),
            Selection::SystemDefault => panic!("expected ByName"),
        }
    }

    // Note: Device tests require actual audio hardware and are skipped in CI
    #[test]
    #[ignore = "requires audio hardware"]
    fn test_open_default_device() {
        let device = InputDevice::open(&InputSelection::default_device()).unwrap();
        println!(
            "Default input: {} at {}Hz",
            device.name(),
            device.native_sample_rate().unwrap()
        );
    }
}
