//! Device selection and the CPAL boundary.
//!
//! This module resolves input/output selections to CPAL devices and exposes
//! plain listing helpers for the surrounding control layer. Device-naming
//! heuristics (virtual driver detection and the like) are deliberately left
//! to that layer.

mod device_id;
mod input;
mod output;

pub use device_id::DeviceId;
pub use input::InputSelection;
pub use output::OutputTarget;

pub(crate) use input::InputDevice;
pub(crate) use output::OutputDevice;

use cpal::traits::{DeviceTrait, HostTrait};

/// Lists the names of all available input devices.
///
/// # Errors
///
/// Returns an error if the audio host cannot be accessed.
pub fn list_input_devices() -> Result<Vec<String>, crate::EngineError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| crate::EngineError::BackendError(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Lists the names of all available output devices.
///
/// # Errors
///
/// Returns an error if the audio host cannot be accessed.
pub fn list_output_devices() -> Result<Vec<String>, crate::EngineError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| crate::EngineError::BackendError(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Gets the name of the default input device, if any.
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}
