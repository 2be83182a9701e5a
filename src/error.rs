//! Error types for route-audio.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`EngineError`]): reject `start()` or a configuration
//!   change before any stream opens, or abort a start attempt after rollback
//! - **Recoverable conditions**: runtime issues surfaced via
//!   [`EventCallback`](crate::EventCallback) while the engine keeps running

/// Fatal errors returned from the engine's configuration and lifecycle calls.
///
/// A failed `start()` never leaves streams running: any stream opened during
/// the attempt is closed again before the error is returned. Runtime issues
/// (stream faults, close failures during stop) are reported through the
/// event callback instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// The requested device exists but could not be used.
    #[error("device unavailable: {name} - {reason}")]
    DeviceUnavailable {
        /// Name of the unavailable device.
        name: String,
        /// Reason the device is unavailable.
        reason: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultInputDevice,

    /// No default output device is configured on this system.
    #[error("no default output device configured")]
    NoDefaultOutputDevice,

    /// The device's sample format is not supported by the engine.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// A stream could not be opened or started during `start()`.
    ///
    /// Every stream already opened in the same attempt has been closed again
    /// by the time this is returned.
    #[error("stream for '{device}' failed to open: {reason}")]
    StreamOpenFailed {
        /// Device the stream was meant for.
        device: String,
        /// Why the stream could not be opened.
        reason: String,
    },

    /// The ring buffer cannot cover the maximum delay plus one block.
    #[error("ring buffer too small: {capacity_frames} frames, need more than {required_frames}")]
    BufferTooSmall {
        /// Capacity the configuration produced.
        capacity_frames: usize,
        /// Frames required for the supported delay range.
        required_frames: usize,
    },

    /// The engine configuration is not usable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// An output id was registered more than once.
    #[error("duplicate output: {device}")]
    DuplicateOutput {
        /// The duplicated output id.
        device: String,
    },

    /// The operation requires the engine to be stopped.
    ///
    /// Output membership changes and restarts are only accepted from the
    /// `Stopped` state so they cannot race an in-flight teardown.
    #[error("engine is not stopped")]
    NotStopped,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    BackendError(String),

    /// The engine's control thread has shut down.
    #[error("engine closed")]
    EngineClosed,
}

impl EngineError {
    /// Creates a `StreamOpenFailed` for the given device.
    pub(crate) fn stream_open(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StreamOpenFailed {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::DeviceNotFound {
            name: "USB Speakers".to_string(),
        };
        assert_eq!(err.to_string(), "device not found: USB Speakers");
    }

    #[test]
    fn test_stream_open_helper() {
        let err = EngineError::stream_open("HDMI", "busy");
        assert_eq!(err.to_string(), "stream for 'HDMI' failed to open: busy");
    }

    #[test]
    fn test_buffer_too_small_display() {
        let err = EngineError::BufferTooSmall {
            capacity_frames: 100,
            required_frames: 28096,
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("28096"));
    }
}
