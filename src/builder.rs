//! Builder pattern for `RouteAudio`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::controls::{ChannelSettings, OutputControls};
use crate::device::{DeviceId, OutputTarget};
use crate::engine::{Engine, OutputChannel};
use crate::{event_callback, EngineError, EngineEvent, EventCallback};

/// Builder for configuring the distribution engine.
///
/// Use [`RouteAudio::builder()`] to create a new builder. Outputs registered
/// here exist for the lifetime of the engine; their gain/delay/enabled
/// settings are adjustable at any time through
/// [`OutputHandle`](crate::OutputHandle)s.
///
/// # Example
///
/// ```ignore
/// use route_audio::{RouteAudio, ChannelSettings, InputSelection, OutputTarget};
///
/// let engine = RouteAudio::builder()
///     .add_output("speakers", OutputTarget::default_device())
///     .add_output_with(
///         "patio",
///         OutputTarget::device("Patio Airplay"),
///         ChannelSettings { delay_ms: 180.0, ..Default::default() },
///     )
///     .on_event(|e| tracing::info!(?e, "engine event"))
///     .build()?;
///
/// engine.start(InputSelection::device("BlackHole 2ch"))?;
/// ```
#[must_use]
pub struct RouteAudioBuilder {
    /// Output registrations: `(id, target, initial settings)`.
    outputs: Vec<(DeviceId, OutputTarget, ChannelSettings)>,
    /// Engine configuration.
    config: EngineConfig,
    /// Event callback.
    callback: Option<EventCallback>,
}

impl Default for RouteAudioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteAudioBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            outputs: Vec::new(),
            config: EngineConfig::default(),
            callback: None,
        }
    }

    /// Set custom engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an output channel with default settings (enabled, unity
    /// gain, no delay).
    pub fn add_output(self, id: impl Into<DeviceId>, target: OutputTarget) -> Self {
        self.add_output_with(id, target, ChannelSettings::default())
    }

    /// Register an output channel with explicit initial settings.
    pub fn add_output_with(
        mut self,
        id: impl Into<DeviceId>,
        target: OutputTarget,
        settings: ChannelSettings,
    ) -> Self {
        self.outputs.push((id.into(), target, settings));
        self
    }

    /// Set a callback to receive engine events.
    ///
    /// Events include lifecycle notifications (including the asynchronous
    /// stop completion) and stream fault reports.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.callback = Some(event_callback(callback));
        self
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), EngineError> {
        self.config.validate()?;

        let mut seen = std::collections::HashSet::new();
        for (id, _, _) in &self.outputs {
            if !seen.insert(id) {
                return Err(EngineError::DuplicateOutput {
                    device: id.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Builds the engine and spawns its control thread.
    ///
    /// The engine starts in `Stopped`; no device is touched until
    /// [`Engine::start()`](crate::Engine::start).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - An output id is registered twice
    /// - The control thread cannot be spawned
    pub fn build(self) -> Result<Engine, EngineError> {
        self.validate()?;

        let mut outputs = BTreeMap::new();
        for (id, target, settings) in self.outputs {
            outputs.insert(
                id,
                OutputChannel {
                    target,
                    controls: Arc::new(OutputControls::new(settings)),
                },
            );
        }

        Engine::spawn(self.config, outputs, self.callback)
    }
}

/// Main entry point for route-audio.
///
/// Use [`RouteAudio::builder()`] to configure and build an [`Engine`].
pub struct RouteAudio;

impl RouteAudio {
    /// Creates a new builder for configuring the engine.
    pub fn builder() -> RouteAudioBuilder {
        RouteAudioBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = RouteAudioBuilder::new();
        assert!(builder.outputs.is_empty());
        assert!(builder.callback.is_none());
    }

    #[test]
    fn test_builder_add_output() {
        let builder = RouteAudio::builder()
            .add_output("speakers", OutputTarget::default_device())
            .add_output("hdmi", OutputTarget::device("HDMI Audio"));

        assert_eq!(builder.outputs.len(), 2);
    }

    #[test]
    fn test_builder_add_output_with_settings() {
        let builder = RouteAudio::builder().add_output_with(
            "patio",
            OutputTarget::default_device(),
            ChannelSettings {
                enabled: false,
                gain: 0.5,
                delay_ms: 300.0,
            },
        );

        let (_, _, settings) = &builder.outputs[0];
        assert!(!settings.enabled);
        assert_eq!(settings.gain, 0.5);
        assert_eq!(settings.delay_ms, 300.0);
    }

    #[test]
    fn test_builder_rejects_duplicate_outputs() {
        let builder = RouteAudio::builder()
            .add_output("speakers", OutputTarget::default_device())
            .add_output("speakers", OutputTarget::device("Other")); // Duplicate!

        let result = builder.validate();
        assert!(matches!(result, Err(EngineError::DuplicateOutput { .. })));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let builder = RouteAudio::builder().with_config(EngineConfig {
            block_size: 0,
            ..Default::default()
        });

        assert!(matches!(
            builder.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_build_produces_stopped_engine() {
        let engine = RouteAudio::builder()
            .add_output("speakers", OutputTarget::default_device())
            .build()
            .unwrap();

        assert!(!engine.is_running());
        let handle = engine.output(&"speakers".into()).unwrap();
        assert!(handle.is_enabled());
        assert_eq!(handle.gain(), 1.0);
    }

    #[test]
    fn test_build_applies_initial_settings() {
        let engine = RouteAudio::builder()
            .add_output_with(
                "quiet",
                OutputTarget::default_device(),
                ChannelSettings {
                    enabled: true,
                    gain: 0.25,
                    delay_ms: 120.0,
                },
            )
            .build()
            .unwrap();

        let handle = engine.output(&"quiet".into()).unwrap();
        assert_eq!(handle.gain(), 0.25);
        assert_eq!(handle.delay_ms(), 120.0);
    }
}
