//! Live per-output controls shared between the control layer and callbacks.
//!
//! Gain, delay, and enable state are stored as individual atomics. An output
//! callback reads each value once per invocation; the control layer may write
//! them at any moment, including while audio is running. Last write wins -
//! there is no transactional consistency across the triple, and none is
//! needed since each field is consumed independently.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::config::MAX_DELAY_MS;
use crate::device::DeviceId;

/// Initial settings for an output channel.
///
/// # Example
///
/// ```
/// use route_audio::ChannelSettings;
///
/// let settings = ChannelSettings {
///     gain: 0.5,
///     delay_ms: 250.0,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSettings {
    /// Whether the output plays audio or emits silence.
    pub enabled: bool,
    /// Linear gain in `[0.0, 1.0]`.
    pub gain: f32,
    /// Propagation delay in milliseconds, `[0.0, 500.0]`.
    pub delay_ms: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            gain: 1.0,
            delay_ms: 0.0,
        }
    }
}

/// Lock-free storage for one output's live configuration.
///
/// Floats are stored as their bit pattern in an `AtomicU32` so the playback
/// callback can read them without locking.
pub(crate) struct OutputControls {
    enabled: AtomicBool,
    gain_bits: AtomicU32,
    delay_ms_bits: AtomicU32,
}

impl OutputControls {
    pub(crate) fn new(settings: ChannelSettings) -> Self {
        let controls = Self {
            enabled: AtomicBool::new(settings.enabled),
            gain_bits: AtomicU32::new(0),
            delay_ms_bits: AtomicU32::new(0),
        };
        controls.set_gain(settings.gain);
        controls.set_delay_ms(settings.delay_ms);
        controls
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }

    /// Clamps to `[0.0, 1.0]`; non-finite input mutes the channel.
    pub(crate) fn set_gain(&self, gain: f32) {
        let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
        self.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn delay_ms(&self) -> f32 {
        f32::from_bits(self.delay_ms_bits.load(Ordering::Relaxed))
    }

    /// Clamps to `[0.0, MAX_DELAY_MS]`; non-finite input resets to zero.
    pub(crate) fn set_delay_ms(&self, delay_ms: f32) {
        let delay_ms = if delay_ms.is_finite() {
            delay_ms.clamp(0.0, MAX_DELAY_MS)
        } else {
            0.0
        };
        self.delay_ms_bits.store(delay_ms.to_bits(), Ordering::Relaxed);
    }

    /// Current delay converted to whole frames at the session sample rate.
    pub(crate) fn delay_frames(&self, sample_rate: u32) -> usize {
        (self.delay_ms() / 1000.0 * sample_rate as f32).round() as usize
    }

    /// Snapshot of the current settings (reads each field independently).
    pub(crate) fn settings(&self) -> ChannelSettings {
        ChannelSettings {
            enabled: self.enabled(),
            gain: self.gain(),
            delay_ms: self.delay_ms(),
        }
    }
}

/// Handle for adjusting one output channel while the engine runs.
///
/// Returned by [`Engine::output()`](crate::Engine::output) and
/// [`Engine::add_output()`](crate::Engine::add_output). Handles stay valid
/// across start/stop cycles; setters take effect on the very next callback
/// of the corresponding stream.
///
/// # Example
///
/// ```ignore
/// let speakers = engine.output(&"speakers".into()).unwrap();
/// speakers.set_delay_ms(120.0);
/// speakers.set_gain(0.8);
/// speakers.set_enabled(false); // emits silence until re-enabled
/// ```
#[derive(Clone)]
pub struct OutputHandle {
    id: DeviceId,
    controls: Arc<OutputControls>,
}

impl OutputHandle {
    pub(crate) fn new(id: DeviceId, controls: Arc<OutputControls>) -> Self {
        Self { id, controls }
    }

    /// The id this output was registered under.
    pub fn device_id(&self) -> &DeviceId {
        &self.id
    }

    /// Returns `true` if the output currently plays audio.
    pub fn is_enabled(&self) -> bool {
        self.controls.enabled()
    }

    /// Enables or disables the output.
    ///
    /// A disabled output keeps its stream open (if the engine is running)
    /// and emits silence. An output disabled when the engine *starts* gets
    /// no stream until the next start.
    pub fn set_enabled(&self, enabled: bool) {
        self.controls.set_enabled(enabled);
    }

    /// Current linear gain in `[0.0, 1.0]`.
    pub fn gain(&self) -> f32 {
        self.controls.gain()
    }

    /// Sets the linear gain, clamped to `[0.0, 1.0]`.
    pub fn set_gain(&self, gain: f32) {
        self.controls.set_gain(gain);
    }

    /// Current propagation delay in milliseconds.
    pub fn delay_ms(&self) -> f32 {
        self.controls.delay_ms()
    }

    /// Sets the propagation delay, clamped to `[0.0, MAX_DELAY_MS]`.
    pub fn set_delay_ms(&self, delay_ms: f32) {
        self.controls.set_delay_ms(delay_ms);
    }

    /// Snapshot of all three settings.
    pub fn settings(&self) -> ChannelSettings {
        self.controls.settings()
    }
}

impl std::fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputHandle")
            .field("id", &self.id)
            .field("settings", &self.controls.settings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ChannelSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.gain, 1.0);
        assert_eq!(settings.delay_ms, 0.0);
    }

    #[test]
    fn test_gain_clamped() {
        let controls = OutputControls::new(ChannelSettings::default());
        controls.set_gain(1.5);
        assert_eq!(controls.gain(), 1.0);
        controls.set_gain(-0.3);
        assert_eq!(controls.gain(), 0.0);
        controls.set_gain(0.25);
        assert_eq!(controls.gain(), 0.25);
    }

    #[test]
    fn test_gain_nan_mutes() {
        let controls = OutputControls::new(ChannelSettings::default());
        controls.set_gain(f32::NAN);
        assert_eq!(controls.gain(), 0.0);
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let controls = OutputControls::new(ChannelSettings::default());
        controls.set_delay_ms(750.0);
        assert_eq!(controls.delay_ms(), MAX_DELAY_MS);
        controls.set_delay_ms(-10.0);
        assert_eq!(controls.delay_ms(), 0.0);
    }

    #[test]
    fn test_delay_frames_conversion() {
        let controls = OutputControls::new(ChannelSettings {
            delay_ms: 100.0,
            ..Default::default()
        });
        assert_eq!(controls.delay_frames(48000), 4800);
        assert_eq!(controls.delay_frames(44100), 4410);
    }

    #[test]
    fn test_handle_round_trip() {
        let handle = OutputHandle::new(
            DeviceId::new("speakers"),
            Arc::new(OutputControls::new(ChannelSettings::default())),
        );
        handle.set_gain(0.5);
        handle.set_delay_ms(200.0);
        handle.set_enabled(false);

        let settings = handle.settings();
        assert_eq!(settings.gain, 0.5);
        assert_eq!(settings.delay_ms, 200.0);
        assert!(!settings.enabled);
        assert_eq!(handle.device_id().as_str(), "speakers");
    }

    #[test]
    fn test_settings_applied_at_construction() {
        let controls = OutputControls::new(ChannelSettings {
            enabled: false,
            gain: 2.0,    // clamped
            delay_ms: 50.0,
        });
        assert!(!controls.enabled());
        assert_eq!(controls.gain(), 1.0);
        assert_eq!(controls.delay_ms(), 50.0);
    }
}
