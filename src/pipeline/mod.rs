//! Real-time audio pipeline.
//!
//! The pipeline connects one capture stream to N playback streams through a
//! shared history buffer:
//!
//! ```text
//! Capture callback → Ring Buffer → N × Playback callbacks (delay + gain)
//! ```
//!
//! - **Ring buffer**: single-writer/multi-reader history window; readers
//!   never consume, they copy at an offset behind the write cursor
//! - **Capture**: writes each hardware block and publishes the cursor
//! - **Playback**: one stream per enabled output, each applying its own
//!   enable/delay/gain per invocation
//!
//! Every callback is lock-free and allocation-free.

pub(crate) mod capture;
pub(crate) mod playback;
mod ring_buffer;

pub(crate) use capture::build_capture_stream;
pub(crate) use playback::build_playback_stream;
pub(crate) use ring_buffer::{AudioRingBuffer, RingReader, RingWriter};

/// Parameters fixed for one engine session, shared by every stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionSpec {
    /// Sample rate negotiated from the input device's native rate.
    pub sample_rate: u32,
    /// Interleaved channel count for capture and playback.
    pub channels: u16,
    /// Frames per hardware callback, requested for every stream.
    pub block_size: u32,
}

impl SessionSpec {
    /// The CPAL stream configuration every stream in the session uses.
    pub fn stream_config(&self) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.block_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_spec_stream_config() {
        let spec = SessionSpec {
            sample_rate: 44100,
            channels: 2,
            block_size: 4096,
        };
        let config = spec.stream_config();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, cpal::SampleRate(44100));
        assert!(matches!(config.buffer_size, cpal::BufferSize::Fixed(4096)));
    }
}
