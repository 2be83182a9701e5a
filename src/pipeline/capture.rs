//! Capture stream construction - the producer side of the ring.
//!
//! The hardware callback does exactly one thing: copy the incoming block
//! into the ring buffer and bump the counters. No allocation, no locks, no
//! backpressure - if the outputs fall behind, the buffer is overwritten
//! after one full lap and the oldest audio is silently lost.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream};

use crate::device::{DeviceId, InputDevice};
use crate::engine::EngineCounters;
use crate::event::{EngineEvent, EventCallback};
use crate::pipeline::{RingWriter, SessionSpec};
use crate::EngineError;

/// Builds and launches the input stream feeding the ring buffer.
///
/// The stream delivers interleaved blocks at the session's fixed channel
/// count, native sample rate, and requested block size. `I16` devices are
/// converted to normalized `f32` sample-by-sample inside the callback.
///
/// # Errors
///
/// Returns `UnsupportedFormat` for sample formats other than `F32`/`I16`,
/// or `StreamOpenFailed` if the stream cannot be built or started.
pub(crate) fn build_capture_stream(
    device: &InputDevice,
    spec: &SessionSpec,
    writer: RingWriter,
    counters: Arc<EngineCounters>,
    events: Option<EventCallback>,
) -> Result<Stream, EngineError> {
    let supported = device
        .raw()
        .default_input_config()
        .map_err(|e| EngineError::DeviceUnavailable {
            name: device.name(),
            reason: e.to_string(),
        })?;

    let config = spec.stream_config();
    let device_id = DeviceId::from(device.name());
    let channels = usize::from(spec.channels);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let mut writer = writer;
            device
                .raw()
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let copied = catch_unwind(AssertUnwindSafe(|| writer.write(data)));
                        record_block(&counters, copied.is_ok(), data.len() / channels);
                    },
                    stream_error_logger(device_id, events),
                    None,
                )
                .map_err(|e| EngineError::stream_open(device.name(), e.to_string()))?
        }
        SampleFormat::I16 => {
            let mut writer = writer;
            device
                .raw()
                .build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let copied = catch_unwind(AssertUnwindSafe(|| writer.write_i16(data)));
                        record_block(&counters, copied.is_ok(), data.len() / channels);
                    },
                    stream_error_logger(device_id, events),
                    None,
                )
                .map_err(|e| EngineError::stream_open(device.name(), e.to_string()))?
        }
        format => {
            return Err(EngineError::UnsupportedFormat {
                format: format!("{format:?}"),
            });
        }
    };

    stream
        .play()
        .map_err(|e| EngineError::stream_open(device.name(), e.to_string()))?;

    Ok(stream)
}

/// Bumps the capture counters; a contained fault skips the frame count.
fn record_block(counters: &EngineCounters, copied: bool, frames: usize) {
    if copied {
        counters.blocks_captured.fetch_add(1, Ordering::Relaxed);
        counters
            .frames_captured
            .fetch_add(frames as u64, Ordering::Relaxed);
    } else {
        counters.faults_contained.fetch_add(1, Ordering::Relaxed);
        tracing::error!("capture callback fault contained; block dropped");
    }
}

/// Error callback shared by every stream: log and surface as an event.
pub(crate) fn stream_error_logger(
    device: DeviceId,
    events: Option<EventCallback>,
) -> impl FnMut(cpal::StreamError) {
    move |err| {
        tracing::error!(%device, error = %err, "audio stream error");
        if let Some(ref callback) = events {
            callback(EngineEvent::StreamError {
                device: device.clone(),
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AudioRingBuffer;

    #[test]
    fn test_record_block_counts_frames() {
        let counters = EngineCounters::new();
        record_block(&counters, true, 4096);
        record_block(&counters, true, 4096);

        let stats = counters.snapshot();
        assert_eq!(stats.blocks_captured, 2);
        assert_eq!(stats.frames_captured, 8192);
        assert_eq!(stats.faults_contained, 0);
    }

    #[test]
    fn test_record_block_counts_faults() {
        let counters = EngineCounters::new();
        record_block(&counters, false, 4096);

        let stats = counters.snapshot();
        assert_eq!(stats.blocks_captured, 0);
        assert_eq!(stats.frames_captured, 0);
        assert_eq!(stats.faults_contained, 1);
    }

    #[test]
    fn test_contained_fault_leaves_ring_usable() {
        // The capture callback wraps the ring write in catch_unwind; a
        // fault must not poison the writer for subsequent blocks.
        let (mut writer, reader) = AudioRingBuffer::allocate(64, 1);

        let fault = catch_unwind(AssertUnwindSafe(|| panic!("injected")));
        assert!(fault.is_err());

        writer.write(&[0.5, 0.25]);
        let mut out = vec![0.0f32; 2];
        reader.read_delayed(0, &mut out);
        assert_eq!(out, vec![0.5, 0.25]);
    }
}
