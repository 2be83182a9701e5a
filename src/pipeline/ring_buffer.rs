//! Shared history ring buffer for delayed multi-output reads.
//!
//! One [`RingWriter`] (the capture callback) appends interleaved frames and
//! advances the write cursor; any number of cloned [`RingReader`]s (the
//! playback callbacks) copy frames at their own offset behind the cursor.
//! Unlike a pop-based queue, reads never consume data - the buffer is a
//! rolling window of the most recent `capacity_frames` of history, and each
//! reader picks its position per invocation from its configured delay.
//!
//! Samples live in relaxed `AtomicU32` cells holding `f32` bit patterns; the
//! cursor is published with `Release` only after a block is fully copied, so
//! a reader that observes the new cursor also observes the samples behind
//! it. A reader whose window is overwritten mid-copy gets stale or mixed
//! samples rather than torn memory - acceptable here because capacity is
//! validated at start to keep every window far behind the write frontier.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

struct RingShared {
    /// Interleaved sample cells, `capacity_frames * channels` long.
    storage: Box<[AtomicU32]>,
    /// Next frame slot the writer will overwrite, in `[0, capacity_frames)`.
    write_cursor: AtomicUsize,
    capacity_frames: usize,
    channels: usize,
}

/// Fixed-capacity multichannel audio history buffer.
pub(crate) struct AudioRingBuffer;

impl AudioRingBuffer {
    /// Allocates a buffer of `capacity_frames * channels` zeroed samples and
    /// splits it into its single writer and a cloneable reader.
    pub fn allocate(capacity_frames: usize, channels: u16) -> (RingWriter, RingReader) {
        let channels = usize::from(channels.max(1));
        let capacity_frames = capacity_frames.max(1);
        let storage = (0..capacity_frames * channels)
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let shared = Arc::new(RingShared {
            storage,
            write_cursor: AtomicUsize::new(0),
            capacity_frames,
            channels,
        });

        (
            RingWriter {
                ring: Arc::clone(&shared),
            },
            RingReader { ring: shared },
        )
    }
}

/// Wrapping arithmetic for the delayed read position:
/// `(cursor - delay_frames - frame_count) mod capacity`.
pub(crate) fn delayed_read_start(
    cursor: usize,
    delay_frames: usize,
    frame_count: usize,
    capacity_frames: usize,
) -> usize {
    let span = (delay_frames + frame_count) % capacity_frames;
    (cursor + capacity_frames - span) % capacity_frames
}

/// Exclusive producer side of the ring.
///
/// There is exactly one writer per buffer; `write` is the only mutation and
/// runs on the capture callback thread. Not `Clone` - single-writer by
/// construction.
pub(crate) struct RingWriter {
    ring: Arc<RingShared>,
}

impl RingWriter {
    /// Appends a block of interleaved `f32` frames.
    ///
    /// Wraps across the end of storage with a two-segment copy, then
    /// publishes the advanced cursor. A block longer than the whole buffer
    /// keeps only its trailing window. Lock-free and allocation-free.
    pub fn write(&mut self, block: &[f32]) {
        let channels = self.ring.channels;
        self.write_samples(block.len() / channels, |i| block[i]);
    }

    /// Appends a block of interleaved `i16` frames, converting to
    /// normalized `f32` inline (no scratch buffer on the callback path).
    pub fn write_i16(&mut self, block: &[i16]) {
        let channels = self.ring.channels;
        self.write_samples(block.len() / channels, |i| f32::from(block[i]) / 32768.0);
    }

    fn write_samples(&mut self, mut frames: usize, sample_at: impl Fn(usize) -> f32) {
        if frames == 0 {
            return;
        }
        let ring = &*self.ring;
        let capacity = ring.capacity_frames;
        let channels = ring.channels;

        // Only the trailing window of an oversized block survives anyway.
        let mut skip_frames = 0;
        if frames > capacity {
            skip_frames = frames - capacity;
            frames = capacity;
        }

        // Cursor is owned exclusively by this writer; relaxed load suffices.
        let cursor = ring.write_cursor.load(Ordering::Relaxed);
        let first = frames.min(capacity - cursor);
        let second = frames - first;

        for i in 0..first * channels {
            let sample = sample_at((skip_frames * channels) + i);
            ring.storage[cursor * channels + i].store(sample.to_bits(), Ordering::Relaxed);
        }
        for i in 0..second * channels {
            let sample = sample_at((skip_frames + first) * channels + i);
            ring.storage[i].store(sample.to_bits(), Ordering::Relaxed);
        }

        // Publish only after the copy so readers never see a half-written
        // region as new data.
        ring.write_cursor
            .store((cursor + frames) % capacity, Ordering::Release);
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.ring.write_cursor.load(Ordering::Acquire)
    }
}

/// Shared consumer side of the ring.
///
/// Cloneable; every playback callback holds its own reader. All methods are
/// side-effect free and safe to call concurrently with the writer and with
/// other readers.
#[derive(Clone)]
pub(crate) struct RingReader {
    ring: Arc<RingShared>,
}

impl RingReader {
    /// One cursor snapshot per callback invocation.
    pub fn snapshot(&self) -> usize {
        self.ring.write_cursor.load(Ordering::Acquire)
    }

    /// Copies `out.len() / channels` frames starting at
    /// `start_frame mod capacity`, wrapping like the writer does.
    pub fn read_at(&self, start_frame: usize, out: &mut [f32]) {
        let ring = &*self.ring;
        let capacity = ring.capacity_frames;
        let channels = ring.channels;
        // A window longer than capacity has no meaning; copy what exists
        // and leave the tail untouched.
        let frames = (out.len() / channels).min(capacity);

        let start = start_frame % capacity;
        let first = frames.min(capacity - start);
        let second = frames - first;

        for i in 0..first * channels {
            out[i] = f32::from_bits(ring.storage[start * channels + i].load(Ordering::Relaxed));
        }
        for i in 0..second * channels {
            out[first * channels + i] = f32::from_bits(ring.storage[i].load(Ordering::Relaxed));
        }
    }

    /// Snapshots the cursor once and copies the window ending `delay_frames`
    /// behind it.
    pub fn read_delayed(&self, delay_frames: usize, out: &mut [f32]) {
        let frames = out.len() / self.ring.channels;
        let start = delayed_read_start(
            self.snapshot(),
            delay_frames,
            frames,
            self.ring.capacity_frames,
        );
        self.read_at(start, out);
    }
}
