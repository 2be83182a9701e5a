//! Runtime events for monitoring engine health.
//!
//! Events are non-fatal notifications about lifecycle progress and stream
//! behavior. The engine continues running after events are emitted - they're
//! for logging/metrics and for observing the asynchronous stop completion,
//! not error handling.

use std::sync::Arc;

use crate::device::DeviceId;

/// Runtime events emitted by the engine.
///
/// These are informational events, not errors. Use the [`EventCallback`] to
/// log them, update metrics, or re-enable UI controls once
/// [`Stopped`](EngineEvent::Stopped) arrives.
///
/// # Example
///
/// ```
/// use route_audio::EngineEvent;
///
/// fn handle_event(event: EngineEvent) {
///     match event {
///         EngineEvent::Started { sample_rate, outputs } => {
///             eprintln!("running at {sample_rate}Hz with {outputs} outputs");
///         }
///         EngineEvent::Stopped => {
///             eprintln!("all streams closed");
///         }
///         EngineEvent::StreamError { device, error } => {
///             eprintln!("stream fault on {device}: {error}");
///         }
///         EngineEvent::CloseFailed { device, error } => {
///             eprintln!("close failed for {device}: {error}");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine finished starting: every stream is open and playing.
    Started {
        /// Sample rate negotiated from the input device.
        sample_rate: u32,
        /// Number of output streams launched.
        outputs: usize,
    },

    /// A stop cycle completed and the engine is back in `Stopped`.
    ///
    /// `stop()` returns before teardown finishes; this event is the
    /// completion signal, delivered exactly once per stop cycle.
    Stopped,

    /// The audio backend reported a fault on a running stream.
    ///
    /// The engine keeps running; the affected stream may recover on its own
    /// or stay silent until the next restart.
    StreamError {
        /// Device whose stream faulted.
        device: DeviceId,
        /// Description of the fault.
        error: String,
    },

    /// A stream failed to close cleanly during stop.
    ///
    /// The remaining streams are still closed and the stop cycle completes
    /// normally - one faulty device cannot keep the engine running.
    CloseFailed {
        /// Device whose stream failed to close.
        device: DeviceId,
        /// Description of the failure.
        error: String,
    },
}

/// Callback type for receiving engine events.
///
/// Register an event callback via
/// [`RouteAudioBuilder::on_event()`](crate::RouteAudioBuilder::on_event) to
/// receive lifecycle notifications and stream fault reports.
///
/// # Example
///
/// ```ignore
/// use route_audio::RouteAudio;
///
/// let engine = RouteAudio::builder()
///     .on_event(|event| {
///         tracing::info!(?event, "engine event");
///     })
///     .build()?;
/// ```
pub type EventCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// This is a convenience function for creating event callbacks without
/// manually wrapping in `Arc`.
///
/// # Example
///
/// ```
/// use route_audio::{event_callback, EngineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(EngineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_debug() {
        let event = EngineEvent::Started {
            sample_rate: 48000,
            outputs: 3,
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("48000"));
    }

    #[test]
    fn test_event_callback_invocation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback = event_callback(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        callback(EngineEvent::Stopped);
        callback(EngineEvent::Stopped);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
