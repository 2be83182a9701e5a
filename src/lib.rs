//! # route-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time audio distribution with per-output delay and gain.
//!
//! `route-audio` captures a live stream from one input device via CPAL and
//! fans it out to any number of independent output devices. Each output has
//! its own enable flag, linear gain, and propagation delay (0-500ms), all
//! adjustable while audio is running.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use route_audio::{RouteAudio, InputSelection, OutputTarget};
//!
//! let engine = RouteAudio::builder()
//!     .add_output("speakers", OutputTarget::default_device())
//!     .add_output("hdmi", OutputTarget::device("HDMI Audio"))
//!     .on_event(|e| tracing::info!(?e, "engine event"))
//!     .build()?;
//!
//! // Live controls - valid before and during playback
//! let hdmi = engine.output(&"hdmi".into()).unwrap();
//! hdmi.set_gain(0.8);
//! hdmi.set_delay_ms(120.0);
//!
//! engine.start(InputSelection::default_device())?;
//!
//! // ... audio flows until stop() ...
//!
//! engine.stop(); // returns immediately; EngineEvent::Stopped signals completion
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **CPAL callbacks**: one capture and N playback callbacks, driven by the
//!   hardware; they never block, allocate, or take locks
//! - **Ring buffer**: a single-writer/multi-reader history window; each
//!   output reads at its own delay offset behind the write cursor
//! - **Control thread**: owns every stream and performs start/stop teardown,
//!   so stopping a slow device never stalls the caller
//!
//! Per-output gain, delay, and enable state are plain atomics read once per
//! callback invocation, so the control layer can mutate them at any time.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod config;
mod controls;
mod device;
mod engine;
mod error;
mod event;
mod pipeline;

pub use builder::{RouteAudio, RouteAudioBuilder};
pub use config::{EngineConfig, MAX_DELAY_MS};
pub use controls::{ChannelSettings, OutputHandle};
pub use device::{
    default_input_device_name, list_input_devices, list_output_devices, DeviceId, InputSelection,
    OutputTarget,
};
pub use engine::{Engine, EngineState, EngineStats};
pub use error::EngineError;
pub use event::{event_callback, EngineEvent, EventCallback};
