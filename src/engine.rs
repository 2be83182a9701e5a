//! Engine lifecycle: the controller that owns streams and supervises
//! start/stop.
//!
//! `cpal::Stream` handles are not `Send`, so every stream lives on one
//! dedicated control thread spawned when the engine is built. The public
//! [`Engine`] handle talks to it over a command channel:
//!
//! - `start()` is synchronous - the caller waits for the reply and gets the
//!   originating error if any stream fails to open (after full rollback)
//! - `stop()` is fire-and-forget - the control thread performs the blocking
//!   teardown and emits [`EngineEvent::Stopped`] exactly once when finished
//! - `close()` is the process-exit path: synchronous teardown, bounded stall
//!   accepted
//!
//! The controller never touches audio data; the callbacks own the hot path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::RwLock;

use crate::config::EngineConfig;
use crate::controls::{ChannelSettings, OutputControls, OutputHandle};
use crate::device::{DeviceId, InputDevice, InputSelection, OutputDevice, OutputTarget};
use crate::event::{EngineEvent, EventCallback};
use crate::pipeline::{
    build_capture_stream, build_playback_stream, AudioRingBuffer, RingReader, RingWriter,
    SessionSpec,
};
use crate::EngineError;

/// Lifecycle state of the engine.
///
/// Transitions follow `Stopped → Starting → Running → Stopping → Stopped`;
/// nothing else is permitted. `Starting` and `Stopping` are transient -
/// `Starting` only for the duration of a `start()` call, `Stopping` between
/// `stop()` returning and the completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No streams exist; configuration may be changed freely.
    Stopped,
    /// A `start()` call is opening streams.
    Starting,
    /// Audio is flowing.
    Running,
    /// A stop was requested; the control thread is closing streams.
    Stopping,
}

impl EngineState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Counters since the engine was created.
///
/// Returned by [`Engine::stats()`]. Cumulative across restarts.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Capture callbacks that copied a block into the ring.
    pub blocks_captured: u64,
    /// Total frames written to the ring.
    pub frames_captured: u64,
    /// Callback faults that were contained (block dropped or silence
    /// emitted instead of propagating into the driver).
    pub faults_contained: u64,
}

/// Shared atomic counters behind [`EngineStats`].
pub(crate) struct EngineCounters {
    pub blocks_captured: AtomicU64,
    pub frames_captured: AtomicU64,
    pub faults_contained: AtomicU64,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self {
            blocks_captured: AtomicU64::new(0),
            frames_captured: AtomicU64::new(0),
            faults_contained: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            blocks_captured: self.blocks_captured.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            faults_contained: self.faults_contained.load(Ordering::Relaxed),
        }
    }
}

/// One registered output: where it routes and its live controls.
#[derive(Clone)]
pub(crate) struct OutputChannel {
    pub target: OutputTarget,
    pub controls: Arc<OutputControls>,
}

/// State shared between the `Engine` handle and the control thread.
pub(crate) struct EngineShared {
    pub config: EngineConfig,
    state: AtomicU8,
    pub outputs: RwLock<BTreeMap<DeviceId, OutputChannel>>,
    pub counters: Arc<EngineCounters>,
    pub events: Option<EventCallback>,
}

impl EngineShared {
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: EngineState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Single-transition CAS; returns `false` if another transition won.
    pub fn try_transition(&self, from: EngineState, to: EngineState) -> bool {
        self.state
            .compare_exchange(
                from.as_u8(),
                to.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn emit(&self, event: EngineEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }
}

/// A launched stream held by the control thread. Closing consumes it; for
/// CPAL this pauses the stream and drops the handle.
pub(crate) trait ActiveStream {
    fn close(self: Box<Self>) -> Result<(), String>;
}

struct CpalStream {
    stream: cpal::Stream,
}

impl ActiveStream for CpalStream {
    fn close(self: Box<Self>) -> Result<(), String> {
        use cpal::traits::StreamTrait;
        let result = self.stream.pause().map_err(|e| e.to_string());
        drop(self.stream);
        result
    }
}

/// Seam between the lifecycle logic and the audio backend.
///
/// The production implementation opens CPAL streams; tests substitute a
/// mock to exercise rollback and asynchronous stop without hardware.
pub(crate) trait StreamOpener: Send {
    /// Queries the native sample rate the session will run at.
    fn negotiate_input(&self, input: &InputSelection) -> Result<u32, EngineError>;

    /// Opens and launches the capture stream wired to the ring writer.
    fn open_capture(
        &self,
        input: &InputSelection,
        writer: RingWriter,
        spec: &SessionSpec,
        shared: &EngineShared,
    ) -> Result<(DeviceId, Box<dyn ActiveStream>), EngineError>;

    /// Opens and launches one playback stream bound to a channel.
    fn open_playback(
        &self,
        id: &DeviceId,
        channel: &OutputChannel,
        reader: RingReader,
        spec: &SessionSpec,
        shared: &EngineShared,
    ) -> Result<Box<dyn ActiveStream>, EngineError>;
}

struct CpalOpener;

impl StreamOpener for CpalOpener {
    fn negotiate_input(&self, input: &InputSelection) -> Result<u32, EngineError> {
        InputDevice::open(input)?.native_sample_rate()
    }

    fn open_capture(
        &self,
        input: &InputSelection,
        writer: RingWriter,
        spec: &SessionSpec,
        shared: &EngineShared,
    ) -> Result<(DeviceId, Box<dyn ActiveStream>), EngineError> {
        let device = InputDevice::open(input)?;
        let id = DeviceId::from(device.name());
        let stream = build_capture_stream(
            &device,
            spec,
            writer,
            Arc::clone(&shared.counters),
            shared.events.clone(),
        )?;
        Ok((id, Box::new(CpalStream { stream })))
    }

    fn open_playback(
        &self,
        id: &DeviceId,
        channel: &OutputChannel,
        reader: RingReader,
        spec: &SessionSpec,
        shared: &EngineShared,
    ) -> Result<Box<dyn ActiveStream>, EngineError> {
        let device = OutputDevice::open(&channel.target)?;
        let stream = build_playback_stream(
            &device,
            id,
            spec,
            Arc::clone(&channel.controls),
            reader,
            shared.events.clone(),
        )?;
        Ok(Box::new(CpalStream { stream }))
    }
}

enum EngineCommand {
    Start {
        input: InputSelection,
        reply: Sender<Result<(), EngineError>>,
    },
    Stop,
    Shutdown {
        reply: Sender<()>,
    },
}

/// Handle to the audio distribution engine.
///
/// Built by [`RouteAudioBuilder::build()`](crate::RouteAudioBuilder::build).
/// The engine persists across start/stop cycles; output channels and their
/// settings survive restarts.
pub struct Engine {
    shared: Arc<EngineShared>,
    commands: Sender<EngineCommand>,
    control: Option<JoinHandle<()>>,
}

impl Engine {
    pub(crate) fn spawn(
        config: EngineConfig,
        outputs: BTreeMap<DeviceId, OutputChannel>,
        events: Option<EventCallback>,
    ) -> Result<Self, EngineError> {
        Self::spawn_with_opener(config, outputs, events, Box::new(CpalOpener))
    }

    fn spawn_with_opener(
        config: EngineConfig,
        outputs: BTreeMap<DeviceId, OutputChannel>,
        events: Option<EventCallback>,
        opener: Box<dyn StreamOpener>,
    ) -> Result<Self, EngineError> {
        let shared = Arc::new(EngineShared {
            config,
            state: AtomicU8::new(EngineState::Stopped.as_u8()),
            outputs: RwLock::new(outputs),
            counters: Arc::new(EngineCounters::new()),
            events,
        });

        let (commands, command_rx) = unbounded();
        let thread_shared = Arc::clone(&shared);
        let control = std::thread::Builder::new()
            .name("engine-control".to_string())
            .spawn(move || control_loop(thread_shared, command_rx, opener))
            .map_err(|e| EngineError::BackendError(format!("control thread: {e}")))?;

        Ok(Self {
            shared,
            commands,
            control: Some(control),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Returns `true` while audio is flowing.
    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Capture counters since the engine was created.
    pub fn stats(&self) -> EngineStats {
        self.shared.counters.snapshot()
    }

    /// Starts the engine against the selected input device.
    ///
    /// Negotiates the input's native sample rate, allocates the ring buffer,
    /// then launches the capture stream and one playback stream per
    /// *enabled* output. If anything fails, every stream opened during this
    /// attempt is closed again and the originating error is returned -
    /// partial success is never left running.
    ///
    /// Calling `start()` while not stopped is a logged no-op.
    ///
    /// # Errors
    ///
    /// Device resolution, configuration validation, and stream-open failures
    /// are reported synchronously.
    pub fn start(&self, input: InputSelection) -> Result<(), EngineError> {
        if !self
            .shared
            .try_transition(EngineState::Stopped, EngineState::Starting)
        {
            tracing::warn!(state = ?self.state(), "start ignored; engine is not stopped");
            return Ok(());
        }

        let (reply, result) = bounded(1);
        if self
            .commands
            .send(EngineCommand::Start { input, reply })
            .is_err()
        {
            self.shared.set_state(EngineState::Stopped);
            return Err(EngineError::EngineClosed);
        }

        match result.recv() {
            Ok(outcome) => outcome,
            Err(_) => {
                self.shared.set_state(EngineState::Stopped);
                Err(EngineError::EngineClosed)
            }
        }
    }

    /// Requests a stop and returns immediately.
    ///
    /// The state flips to `Stopping` before this returns, blocking further
    /// `start()` and membership calls; the control thread then closes every
    /// stream (a misbehaving driver may stall *it*, never the caller) and
    /// emits [`EngineEvent::Stopped`] exactly once when the engine is back
    /// in `Stopped`.
    ///
    /// Calling `stop()` while not running is a no-op.
    pub fn stop(&self) {
        if !self
            .shared
            .try_transition(EngineState::Running, EngineState::Stopping)
        {
            tracing::debug!(state = ?self.state(), "stop ignored; engine is not running");
            return;
        }

        tracing::info!("stop requested; teardown handed to control thread");
        if self.commands.send(EngineCommand::Stop).is_err() {
            // Control thread already gone; there is nothing left to close.
            self.shared.set_state(EngineState::Stopped);
        }
    }

    /// Stops synchronously and shuts the engine down.
    ///
    /// The process-exit path: unlike [`stop()`](Self::stop) this blocks the
    /// caller until every stream is closed and the control thread has
    /// exited. Dropping the engine does the same as a fallback.
    pub fn close(mut self) {
        self.shutdown();
    }

    /// Looks up the live-control handle for a registered output.
    pub fn output(&self, id: &DeviceId) -> Option<OutputHandle> {
        let outputs = self.shared.outputs.read();
        outputs
            .get(id)
            .map(|channel| OutputHandle::new(id.clone(), Arc::clone(&channel.controls)))
    }

    /// Handles for every registered output, in id order.
    pub fn outputs(&self) -> Vec<OutputHandle> {
        let outputs = self.shared.outputs.read();
        outputs
            .iter()
            .map(|(id, channel)| OutputHandle::new(id.clone(), Arc::clone(&channel.controls)))
            .collect()
    }

    /// Registers a new output with default settings.
    ///
    /// # Errors
    ///
    /// Returns `NotStopped` while the engine is running (membership changes
    /// apply at the next start, so they are only accepted from `Stopped`),
    /// or `DuplicateOutput` if the id is taken.
    pub fn add_output(
        &self,
        id: impl Into<DeviceId>,
        target: OutputTarget,
    ) -> Result<OutputHandle, EngineError> {
        self.add_output_with(id, target, ChannelSettings::default())
    }

    /// Registers a new output with explicit initial settings.
    ///
    /// # Errors
    ///
    /// Same conditions as [`add_output()`](Self::add_output).
    pub fn add_output_with(
        &self,
        id: impl Into<DeviceId>,
        target: OutputTarget,
        settings: ChannelSettings,
    ) -> Result<OutputHandle, EngineError> {
        let id = id.into();
        if self.state() != EngineState::Stopped {
            return Err(EngineError::NotStopped);
        }
        let mut outputs = self.shared.outputs.write();
        if outputs.contains_key(&id) {
            return Err(EngineError::DuplicateOutput {
                device: id.to_string(),
            });
        }
        let controls = Arc::new(OutputControls::new(settings));
        outputs.insert(
            id.clone(),
            OutputChannel {
                target,
                controls: Arc::clone(&controls),
            },
        );
        Ok(OutputHandle::new(id, controls))
    }

    /// Removes an output from the registry.
    ///
    /// Returns `true` if the id was present. Existing [`OutputHandle`]s for
    /// the removed channel keep working but control nothing.
    ///
    /// # Errors
    ///
    /// Returns `NotStopped` while the engine is running.
    pub fn remove_output(&self, id: &DeviceId) -> Result<bool, EngineError> {
        if self.state() != EngineState::Stopped {
            return Err(EngineError::NotStopped);
        }
        Ok(self.shared.outputs.write().remove(id).is_some())
    }

    fn shutdown(&mut self) {
        let Some(control) = self.control.take() else {
            return;
        };
        let (reply, done) = bounded(1);
        if self.commands.send(EngineCommand::Shutdown { reply }).is_ok() {
            let _ = done.recv();
        }
        let _ = control.join();
        self.shared.set_state(EngineState::Stopped);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Streams owned by the control thread for one running session.
struct ActiveSession {
    streams: Vec<(DeviceId, Box<dyn ActiveStream>)>,
    sample_rate: u32,
    output_count: usize,
}

fn control_loop(
    shared: Arc<EngineShared>,
    commands: Receiver<EngineCommand>,
    opener: Box<dyn StreamOpener>,
) {
    let mut session: Option<ActiveSession> = None;

    while let Ok(command) = commands.recv() {
        match command {
            EngineCommand::Start { input, reply } => {
                let outcome = match start_session(opener.as_ref(), &shared, &input) {
                    Ok(new_session) => {
                        let outputs = new_session.output_count;
                        let sample_rate = new_session.sample_rate;
                        session = Some(new_session);
                        shared.set_state(EngineState::Running);
                        shared.emit(EngineEvent::Started {
                            sample_rate,
                            outputs,
                        });
                        tracing::info!(sample_rate, outputs, "engine running");
                        Ok(())
                    }
                    Err(error) => {
                        shared.set_state(EngineState::Stopped);
                        Err(error)
                    }
                };
                let _ = reply.send(outcome);
            }
            EngineCommand::Stop => match session.take() {
                Some(active) => teardown(active, &shared),
                None => shared.set_state(EngineState::Stopped),
            },
            EngineCommand::Shutdown { reply } => {
                if let Some(active) = session.take() {
                    shared.set_state(EngineState::Stopping);
                    teardown(active, &shared);
                }
                let _ = reply.send(());
                break;
            }
        }
    }
}

/// Opens every stream for a session: negotiate the rate, allocate the ring,
/// launch capture, then one playback per enabled output. Any failure closes
/// everything already opened in this attempt before returning the error.
fn start_session(
    opener: &dyn StreamOpener,
    shared: &EngineShared,
    input: &InputSelection,
) -> Result<ActiveSession, EngineError> {
    shared.config.validate()?;

    let sample_rate = opener.negotiate_input(input)?;
    let capacity_frames = shared.config.capacity_frames(sample_rate);
    let required_frames =
        EngineConfig::max_delay_frames(sample_rate) + shared.config.block_size as usize;
    if capacity_frames <= required_frames {
        return Err(EngineError::BufferTooSmall {
            capacity_frames,
            required_frames,
        });
    }

    let spec = SessionSpec {
        sample_rate,
        channels: shared.config.channels,
        block_size: shared.config.block_size,
    };
    let (writer, reader) = AudioRingBuffer::allocate(capacity_frames, spec.channels);

    let mut streams: Vec<(DeviceId, Box<dyn ActiveStream>)> = Vec::new();
    let (capture_id, capture) = opener.open_capture(input, writer, &spec, shared)?;
    tracing::info!(device = %capture_id, sample_rate, "capture stream launched");
    streams.push((capture_id, capture));

    // Snapshot the registry; enabled flags are read at this instant, so a
    // channel disabled now gets no stream until the next start.
    let outputs: Vec<(DeviceId, OutputChannel)> = shared
        .outputs
        .read()
        .iter()
        .map(|(id, channel)| (id.clone(), channel.clone()))
        .collect();

    let mut output_count = 0;
    for (id, channel) in outputs {
        if !channel.controls.enabled() {
            tracing::debug!(device = %id, "output disabled; no stream until next start");
            continue;
        }
        match opener.open_playback(&id, &channel, reader.clone(), &spec, shared) {
            Ok(stream) => {
                tracing::info!(device = %id, "playback stream launched");
                streams.push((id, stream));
                output_count += 1;
            }
            Err(error) => {
                tracing::error!(device = %id, %error, "output failed to open; rolling back");
                close_streams(streams, shared);
                return Err(error);
            }
        }
    }

    if output_count == 0 {
        tracing::warn!("no enabled outputs; capturing into the buffer only");
    }

    Ok(ActiveSession {
        streams,
        sample_rate,
        output_count,
    })
}

/// Closes a set of streams, tolerating individual failures. Used both for
/// start rollback and for the stop path.
fn close_streams(streams: Vec<(DeviceId, Box<dyn ActiveStream>)>, shared: &EngineShared) {
    for (device, stream) in streams {
        if let Err(error) = stream.close() {
            tracing::warn!(%device, %error, "stream close failed");
            shared.emit(EngineEvent::CloseFailed { device, error });
        }
    }
}

/// Full stop cycle: close everything, return to `Stopped`, notify once.
fn teardown(session: ActiveSession, shared: &EngineShared) {
    tracing::info!(streams = session.streams.len(), "closing streams");
    close_streams(session.streams, shared);
    shared.set_state(EngineState::Stopped);
    shared.emit(EngineEvent::Stopped);
    tracing::info!("engine stopped");
}
