//! Source/signal state engine.
//!
//! [`SourceEngine`] owns which source drives the display pipeline and what
//! state its signal is in. Public operations and queued events are both
//! serialized by one coarse lock around [`EngineCore`]; handlers run to
//! completion, including blocking collaborator calls.
//!
//! Outbound [`TvEvent`]s are collected while the lock is held and delivered
//! to the observer after it is released, so an observer may call back into
//! the engine. Delivery follows the order in which the state changed and is
//! never nested: one thread drains at a time, and events emitted meanwhile
//! (by other threads, or by the observer calling back in) are handed out by
//! that thread after the current callback returns. An operation can
//! therefore return before its own events have reached the observer.

mod dispatch;
mod scan;
mod signal;
mod state;
mod switch;

pub use state::{Action, AnalysisResume, EngineState, PipelineFlags, ScanMode, ScanSession};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use tvsource_protocol::{
    BlockState, EngineError, ProgramIds, ScanParams, SignalInfo, SourceInput, TvEvent, WindowRect,
    HDMI_PORT_COUNT,
};

use crate::config::EngineConfig;
use crate::device::{DeviceResult, Devices};
use crate::event::EngineEvent;
use crate::observer::EngineObserver;
use crate::queue::{EventQueue, EventSender};

/// Name of the engine worker thread.
pub const WORKER_THREAD_NAME: &str = "tvsource-engine";

/// Log a failed best-effort collaborator call. Returns true on success.
fn best_effort(what: &str, result: DeviceResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("[SourceEngine] {} failed: {}", what, e);
            false
        }
    }
}

/// Everything guarded by the engine lock.
pub(crate) struct EngineCore {
    state: EngineState,
    devices: Devices,
    config: EngineConfig,
    sender: EventSender<EngineEvent>,
    outbox: Vec<TvEvent>,
}

impl EngineCore {
    fn emit(&mut self, event: TvEvent) {
        self.outbox.push(event);
    }

    fn post(&self, event: EngineEvent, delay: Duration) {
        if !self.sender.send(event, delay) {
            debug!("[SourceEngine] Event queue closed, follow-up dropped");
        }
    }

    fn emit_signal_info(&mut self) {
        let event = TvEvent::SignalInfo {
            source: self.state.current_source,
            info: self.state.current_signal,
        };
        self.emit(event);
    }

    fn restore_edid(&self) {
        for port in 0..HDMI_PORT_COUNT {
            match self.devices.settings.load_edid(port) {
                Ok(Some(edid)) => {
                    best_effort("load EDID", self.devices.video_in.load_edid(&edid));
                }
                Ok(None) => {}
                Err(e) => warn!("[SourceEngine] Failed to read EDID for port {}: {}", port, e),
            }
        }
    }

    fn initial_source(&self) -> SourceInput {
        match self.devices.settings.load_source() {
            Ok(Some(source)) if source.is_valid() => return source,
            Ok(_) => {}
            Err(e) => warn!("[SourceEngine] Failed to load saved source: {}", e),
        }
        self.config.default_source().unwrap_or_else(|e| {
            warn!("[SourceEngine] {}, falling back to {}", e, SourceInput::Tv);
            SourceInput::Tv
        })
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.state.started {
            debug!("[SourceEngine] Already started");
            return Ok(());
        }
        best_effort(
            "start signal detector",
            self.devices.detector.start(self.sender.clone()),
        );
        self.state.started = true;

        let source = self.initial_source();
        info!("[SourceEngine] Starting on {}", source);
        self.switch_source(source, source)
    }

    fn stop(&mut self) {
        if self.state.is_scanning() {
            self.force_stop_scan();
        }
        self.state.action = Action::Stopping;

        best_effort("stop decoder", self.devices.decoder.stop());
        best_effort("close video-in port", self.devices.video_in.close_port());
        best_effort("close frontend", self.devices.frontend.close());
        best_effort("stop signal detector", self.devices.detector.stop());

        let dropped = self.sender.remove_pending(|e| e.kind().is_follow_up());
        if dropped > 0 {
            debug!("[SourceEngine] Dropped {} pending follow-up(s)", dropped);
        }

        self.state.reset();
        info!("[SourceEngine] Stopped");
    }

    fn set_preview_window(&mut self, rect: WindowRect) -> Result<(), EngineError> {
        self.devices
            .decoder
            .set_window(rect)
            .map_err(|e| EngineError::Device(e.to_string()))?;
        self.state.preview = if rect.is_full_screen() { None } else { Some(rect) };
        debug!("[SourceEngine] Preview window {:?}", self.state.preview);
        Ok(())
    }

    fn play_program(&mut self, program: ProgramIds) -> Result<(), EngineError> {
        let source = self.state.current_source;
        if !source.is_tuner() {
            return Err(EngineError::InvalidState(format!(
                "cannot play a program on {}",
                source
            )));
        }
        if !matches!(self.state.action, Action::Idle | Action::Playing) {
            return Err(EngineError::InvalidState(format!(
                "cannot play while {}",
                self.state.action.name()
            )));
        }
        if program.frequency_hz == 0 {
            return Err(EngineError::InvalidParameter("frequency must be non-zero".into()));
        }

        self.devices
            .frontend
            .tune(program.frequency_hz)
            .map_err(|e| EngineError::Device(e.to_string()))?;
        self.devices
            .decoder
            .play_program(&program)
            .map_err(|e| EngineError::Device(e.to_string()))?;

        if let Some(class) = source.ownership_class() {
            if let Err(e) = self.devices.settings.save_program(class, &program) {
                warn!("[SourceEngine] Failed to save program: {}", e);
            }
        }
        self.state.action = Action::Playing;
        info!(
            "[SourceEngine] Playing service {} at {} Hz on {}",
            program.service_id, program.frequency_hz, source
        );
        Ok(())
    }

    fn stop_program(&mut self) {
        if self.state.action == Action::Playing {
            best_effort("stop decoder", self.devices.decoder.stop());
            self.state.action = Action::Idle;
        }
    }

    /// Apply a channel-lock decision for the current program.
    fn set_channel_block(&mut self, blocked: bool) {
        let lock_enabled = self.devices.settings.channel_lock_enabled().unwrap_or_else(|e| {
            warn!("[SourceEngine] Failed to read channel lock flag: {}", e);
            false
        });
        let next = if blocked && lock_enabled {
            BlockState::Blocked
        } else {
            BlockState::Unblocked
        };

        self.state.last_block = self.state.block;
        self.state.block = next;
        let source = self.state.current_source;

        match (self.state.last_block, next) {
            (last, BlockState::Blocked) if last != BlockState::Blocked => {
                info!("[SourceEngine] Blocking {}", source);
                self.show_color(self.config.block_color);
                best_effort("disable video", self.devices.decoder.disable_video());
                self.emit(TvEvent::ChannelBlock {
                    source,
                    blocked: true,
                });
            }
            (BlockState::Blocked, BlockState::Unblocked) => {
                info!("[SourceEngine] Unblocking {}", source);
                if self.state.current_signal.is_stable() && !self.state.is_scanning() {
                    self.show_video();
                    self.post(EngineEvent::EnableVideoLater, self.config.enable_video_delay());
                }
                self.emit(TvEvent::ChannelBlock {
                    source,
                    blocked: false,
                });
            }
            _ => {}
        }
    }

    fn is_source_connected(&self, source: SourceInput) -> bool {
        match self.state.connections.get(&source) {
            Some(connected) => *connected,
            None => self.devices.detector.is_connected(source),
        }
    }
}

/// The engine. One per process.
pub struct SourceEngine {
    core: Mutex<EngineCore>,
    queue: EventQueue<EngineEvent>,
    observer: RwLock<Option<Arc<dyn EngineObserver>>>,
    /// Emitted events not yet handed to the observer.
    pending: Mutex<VecDeque<TvEvent>>,
    delivering: AtomicBool,
}

impl SourceEngine {
    pub fn new(devices: Devices, config: EngineConfig) -> Arc<Self> {
        let queue = EventQueue::new();
        let core = EngineCore {
            state: EngineState::default(),
            devices,
            config,
            sender: queue.sender(),
            outbox: Vec::new(),
        };
        Arc::new(Self {
            core: Mutex::new(core),
            queue,
            observer: RwLock::new(None),
            pending: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
        })
    }

    /// Run `f` under the engine lock, then deliver whatever it emitted.
    fn with_core<R>(&self, f: impl FnOnce(&mut EngineCore) -> R) -> R {
        let result = {
            let mut core = self.core.lock();
            let result = f(&mut core);
            // Queued under the core lock so the queue follows state order.
            if !core.outbox.is_empty() {
                self.pending.lock().extend(core.outbox.drain(..));
            }
            result
        };
        self.deliver_pending();
        result
    }

    fn with_open<R>(
        &self,
        f: impl FnOnce(&mut EngineCore) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        self.with_core(|core| {
            if !core.state.opened {
                return Err(EngineError::NotOpen);
            }
            f(core)
        })
    }

    /// Drain the pending queue unless another caller already is.
    fn deliver_pending(&self) {
        loop {
            if self
                .delivering
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            loop {
                // The queue lock must not be held across the callback.
                let next = self.pending.lock().pop_front();
                let Some(event) = next else {
                    break;
                };
                self.deliver(event);
            }
            self.delivering.store(false, Ordering::Release);
            // Events queued between the last pop and the store above.
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, event: TvEvent) {
        let observer = self.observer.read().clone();
        match observer {
            Some(observer) => observer.on_event(event),
            None => debug!("[SourceEngine] No observer, dropped {:?}", event),
        }
    }

    /// Initialize state, restore per-port EDID and start the event worker.
    pub fn open(self: &Arc<Self>) -> Result<(), EngineError> {
        self.with_core(|core| {
            if core.state.opened {
                return Err(EngineError::AlreadyOpen);
            }
            core.state = EngineState::default();
            core.state.opened = true;
            core.restore_edid();
            Ok(())
        })?;

        let engine = Arc::downgrade(self);
        let started = self.queue.start(WORKER_THREAD_NAME, move |event| {
            if let Some(engine) = engine.upgrade() {
                engine.handle(event);
            }
        });
        if let Err(e) = started {
            self.core.lock().state.opened = false;
            return Err(EngineError::Device(e.to_string()));
        }

        info!("[SourceEngine] Opened");
        Ok(())
    }

    /// Stop everything and shut the event worker down. Idempotent.
    pub fn close(&self) -> Result<(), EngineError> {
        let was_open = self.with_core(|core| {
            if !core.state.opened {
                return false;
            }
            core.stop();
            core.state.opened = false;
            true
        });
        self.queue.shutdown();
        if was_open {
            info!("[SourceEngine] Closed");
        }
        Ok(())
    }

    /// Start the detector and select the saved source.
    pub fn start(&self) -> Result<(), EngineError> {
        self.with_open(|core| core.start())
    }

    /// Tear the pipeline down and reset to the initial state.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.stop();
            Ok(())
        })
    }

    pub fn switch_source(
        &self,
        virtual_source: SourceInput,
        source: SourceInput,
    ) -> Result<(), EngineError> {
        self.with_open(|core| core.switch_source(virtual_source, source))
    }

    /// Move the output into a window. A zero-sized rectangle returns to full
    /// screen.
    pub fn set_preview_window(&self, rect: WindowRect) -> Result<(), EngineError> {
        self.with_open(|core| core.set_preview_window(rect))
    }

    pub fn start_scan(&self, params: ScanParams) -> Result<(), EngineError> {
        self.with_open(|core| core.start_scan(params))
    }

    pub fn stop_scan(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.stop_scan();
            Ok(())
        })
    }

    pub fn pause_scan(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.pause_scan();
            Ok(())
        })
    }

    pub fn resume_scan(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.resume_scan();
            Ok(())
        })
    }

    /// Queue a single-channel analysis.
    pub fn analyze_channel(&self, frequency_hz: u32) -> Result<(), EngineError> {
        if frequency_hz == 0 {
            return Err(EngineError::InvalidParameter("frequency must be non-zero".into()));
        }
        self.with_open(|core| {
            core.post(EngineEvent::StartAnalyze { frequency_hz }, Duration::ZERO);
            Ok(())
        })
    }

    pub fn stop_analyze(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.post(EngineEvent::StopAnalyze, Duration::ZERO);
            Ok(())
        })
    }

    pub fn play_program(&self, program: ProgramIds) -> Result<(), EngineError> {
        self.with_open(|core| core.play_program(program))
    }

    pub fn stop_program(&self) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.stop_program();
            Ok(())
        })
    }

    pub fn set_channel_block(&self, blocked: bool) -> Result<(), EngineError> {
        self.with_open(|core| {
            core.set_channel_block(blocked);
            Ok(())
        })
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn EngineObserver>>) {
        *self.observer.write() = observer;
    }

    /// Enqueue an inbound event for the worker.
    pub fn post(&self, event: EngineEvent) -> bool {
        self.queue.sender().send_now(event)
    }

    /// Producer handle for collaborators that report asynchronously.
    pub fn sender(&self) -> EventSender<EngineEvent> {
        self.queue.sender()
    }

    /// Handle one event synchronously. Called by the worker for every queued
    /// message.
    pub fn handle(&self, event: EngineEvent) {
        self.with_core(|core| {
            if !core.state.opened {
                debug!("[SourceEngine] Not open, ignoring {:?}", event.kind());
                return;
            }
            core.dispatch(event);
        });
    }

    pub fn current_source_input(&self) -> SourceInput {
        self.core.lock().state.current_source
    }

    pub fn virtual_source(&self) -> SourceInput {
        self.core.lock().state.virtual_source
    }

    pub fn last_source(&self) -> SourceInput {
        self.core.lock().state.last_source
    }

    pub fn current_signal_info(&self) -> SignalInfo {
        self.core.lock().state.current_signal
    }

    pub fn previous_signal_info(&self) -> SignalInfo {
        self.core.lock().state.previous_signal
    }

    pub fn action(&self) -> Action {
        self.core.lock().state.action
    }

    pub fn flags(&self) -> PipelineFlags {
        self.core.lock().state.flags
    }

    pub fn block_state(&self) -> BlockState {
        self.core.lock().state.block
    }

    pub fn is_open(&self) -> bool {
        self.core.lock().state.opened
    }

    pub fn is_scanning(&self) -> bool {
        self.core.lock().state.is_scanning()
    }

    pub fn is_source_connected(&self, source: SourceInput) -> bool {
        self.core.lock().is_source_connected(source)
    }

    #[cfg(test)]
    pub(crate) fn state_snapshot(&self) -> EngineState {
        self.core.lock().state.clone()
    }

    #[cfg(test)]
    pub(crate) fn set_action(&self, action: Action) {
        self.core.lock().state.action = action;
    }
}
