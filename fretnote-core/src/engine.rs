//! # Detection Engine
//!
//! Glues the pipeline together. [`EngineState`] is the complete mutable
//! state of a detector and [`update`] advances it by one frame; [`NoteEngine`]
//! wraps both with the session control surface (`start`, `stop`,
//! `trigger_cooldown`) and pulls frames from a [`FrameSource`].
//!
//! Ticks are synchronous and never overlap, so nothing here locks.

use std::time::Instant;

use log::{debug, info, log_enabled, trace, warn, Level};
use serde::Serialize;

use crate::config::DetectorConfig;
use crate::detector::{DetectorPhase, FrameSignals, NoteCandidate, NoteState};
use crate::envelope::EnvelopeTracker;
use crate::error::{ConfigError, EngineError};
use crate::harmonic::harmonic_score;
use crate::onset::{FluxHistory, Onset, OnsetDetector};
use crate::pitch::{detect_pitch_yin, PitchEstimate, YinParams};
use crate::source::{AudioFrame, FrameSource, SessionInfo};
use crate::{NoteEvent, TickOutput};

/// Snapshot of every intermediate value of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickDiagnostics {
    pub envelope: f32,
    /// `None` while a cooldown bypasses detection.
    pub onset: Option<Onset>,
    pub pitch: Option<PitchEstimate>,
    pub harmonic_score: f32,
    pub phase: DetectorPhase,
    pub peak: Option<f32>,
    pub candidate: Option<NoteCandidate>,
    pub cooldown_remaining: u32,
}

/// All long-lived detector state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    envelope: EnvelopeTracker,
    onset: OnsetDetector,
    note: NoteState,
    cooldown: u32,
}

impl EngineState {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            envelope: EnvelopeTracker::new(),
            onset: OnsetDetector::new(config.flux_history_size),
            note: NoteState::default(),
            cooldown: 0,
        }
    }

    pub fn phase(&self) -> DetectorPhase {
        self.note.phase()
    }

    pub fn note(&self) -> &NoteState {
        &self.note
    }

    pub fn candidate(&self) -> Option<&NoteCandidate> {
        self.note.candidate()
    }

    pub fn envelope(&self) -> f32 {
        self.envelope.value()
    }

    pub fn flux_history(&self) -> &FluxHistory {
        self.onset.history()
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown
    }

    /// Blanks detection for `frames` ticks and drops any sounding note.
    pub fn trigger_cooldown(&mut self, frames: u32) {
        self.cooldown = frames;
        self.note = NoteState::default();
    }

    /// Back to the state of a freshly constructed engine.
    pub fn reset(&mut self) {
        self.envelope.reset();
        self.onset.reset();
        self.note = NoteState::default();
        self.cooldown = 0;
    }

    /// Runs the whole pipeline on one frame.
    ///
    /// While a cooldown is pending the envelope and volume level are still
    /// updated, but onset detection, pitch and the note lifecycle are skipped.
    pub fn advance(&mut self, frame: &AudioFrame, now: Instant, config: &DetectorConfig) -> TickOutput {
        let envelope = self.envelope.update(&frame.samples, config.envelope_smoothing);
        let volume_level = (envelope * config.volume_gain).clamp(0.0, 100.0);

        if self.cooldown > 0 {
            self.cooldown -= 1;
            let diagnostics = self.diagnostics(config, envelope, None, None, 0.0);
            return TickOutput {
                volume_level,
                note: None,
                diagnostics,
            };
        }

        let onset = self.onset.process(&frame.magnitudes, config.onset_threshold);
        let params = YinParams {
            threshold: config.yin_threshold,
            min_frequency: config.min_frequency,
            max_frequency: config.max_frequency,
        };
        let pitch = detect_pitch_yin(&frame.samples, frame.sample_rate, &params);
        let harmonic = pitch
            .map(|p| harmonic_score(&frame.magnitudes, p.frequency, frame.sample_rate))
            .unwrap_or(0.0);

        let signals = FrameSignals {
            envelope,
            is_onset: onset.is_onset,
            pitch,
            harmonic,
        };
        let note = std::mem::take(&mut self.note);
        self.note = note.step(&signals, now, config);

        let event = self
            .note
            .candidate()
            .map(|candidate| NoteEvent::from_candidate(candidate, self.note.phase()));
        let diagnostics = self.diagnostics(config, envelope, Some(onset), pitch, harmonic);

        TickOutput {
            volume_level,
            note: event,
            diagnostics,
        }
    }

    fn diagnostics(
        &self,
        config: &DetectorConfig,
        envelope: f32,
        onset: Option<Onset>,
        pitch: Option<PitchEstimate>,
        harmonic: f32,
    ) -> Option<TickDiagnostics> {
        let tracing = log_enabled!(Level::Trace);
        if !config.emit_diagnostics && !tracing {
            return None;
        }
        let snapshot = TickDiagnostics {
            envelope,
            onset,
            pitch,
            harmonic_score: harmonic,
            phase: self.note.phase(),
            peak: self.note.peak(),
            candidate: self.note.candidate().cloned(),
            cooldown_remaining: self.cooldown,
        };
        if tracing {
            trace!("[ENGINE] {:?}", snapshot);
        }
        config.emit_diagnostics.then_some(snapshot)
    }
}

/// Advances `state` by one frame and returns it with the tick's output.
pub fn update(
    mut state: EngineState,
    frame: &AudioFrame,
    now: Instant,
    config: &DetectorConfig,
) -> (EngineState, TickOutput) {
    let output = state.advance(frame, now, config);
    (state, output)
}

/// A note detector bound to at most one running frame source.
pub struct NoteEngine {
    config: DetectorConfig,
    state: EngineState,
    source: Option<Box<dyn FrameSource>>,
    session: Option<SessionInfo>,
}

impl NoteEngine {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = EngineState::new(&config);
        Ok(Self {
            config,
            state,
            source: None,
            session: None,
        })
    }

    /// Opens `source` and begins a session from a clean slate.
    ///
    /// On failure the engine stays stopped, exactly as after `stop()`.
    pub fn start(&mut self, mut source: Box<dyn FrameSource>) -> Result<SessionInfo, EngineError> {
        if self.source.is_some() {
            return Err(EngineError::AlreadyRunning);
        }
        self.state.reset();

        let session = match source.open() {
            Ok(session) => session,
            Err(e) => {
                warn!("[ENGINE] Frame source failed to open: {:#}", e);
                return Err(EngineError::Source(e));
            }
        };
        if let Err(e) = self.config.validate_session(session.sample_rate, session.buffer_size) {
            warn!("[ENGINE] Rejecting session {:?}: {}", session, e);
            source.close();
            return Err(e.into());
        }

        info!(
            "[ENGINE] Session started at {} Hz with {}-sample windows",
            session.sample_rate, session.buffer_size
        );
        self.source = Some(source);
        self.session = Some(session);
        Ok(session)
    }

    /// Closes the source and wipes all detector history. Safe to repeat.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
            info!("[ENGINE] Session stopped");
        }
        self.session = None;
        self.state.reset();
    }

    /// Suppresses note events for the configured number of ticks, typically
    /// right after the caller accepted a note, so its decaying tail is not
    /// detected again.
    pub fn trigger_cooldown(&mut self) {
        debug!("[ENGINE] Cooldown for {} ticks", self.config.cooldown_frames);
        self.state.trigger_cooldown(self.config.cooldown_frames);
    }

    /// Pulls one frame from the running source and processes it.
    ///
    /// Returns `None` when stopped or when the source has nothing yet.
    pub fn tick(&mut self) -> Option<TickOutput> {
        let frame = self.source.as_mut()?.next_frame()?;
        Some(self.process_frame(&frame))
    }

    pub fn process_frame(&mut self, frame: &AudioFrame) -> TickOutput {
        self.process_frame_at(frame, Instant::now())
    }

    /// Processes `frame` as if it arrived at `now`.
    pub fn process_frame_at(&mut self, frame: &AudioFrame, now: Instant) -> TickOutput {
        self.state.advance(frame, now, &self.config)
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.session
    }

    pub fn phase(&self) -> DetectorPhase {
        self.state.phase()
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.state.cooldown_remaining()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

impl Drop for NoteEngine {
    fn drop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
    }
}
