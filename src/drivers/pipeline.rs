use crate::config::PipelineConfig;
use crate::drivers::buffer::{ProbeHistory, ProbeTrace};
use crate::drivers::error::{ScopeError, SkipReason};
use crate::drivers::locator::{locate_anchor, GapLocation};
use crate::drivers::segmenter::FrameLayout;
use crate::drivers::smoothing::SmoothingMatrix;
use crate::drivers::source::{BlockSource, RawBlock};
use crate::types::MeasurementMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
}

/// Everything published for one processed block. Owned copies, safe to send
/// to another thread.
#[derive(Clone, Debug)]
pub struct ProbeFrame {
    /// Number of blocks received by the session before this one.
    pub sequence: u64,
    pub anchor: usize,
    pub mode: MeasurementMode,
    /// Per-probe readings before smoothing.
    pub raw: Vec<f64>,
    /// Per-probe moving averages, the values appended to the histories.
    pub filtered: Vec<f64>,
    pub traces: Vec<ProbeTrace>,
}

impl ProbeFrame {
    pub fn mode_label(&self) -> &'static str {
        self.mode.label()
    }
}

#[derive(Clone, Debug)]
pub enum BlockOutcome {
    Published(ProbeFrame),
    Skipped(SkipReason),
}

/// Per-session state, created by `start()` and dropped by `stop()`.
struct Session {
    smoothing: SmoothingMatrix,
    history: ProbeHistory,
    received: u64,
    skipped: u64,
}

impl Session {
    fn new(config: &PipelineConfig) -> Self {
        Self {
            smoothing: SmoothingMatrix::new(config.smoothing_depth, config.probe_count),
            history: ProbeHistory::new(config.probe_count, config.history_capacity),
            received: 0,
            skipped: 0,
        }
    }
}

/// Runs gap location, segmentation, RMS extraction, smoothing and history
/// once per raw block.
pub struct FramePipeline {
    config: PipelineConfig,
    mode: MeasurementMode,
    session: Option<Session>,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let mode = config.mode;
        Self {
            config,
            mode,
            session: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        if self.session.is_some() {
            PipelineState::Running
        } else {
            PipelineState::Idle
        }
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    /// Applies from the next block on.
    pub fn set_mode(&mut self, mode: MeasurementMode) {
        if mode != self.mode {
            log::info!("measurement mode -> {}", mode.label());
        }
        self.mode = mode;
    }

    /// Validates the configuration and opens a fresh session. Calling it on
    /// a running pipeline resets histories and smoothing.
    pub fn start(&mut self) -> Result<(), ScopeError> {
        self.config.validate()?;
        self.session = Some(Session::new(&self.config));
        log::info!(
            "session started: {} probes, {} samples per block, {} mode",
            self.config.probe_count,
            self.config.acquisition.block_length,
            self.mode.label()
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!(
                "session stopped after {} blocks ({} skipped)",
                session.received,
                session.skipped
            );
        }
    }

    /// Acquisition-layer fault: drops the session and hands the fault back
    /// unchanged.
    pub fn fault(&mut self, error: ScopeError) -> ScopeError {
        log::error!("{error}");
        self.stop();
        error
    }

    pub fn on_block(&mut self, block: &RawBlock) -> Result<BlockOutcome, ScopeError> {
        let session = self.session.as_mut().ok_or(ScopeError::NotRunning)?;
        let sequence = session.received;
        session.received += 1;

        let (location, raw) = match measure_block(&self.config, self.mode, block) {
            Ok(measured) => measured,
            Err(reason) => {
                session.skipped += 1;
                log::warn!("block {sequence} skipped: {reason}");
                return Ok(BlockOutcome::Skipped(reason));
            }
        };

        session.smoothing.push(&raw);
        let filtered = session.smoothing.filtered();
        session.history.push_all(&filtered);
        log::debug!(
            "block {sequence}: anchor {}{} readings {raw:?}",
            location.anchor,
            if location.rescanned { " (rescanned)" } else { "" }
        );

        Ok(BlockOutcome::Published(ProbeFrame {
            sequence,
            anchor: location.anchor,
            mode: self.mode,
            raw,
            filtered,
            traces: session.history.snapshot(),
        }))
    }

    /// Pulls one block from `source` and processes it. A source error is a
    /// driver fault and leaves the pipeline idle.
    pub fn pump_once<S: BlockSource>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<BlockOutcome>, ScopeError> {
        if self.session.is_none() {
            return Err(ScopeError::NotRunning);
        }
        let block = match source.next_block() {
            Ok(Some(block)) => block,
            Ok(None) => return Ok(None),
            Err(error) => return Err(self.fault(error)),
        };
        self.on_block(&block).map(Some)
    }

    pub fn latest_traces(&self) -> Result<Vec<ProbeTrace>, ScopeError> {
        let session = self.session.as_ref().ok_or(ScopeError::NotRunning)?;
        Ok(session.history.snapshot())
    }
}

/// Gap location, segmentation and per-probe readings for one block, without
/// touching any session state.
pub fn measure_block(
    config: &PipelineConfig,
    mode: MeasurementMode,
    block: &RawBlock,
) -> Result<(GapLocation, Vec<f64>), SkipReason> {
    block.validate(config.acquisition.block_length)?;
    let location = locate_anchor(&block.primary, &config.frame).ok_or(SkipReason::GapNotFound)?;
    let layout = FrameLayout::plan(block.len(), location.anchor, &config.frame);
    let pairs = layout.probe_rms(block, config.probe_count);
    if pairs.len() < config.probe_count {
        return Err(SkipReason::TooFewSegments {
            found: pairs.len(),
            expected: config.probe_count,
        });
    }
    let readings = pairs
        .iter()
        .enumerate()
        .map(|(probe, pair)| pair.reading(mode, probe))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((location, readings))
}
