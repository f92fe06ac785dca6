//! Synthetic multiplexer for running the pipeline without hardware.
//!
//! Each sweep is `probe_count` segments of a sine carrier, one amplitude per
//! probe, followed by a quiet gap. The sweep position carries over between
//! blocks, so consecutive blocks are phase-continuous like a real DAQ stream.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PipelineConfig;
use crate::drivers::{BlockSource, RawBlock, ScopeError};

#[derive(Clone, Debug)]
pub struct MuxProfile {
    /// Primary carrier amplitude per probe (volts).
    pub amplitudes: Vec<f64>,
    /// Reference carrier amplitude per probe (volts).
    pub reference_levels: Vec<f64>,
    pub carrier_hz: f64,
    /// Uniform noise half-width added to both channels.
    pub noise: f64,
    /// Quiet samples between sweeps.
    pub gap_samples: usize,
}

impl MuxProfile {
    /// Amplitudes 0.8, 1.0, 1.2, ... against a flat 0.5 V reference.
    pub fn ramp(config: &PipelineConfig) -> Self {
        let probes = config.probe_count;
        Self {
            amplitudes: (0..probes).map(|p| 0.8 + 0.2 * p as f64).collect(),
            reference_levels: vec![0.5; probes],
            carrier_hz: 1000.0,
            noise: 0.01,
            gap_samples: config.frame.samples_control,
        }
    }
}

pub struct SimulatedMux {
    rng: StdRng,
    profile: MuxProfile,
    segment_length: usize,
    block_length: usize,
    sample_rate_hz: f64,
    /// Absolute sample counter.
    clock: u64,
    /// Sweep position of the next sample.
    position: usize,
    blocks_left: Option<usize>,
    fault_after: Option<usize>,
    produced: usize,
}

impl SimulatedMux {
    /// The first block starts at a seed-dependent point of the sweep.
    pub fn new(config: &PipelineConfig, profile: MuxProfile, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sweep = profile.amplitudes.len() * config.frame.segment_length + profile.gap_samples;
        let position = rng.gen_range(0..sweep.max(1));
        Self {
            rng,
            profile,
            segment_length: config.frame.segment_length,
            block_length: config.acquisition.block_length,
            sample_rate_hz: config.acquisition.sample_rate_hz,
            clock: 0,
            position,
            blocks_left: None,
            fault_after: None,
            produced: 0,
        }
    }

    /// Ends the stream (`Ok(None)`) after `blocks` blocks.
    pub fn with_block_limit(mut self, blocks: usize) -> Self {
        self.blocks_left = Some(blocks);
        self
    }

    /// Reports a driver fault instead of the block after `blocks`.
    pub fn with_fault_after(mut self, blocks: usize) -> Self {
        self.fault_after = Some(blocks);
        self
    }

    pub fn profile(&self) -> &MuxProfile {
        &self.profile
    }

    fn sweep_length(&self) -> usize {
        self.profile.amplitudes.len() * self.segment_length + self.profile.gap_samples
    }

    fn noise(&mut self) -> f64 {
        let width = self.profile.noise.abs();
        self.rng.gen_range(-width..=width)
    }

    fn next_sample(&mut self) -> (f64, f64) {
        let t = self.clock as f64 / self.sample_rate_hz;
        let carrier = (2.0 * PI * self.profile.carrier_hz * t).sin();
        let probe = self.position / self.segment_length.max(1);
        let (primary, reference) = match (
            self.profile.amplitudes.get(probe),
            self.profile.reference_levels.get(probe),
        ) {
            (Some(&amplitude), Some(&level)) => (amplitude * carrier, level * carrier),
            _ => (0.0, 0.0), // gap
        };
        let sample = (primary + self.noise(), reference + self.noise());

        self.clock += 1;
        self.position += 1;
        if self.position >= self.sweep_length() {
            self.position = 0;
        }
        sample
    }
}

impl BlockSource for SimulatedMux {
    fn next_block(&mut self) -> Result<Option<RawBlock>, ScopeError> {
        if self.fault_after == Some(self.produced) {
            return Err(ScopeError::Acquisition("simulated device disconnect".into()));
        }
        if let Some(left) = self.blocks_left.as_mut() {
            if *left == 0 {
                return Ok(None);
            }
            *left -= 1;
        }
        let mut primary = Vec::with_capacity(self.block_length);
        let mut reference = Vec::with_capacity(self.block_length);
        for _ in 0..self.block_length {
            let (p, r) = self.next_sample();
            primary.push(p);
            reference.push(r);
        }
        self.produced += 1;
        Ok(Some(RawBlock::new(primary, reference)))
    }
}
