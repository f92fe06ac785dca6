use std::ops::Range;

use crate::drivers::{RawBlock, SkipReason};
use crate::types::MeasurementMode;

/// `sqrt(mean(x^2))`; zero for an empty slice.
pub fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (sum_of_squares(samples) / samples.len() as f64).sqrt()
}

fn sum_of_squares(samples: &[f64]) -> f64 {
    samples.iter().map(|v| v * v).sum()
}

/// RMS of both channels over the same sample range.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelRms {
    pub primary: f64,
    pub reference: f64,
}

impl ChannelRms {
    /// Out-of-range indices contribute nothing rather than panicking.
    pub fn over(block: &RawBlock, range: Range<usize>) -> Self {
        let primary = block.primary.get(range.clone()).unwrap_or(&[]);
        let reference = block.reference.get(range).unwrap_or(&[]);
        Self {
            primary: rms(primary),
            reference: rms(reference),
        }
    }

    /// Per-probe scalar for probe index `probe`. Fails on a zero reference
    /// in impedance mode and on any non-finite result in either mode.
    pub fn reading(self, mode: MeasurementMode, probe: usize) -> Result<f64, SkipReason> {
        let value = match mode {
            MeasurementMode::Voltage => self.primary,
            MeasurementMode::Impedance => {
                if self.reference == 0.0 {
                    return Err(SkipReason::ZeroReference { probe });
                }
                if !self.reference.is_finite() {
                    return Err(SkipReason::NonFiniteReading { probe });
                }
                self.primary / self.reference
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(SkipReason::NonFiniteReading { probe })
        }
    }

    fn mean(a: Self, b: Self) -> Self {
        Self {
            primary: (a.primary + b.primary) / 2.0,
            reference: (a.reference + b.reference) / 2.0,
        }
    }
}

/// Running sums for one side of the split segment, fed in fixed-size chunks.
#[derive(Clone, Debug, Default)]
pub struct TailAccumulator {
    sum_primary: f64,
    sum_reference: f64,
    samples: usize,
    chunks: usize,
}

impl TailAccumulator {
    pub fn add_chunk(&mut self, block: &RawBlock, range: Range<usize>) {
        let (Some(primary), Some(reference)) = (
            block.primary.get(range.clone()),
            block.reference.get(range),
        ) else {
            return;
        };
        self.sum_primary += sum_of_squares(primary);
        self.sum_reference += sum_of_squares(reference);
        self.samples += primary.len();
        self.chunks += 1;
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn estimate(&self) -> ChannelRms {
        if self.samples == 0 {
            return ChannelRms::default();
        }
        let n = self.samples as f64;
        ChannelRms {
            primary: (self.sum_primary / n).sqrt(),
            reference: (self.sum_reference / n).sqrt(),
        }
    }
}

/// Combines the right-of-gap and left-of-gap tail estimates of the probe
/// that straddles the block boundary. A side without chunks is ignored.
pub fn merge_split(forward: &TailAccumulator, backward: &TailAccumulator) -> ChannelRms {
    match (forward.chunks(), backward.chunks()) {
        (0, _) => backward.estimate(),
        (_, 0) => forward.estimate(),
        _ => ChannelRms::mean(forward.estimate(), backward.estimate()),
    }
}
