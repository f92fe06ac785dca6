use std::collections::VecDeque;
use std::time::SystemTime;

use crate::drivers::{ScopeError, SkipReason};

/// One acquisition callback worth of samples from both analog inputs.
#[derive(Clone, Debug)]
pub struct RawBlock {
    pub captured_at: SystemTime,
    /// Multiplexed probe voltage.
    pub primary: Vec<f64>,
    /// Reference channel sampled alongside.
    pub reference: Vec<f64>,
}

impl RawBlock {
    pub fn new(primary: Vec<f64>, reference: Vec<f64>) -> Self {
        Self {
            captured_at: SystemTime::now(),
            primary,
            reference,
        }
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Shape check against the configured block length.
    pub fn validate(&self, expected_len: usize) -> Result<(), SkipReason> {
        if self.primary.len() != self.reference.len() {
            return Err(SkipReason::ChannelLength {
                primary: self.primary.len(),
                reference: self.reference.len(),
            });
        }
        if self.primary.len() != expected_len {
            return Err(SkipReason::BlockLength {
                expected: expected_len,
                actual: self.primary.len(),
            });
        }
        Ok(())
    }
}

/// Anything that can hand out raw blocks one at a time. An `Err` is a
/// driver fault and ends the session; `Ok(None)` means nothing is ready.
pub trait BlockSource {
    fn next_block(&mut self) -> Result<Option<RawBlock>, ScopeError>;
}

/// In-memory source useful for tests and deterministic playback.
pub struct ManualSource {
    queue: VecDeque<Result<RawBlock, ScopeError>>,
}

impl ManualSource {
    pub fn new(blocks: impl IntoIterator<Item = RawBlock>) -> Self {
        Self {
            queue: blocks.into_iter().map(Ok).collect(),
        }
    }

    /// Queue a driver fault to be returned after the blocks already queued.
    pub fn push_fault(&mut self, message: impl Into<String>) {
        self.queue
            .push_back(Err(ScopeError::Acquisition(message.into())));
    }
}

impl BlockSource for ManualSource {
    fn next_block(&mut self) -> Result<Option<RawBlock>, ScopeError> {
        self.queue.pop_front().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_reports_shape_problems() {
        let block = RawBlock::new(vec![0.0; 10], vec![0.0; 9]);
        assert_eq!(
            block.validate(10),
            Err(SkipReason::ChannelLength {
                primary: 10,
                reference: 9
            })
        );
        let block = RawBlock::new(vec![0.0; 10], vec![0.0; 10]);
        assert_eq!(
            block.validate(12),
            Err(SkipReason::BlockLength {
                expected: 12,
                actual: 10
            })
        );
        assert!(block.validate(10).is_ok());
    }

    #[test]
    fn manual_source_replays_then_faults() {
        let mut source = ManualSource::new(vec![RawBlock::new(vec![1.0], vec![1.0])]);
        source.push_fault("device removed");
        assert!(source.next_block().unwrap().is_some());
        assert!(matches!(
            source.next_block(),
            Err(ScopeError::Acquisition(_))
        ));
        assert!(source.next_block().unwrap().is_none());
    }
}
