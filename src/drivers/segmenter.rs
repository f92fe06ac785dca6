//! Splits one raw block into per-probe segments around the gap anchor.
//!
//! Layout of a block, left to right:
//!
//! ```text
//! | backward tail | backward segments ... | control gap | forward segments ... | forward tail |
//! 0           bwd_low               gap.start        anchor               fwd_end            N
//! ```
//!
//! The two tails belong to the same probe, the one whose segment straddles
//! the boundary between consecutive blocks. The forward tail is the start of
//! that segment and the backward tail its end, so `cutoff_left` is skipped at
//! the start of the forward tail and `cutoff_right` at the end of the
//! backward tail.

use std::ops::Range;

use crate::config::FrameConfig;
use crate::drivers::rms::{merge_split, ChannelRms, TailAccumulator};
use crate::drivers::RawBlock;

/// One full-length probe segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    /// Samples used for the RMS, edges trimmed.
    pub interior: Range<usize>,
}

impl Segment {
    fn new(start: usize, frame: &FrameConfig) -> Self {
        let end = start + frame.segment_length;
        // cutoffs wider than the segment leave an empty interior
        let interior_start = (start + frame.cutoff_left).min(end);
        let interior_end = end.saturating_sub(frame.cutoff_right).max(interior_start);
        Self {
            start,
            end,
            interior: interior_start..interior_end,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Leftover samples on one side of the block and the chunks that feed its
/// partial RMS.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitTail {
    pub span: Range<usize>,
    pub chunks: Vec<Range<usize>>,
}

impl SplitTail {
    fn accumulate(&self, block: &RawBlock) -> TailAccumulator {
        let mut acc = TailAccumulator::default();
        for chunk in &self.chunks {
            acc.add_chunk(block, chunk.clone());
        }
        acc
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub block_len: usize,
    pub anchor: usize,
    /// Capture order.
    pub forward: Vec<Segment>,
    pub forward_tail: SplitTail,
    pub gap: Range<usize>,
    /// Emission order, i.e. walking away from the gap (descending indices).
    pub backward: Vec<Segment>,
    pub backward_tail: SplitTail,
}

impl FrameLayout {
    /// Pure index arithmetic; every range it produces lies inside
    /// `[0, block_len)`.
    pub fn plan(block_len: usize, anchor: usize, frame: &FrameConfig) -> Self {
        let len = frame.segment_length;
        let chunk = frame.split_chunk.max(1);
        let anchor = anchor.min(block_len);

        let mut forward = Vec::new();
        let mut start = anchor;
        while len > 0 && start + len <= block_len {
            forward.push(Segment::new(start, frame));
            start += len;
        }
        let fwd_end = start;

        let mut fwd_chunks = Vec::new();
        let mut cursor = fwd_end + frame.cutoff_left;
        while cursor + chunk <= block_len {
            fwd_chunks.push(cursor..cursor + chunk);
            cursor += chunk;
        }

        let gap_start = anchor.saturating_sub(frame.samples_control);

        let mut backward = Vec::new();
        let mut end = gap_start;
        // strictly greater: a segment never starts at index 0, that probe is
        // left to the split tail
        while len > 0 && end > len {
            backward.push(Segment::new(end - len, frame));
            end -= len;
        }
        let bwd_low = end;

        let mut bwd_chunks = Vec::new();
        if let Some(mut cursor) = bwd_low.checked_sub(frame.cutoff_right) {
            while cursor >= chunk {
                bwd_chunks.push(cursor - chunk..cursor);
                cursor -= chunk;
            }
        }

        Self {
            block_len,
            anchor,
            forward,
            forward_tail: SplitTail {
                span: fwd_end..block_len,
                chunks: fwd_chunks,
            },
            gap: gap_start..anchor,
            backward,
            backward_tail: SplitTail {
                span: 0..bwd_low,
                chunks: bwd_chunks,
            },
        }
    }

    /// Every span of the layout in ascending order, empty ones dropped.
    pub fn spans(&self) -> Vec<Range<usize>> {
        let mut spans = vec![self.backward_tail.span.clone()];
        spans.extend(self.backward.iter().rev().map(Segment::span));
        spans.push(self.gap.clone());
        spans.extend(self.forward.iter().map(Segment::span));
        spans.push(self.forward_tail.span.clone());
        spans.retain(|span| !span.is_empty());
        spans
    }

    /// RMS pairs in probe order: forward segments, the merged split segment,
    /// then backward segments in capture order. At most `probe_count`.
    pub fn probe_rms(&self, block: &RawBlock, probe_count: usize) -> Vec<ChannelRms> {
        let mut probes: Vec<ChannelRms> = self
            .forward
            .iter()
            .map(|segment| ChannelRms::over(block, segment.interior.clone()))
            .collect();

        let forward_tail = self.forward_tail.accumulate(block);
        let backward_tail = self.backward_tail.accumulate(block);
        if forward_tail.chunks() == 0 && backward_tail.chunks() == 0 {
            log::debug!("split segment has no usable samples on either side");
        }
        probes.push(merge_split(&forward_tail, &backward_tail));

        probes.extend(
            self.backward
                .iter()
                .rev()
                .map(|segment| ChannelRms::over(block, segment.interior.clone())),
        );
        probes.truncate(probe_count);
        probes
    }
}
