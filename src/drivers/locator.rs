//! Frame synchronisation: find the multiplexer's quiet gap in a raw block.
//!
//! The anchor is the index of the last sample of the rightmost run of
//! `threshold_window` consecutive samples whose magnitude stays below the
//! gap threshold. Segmentation walks forward and backward from it.

use crate::config::FrameConfig;

/// Where the gap was found in one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GapLocation {
    pub anchor: usize,
    /// The rightmost run sat too close to the right edge and a run near the
    /// left edge was used instead.
    pub rescanned: bool,
}

/// Returns `i + window - 1` for the largest `i` such that every sample in
/// `[i, i + window)` satisfies `|x| < threshold`.
///
/// Walks right to left once, counting consecutive quiet samples; the first
/// time the count reaches `window` the run starting at the current index is
/// the rightmost one.
pub fn locate_gap(primary: &[f64], threshold: f64, window: usize) -> Option<usize> {
    if window == 0 || window > primary.len() {
        return None;
    }
    let mut run = 0usize;
    for (i, sample) in primary.iter().enumerate().rev() {
        if sample.abs() < threshold {
            run += 1;
            if run == window {
                return Some(i + window - 1);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// [`locate_gap`] plus the right-edge correction: an anchor closer than
/// `samples_control` to the end of the block is replaced by a run starting
/// within the first `samples_control` samples, if there is one.
pub fn locate_anchor(primary: &[f64], frame: &FrameConfig) -> Option<GapLocation> {
    let anchor = locate_gap(primary, frame.gap_threshold, frame.threshold_window)?;
    let edge = primary.len().saturating_sub(frame.samples_control);
    if anchor > edge {
        // Candidate starts restricted to [0, samples_control).
        let limit = (frame.samples_control + frame.threshold_window)
            .saturating_sub(1)
            .min(primary.len());
        if let Some(left) =
            locate_gap(&primary[..limit], frame.gap_threshold, frame.threshold_window)
        {
            log::debug!("gap anchor {anchor} too close to block edge, using {left}");
            return Some(GapLocation {
                anchor: left,
                rescanned: true,
            });
        }
    }
    Some(GapLocation {
        anchor,
        rescanned: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_block(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect()
    }

    fn with_quiet_run(mut block: Vec<f64>, start: usize, len: usize) -> Vec<f64> {
        for sample in &mut block[start..start + len] {
            *sample = 0.0;
        }
        block
    }

    #[test]
    fn finds_single_run_anchor() {
        for start in [0usize, 17, 500, 990] {
            let block = with_quiet_run(noisy_block(1000), start, 10);
            assert_eq!(locate_gap(&block, 0.05, 10), Some(start + 9), "start {start}");
        }
    }

    #[test]
    fn no_run_means_not_found() {
        let block = noisy_block(1000);
        assert_eq!(locate_gap(&block, 0.05, 10), None);
        // nine quiet samples are one short
        let block = with_quiet_run(noisy_block(1000), 300, 9);
        assert_eq!(locate_gap(&block, 0.05, 10), None);
    }

    #[test]
    fn longer_run_reports_its_right_end() {
        let block = with_quiet_run(noisy_block(1000), 100, 30);
        assert_eq!(locate_gap(&block, 0.05, 10), Some(129));
    }

    #[test]
    fn rightmost_run_wins() {
        let block = with_quiet_run(noisy_block(1000), 100, 10);
        let block = with_quiet_run(block, 700, 10);
        assert_eq!(locate_gap(&block, 0.05, 10), Some(709));
    }

    #[test]
    fn threshold_is_strict_and_nan_is_loud() {
        let mut block = with_quiet_run(noisy_block(100), 40, 10);
        block[45] = 0.05;
        assert_eq!(locate_gap(&block, 0.05, 10), None);
        block[45] = f64::NAN;
        assert_eq!(locate_gap(&block, 0.05, 10), None);
    }

    #[test]
    fn degenerate_windows() {
        let block = vec![0.0; 5];
        assert_eq!(locate_gap(&block, 0.05, 0), None);
        assert_eq!(locate_gap(&block, 0.05, 6), None);
        assert_eq!(locate_gap(&block, 0.05, 5), Some(4));
        assert_eq!(locate_gap(&[], 0.05, 1), None);
    }

    #[test]
    fn anchor_near_right_edge_is_rescanned_from_left() {
        let frame = FrameConfig::default();
        let block = with_quiet_run(noisy_block(3000), 2900, 10);
        let block = with_quiet_run(block, 50, 10);
        assert_eq!(
            locate_anchor(&block, &frame),
            Some(GapLocation {
                anchor: 59,
                rescanned: true
            })
        );
    }

    #[test]
    fn edge_anchor_kept_when_left_has_no_run() {
        let frame = FrameConfig::default();
        let block = with_quiet_run(noisy_block(3000), 2900, 10);
        assert_eq!(
            locate_anchor(&block, &frame),
            Some(GapLocation {
                anchor: 2909,
                rescanned: false
            })
        );
        // a run starting beyond samples_control does not count as the left gap
        let block = with_quiet_run(block, 250, 10);
        assert_eq!(locate_anchor(&block, &frame).map(|g| g.anchor), Some(2909));
    }

    #[test]
    fn interior_anchor_is_not_rescanned() {
        let frame = FrameConfig::default();
        let block = with_quiet_run(noisy_block(3000), 2500, 10);
        let block = with_quiet_run(block, 50, 10);
        assert_eq!(
            locate_anchor(&block, &frame),
            Some(GapLocation {
                anchor: 2509,
                rescanned: false
            })
        );
    }
}
