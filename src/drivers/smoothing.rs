use ndarray::{s, Array1, Array2, Axis};

/// Fixed-depth moving average over the most recent readings of every probe.
///
/// Rows are recency (row 0 is the oldest), columns are probes. Each update
/// drops the oldest row and appends the new reading vector as the newest,
/// which is the row-wise form of shifting every probe's column by one.
#[derive(Clone, Debug)]
pub struct SmoothingMatrix {
    rows: Array2<f64>,
}

impl SmoothingMatrix {
    /// Zero-filled, so the first `depth - 1` outputs are pulled toward zero.
    pub fn new(depth: usize, probes: usize) -> Self {
        Self {
            rows: Array2::zeros((depth.max(1), probes)),
        }
    }

    pub fn depth(&self) -> usize {
        self.rows.nrows()
    }

    pub fn probes(&self) -> usize {
        self.rows.ncols()
    }

    /// Shifts in one reading per probe. Missing probes read as zero and
    /// surplus readings are ignored.
    pub fn push(&mut self, readings: &[f64]) {
        let depth = self.depth();
        if depth > 1 {
            let newer = self.rows.slice(s![1.., ..]).to_owned();
            self.rows.slice_mut(s![..depth - 1, ..]).assign(&newer);
        }
        let mut newest = self.rows.row_mut(depth - 1);
        for (probe, slot) in newest.iter_mut().enumerate() {
            *slot = readings.get(probe).copied().unwrap_or(0.0);
        }
    }

    /// Column means: one filtered value per probe.
    pub fn filtered(&self) -> Vec<f64> {
        self.rows
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.probes()))
            .to_vec()
    }

    pub fn clear(&mut self) {
        self.rows.fill(0.0);
    }
}
