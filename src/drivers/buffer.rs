use std::collections::VecDeque;

/// Ready-to-plot copy of one probe's history.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeTrace {
    pub probe: usize,
    pub points: Vec<(f64, f64)>, // (x, y)
}

impl ProbeTrace {
    pub fn latest(&self) -> Option<f64> {
        self.points.last().map(|&(_, y)| y)
    }
}

/// Bounded FIFO of recent filtered readings for one probe.
#[derive(Clone, Debug)]
pub struct HistoryBuffer {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }

    /// Points with synthetic x-coordinates `(i + 1) / len / 2`.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let len = self.values.len() as f64;
        self.values
            .iter()
            .enumerate()
            .map(|(i, &value)| ((i as f64 + 1.0) / len / 2.0, value))
            .collect()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// One history buffer per probe.
#[derive(Clone, Debug)]
pub struct ProbeHistory {
    per_probe: Vec<HistoryBuffer>, // probe -> values
}

impl ProbeHistory {
    pub fn new(probes: usize, capacity: usize) -> Self {
        Self {
            per_probe: (0..probes).map(|_| HistoryBuffer::new(capacity)).collect(),
        }
    }

    pub fn probes(&self) -> usize {
        self.per_probe.len()
    }

    pub fn probe(&self, index: usize) -> Option<&HistoryBuffer> {
        self.per_probe.get(index)
    }

    /// Appends `values[p]` to probe `p`'s buffer; extra values are ignored.
    pub fn push_all(&mut self, values: &[f64]) {
        for (buffer, &value) in self.per_probe.iter_mut().zip(values) {
            buffer.push(value);
        }
    }

    pub fn snapshot(&self) -> Vec<ProbeTrace> {
        self.per_probe
            .iter()
            .enumerate()
            .map(|(probe, buffer)| ProbeTrace {
                probe,
                points: buffer.points(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        for buffer in &mut self.per_probe {
            buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut buffer = HistoryBuffer::new(200);
        for i in 1..=201 {
            buffer.push(i as f64);
        }
        assert_eq!(buffer.len(), 200);
        assert_eq!(buffer.iter().next().copied(), Some(2.0));
        assert_eq!(buffer.iter().last().copied(), Some(201.0));
    }

    #[test]
    fn points_use_synthetic_x() {
        let mut buffer = HistoryBuffer::new(4);
        buffer.push(10.0);
        buffer.push(20.0);
        assert_eq!(buffer.points(), vec![(0.25, 10.0), (0.5, 20.0)]);
        assert!(HistoryBuffer::new(4).points().is_empty());
    }

    #[test]
    fn probe_history_routes_by_index() {
        let mut history = ProbeHistory::new(3, 2);
        history.push_all(&[1.0, 2.0, 3.0, 4.0]);
        history.push_all(&[5.0, 6.0]);
        let traces = history.snapshot();
        assert_eq!(traces.len(), 3);
        assert_eq!(traces[0].latest(), Some(5.0));
        assert_eq!(traces[1].latest(), Some(6.0));
        assert_eq!(traces[2].latest(), Some(3.0));
        assert_eq!(history.probe(2).map(HistoryBuffer::len), Some(1));
        history.clear();
        assert!(history.snapshot().iter().all(|t| t.points.is_empty()));
    }
}
