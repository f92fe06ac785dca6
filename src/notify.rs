use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;

use crate::drivers::ScopeError;

/// Tells the probe hardware which probe the next reading belongs to.
pub trait ProbeNotifier {
    /// `probe` is 1-based.
    fn notify(&mut self, probe: usize) -> Result<(), ScopeError>;
}

/// Writes the probe number as ASCII digits, no terminator.
pub struct AsciiNotifier<W: Write> {
    port: W,
}

impl<W: Write> AsciiNotifier<W> {
    pub fn new(port: W) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> W {
        self.port
    }
}

impl<W: Write> ProbeNotifier for AsciiNotifier<W> {
    fn notify(&mut self, probe: usize) -> Result<(), ScopeError> {
        write!(self.port, "{probe}")?;
        self.port.flush()?;
        Ok(())
    }
}

pub fn open_serial(path: &str, baud_rate: u32) -> Result<AsciiNotifier<Box<dyn SerialPort>>, ScopeError> {
    let port = serialport::new(path, baud_rate)
        .timeout(Duration::from_millis(100))
        .open()?;
    log::info!("probe notifier on {path} @ {baud_rate} baud");
    Ok(AsciiNotifier::new(port))
}

/// Round-robin over `1..=probe_count`, one step per published block.
#[derive(Clone, Debug)]
pub struct ProbeCycle {
    probe_count: usize,
    current: usize,
}

impl ProbeCycle {
    pub fn new(probe_count: usize) -> Self {
        Self {
            probe_count: probe_count.max(1),
            current: 0,
        }
    }

    /// Probe number that was last returned by `advance`, if any.
    pub fn current(&self) -> Option<usize> {
        (self.current > 0).then_some(self.current)
    }

    pub fn advance(&mut self) -> usize {
        self.current = self.current % self.probe_count + 1;
        self.current
    }
}
