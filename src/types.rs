// src/types.rs
use serde::{Deserialize, Serialize};

use crate::drivers::{PipelineState, ProbeFrame, SkipReason};

/// Which scalar a probe reading carries.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum MeasurementMode {
    /// Raw primary-channel RMS.
    Voltage,
    /// Primary RMS divided by reference RMS.
    Impedance,
}

impl MeasurementMode {
    pub fn label(self) -> &'static str {
        match self {
            MeasurementMode::Voltage => "Voltage",
            MeasurementMode::Impedance => "Impedance",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MeasurementMode::Voltage => MeasurementMode::Impedance,
            MeasurementMode::Impedance => MeasurementMode::Voltage,
        }
    }
}

// Caller -> engine
#[derive(Clone, Debug)]
pub enum EngineCommand {
    Start,
    Stop,
    SetMode(MeasurementMode),
    /// Hardware/driver fault reported by the acquisition layer.
    Fault(String),
    Shutdown,
}

// Engine -> caller
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Log(String),
    Status(PipelineState),
    Frame(ProbeFrame),
    Skipped(SkipReason),
    Fault(String),
    /// Total blocks dropped by the single-slot feed so far.
    Overrun(u64),
}
