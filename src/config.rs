use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::drivers::ScopeError;
use crate::types::MeasurementMode;

/// Segmentation and gap detection constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Samples attributed to one probe per sweep.
    pub segment_length: usize,
    /// Samples skipped at the start of a segment (switching transient).
    pub cutoff_left: usize,
    /// Samples skipped at the end of a segment.
    pub cutoff_right: usize,
    /// Length of the multiplexer's quiet window between sweeps.
    pub samples_control: usize,
    pub gap_threshold: f64,
    pub threshold_window: usize,
    /// Chunk size used when accumulating the split tails.
    pub split_chunk: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            segment_length: 400,
            cutoff_left: 150,
            cutoff_right: 50,
            samples_control: 200,
            gap_threshold: 0.05,
            threshold_window: 10,
            split_chunk: 50,
        }
    }
}

impl FrameConfig {
    pub fn usable_length(&self) -> usize {
        self.segment_length
            .saturating_sub(self.cutoff_left + self.cutoff_right)
    }
}

/// What the acquisition layer is configured with. The core only consumes
/// `block_length`; the rest is carried for the driver and the simulator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub sample_rate_hz: f64,
    pub block_length: usize,
    pub min_voltage: f64,
    pub max_voltage: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100_000.0,
            block_length: 3000,
            min_voltage: -10.0,
            max_voltage: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame: FrameConfig,
    pub acquisition: AcquisitionSettings,
    pub history_capacity: usize,
    pub smoothing_depth: usize,
    pub probe_count: usize,
    pub mode: MeasurementMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            acquisition: AcquisitionSettings::default(),
            history_capacity: 200,
            smoothing_depth: 7,
            probe_count: 7,
            mode: MeasurementMode::Impedance,
        }
    }
}

impl PipelineConfig {
    /// Checks the relationships between the constants. Called by
    /// `FramePipeline::start`, so a bad config never reaches a session.
    pub fn validate(&self) -> Result<(), ScopeError> {
        let frame = &self.frame;
        let acq = &self.acquisition;
        for (name, value) in [
            ("segment_length", frame.segment_length),
            ("threshold_window", frame.threshold_window),
            ("split_chunk", frame.split_chunk),
            ("history_capacity", self.history_capacity),
            ("smoothing_depth", self.smoothing_depth),
            ("probe_count", self.probe_count),
        ] {
            if value == 0 {
                return Err(ScopeError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if frame.segment_length <= frame.cutoff_left + frame.cutoff_right {
            return Err(ScopeError::InvalidConfig(format!(
                "segment_length ({}) must exceed cutoff_left + cutoff_right ({})",
                frame.segment_length,
                frame.cutoff_left + frame.cutoff_right
            )));
        }
        if !(frame.gap_threshold.is_finite() && frame.gap_threshold > 0.0) {
            return Err(ScopeError::InvalidConfig(format!(
                "gap_threshold must be a positive number, got {}",
                frame.gap_threshold
            )));
        }
        if frame.samples_control < frame.threshold_window {
            return Err(ScopeError::InvalidConfig(format!(
                "samples_control ({}) must hold at least one threshold window ({})",
                frame.samples_control, frame.threshold_window
            )));
        }
        let required = frame.segment_length + frame.samples_control;
        if acq.block_length < required {
            return Err(ScopeError::InvalidConfig(format!(
                "block_length ({}) must hold one segment plus the control gap ({required})",
                acq.block_length
            )));
        }
        if !(acq.sample_rate_hz.is_finite() && acq.sample_rate_hz > 0.0) {
            return Err(ScopeError::InvalidSampleRate);
        }
        if acq.min_voltage >= acq.max_voltage {
            return Err(ScopeError::InvalidConfig(format!(
                "voltage range is empty: [{}, {}]",
                acq.min_voltage, acq.max_voltage
            )));
        }
        Ok(())
    }
}

/// Where the per-block results go besides the message channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Overwritten every block with the comma-joined raw readings.
    pub values_path: Option<PathBuf>,
    /// Shared file receiving the latest reading of the notified probe.
    pub latest_path: Option<PathBuf>,
    /// Appended CSV log of raw readings.
    pub record_path: Option<PathBuf>,
    /// PNG written with the probe histories when the run ends.
    pub history_png: Option<PathBuf>,
    pub serial_port: Option<String>,
    pub baud_rate: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            values_path: None,
            latest_path: None,
            record_path: None,
            history_png: None,
            serial_port: None,
            baud_rate: 9600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub export: ExportConfig,
    /// Blocks the simulated acquisition produces before the binary exits.
    pub demo_blocks: usize,
    pub seed: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            export: ExportConfig::default(),
            demo_blocks: 400,
            seed: 7,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ScopeError> {
        let text = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
        assert_eq!(FrameConfig::default().usable_length(), 200);
    }

    #[test]
    fn rejects_segment_shorter_than_cutoffs() {
        let mut config = PipelineConfig::default();
        config.frame.segment_length = 200;
        assert!(matches!(
            config.validate(),
            Err(ScopeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_block_without_room_for_segment_and_gap() {
        let mut config = PipelineConfig::default();
        config.acquisition.block_length = 599;
        assert!(config.validate().is_err());
        config.acquisition.block_length = 600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_sizes_and_bad_threshold() {
        let mut config = PipelineConfig::default();
        config.frame.split_chunk = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.frame.gap_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.acquisition.sample_rate_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ScopeError::InvalidSampleRate)
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{ "pipeline": { "frame": { "segment_length": 500 }, "mode": "Voltage" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.pipeline.frame.segment_length, 500);
        assert_eq!(config.pipeline.frame.cutoff_left, 150);
        assert_eq!(config.pipeline.mode, MeasurementMode::Voltage);
        assert_eq!(config.pipeline.probe_count, 7);
    }
}
