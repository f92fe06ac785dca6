use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("pipeline is not running; call start() first")]
    NotRunning,
    #[error("acquisition fault: {0}")]
    Acquisition(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("engine channel closed")]
    ChannelClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}

/// Why a block produced no readings. None of these end the session; the
/// previous history and smoothing state stay as they were.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SkipReason {
    #[error("no quiet gap found in block")]
    GapNotFound,
    #[error("only {found} of {expected} probe segments in block")]
    TooFewSegments { found: usize, expected: usize },
    #[error("reference RMS of probe {probe} is zero")]
    ZeroReference { probe: usize },
    #[error("reading of probe {probe} is not finite")]
    NonFiniteReading { probe: usize },
    #[error("block has {actual} samples, expected {expected}")]
    BlockLength { expected: usize, actual: usize },
    #[error("channel length mismatch: primary {primary}, reference {reference}")]
    ChannelLength { primary: usize, reference: usize },
}
