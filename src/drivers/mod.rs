// src/drivers/mod.rs
pub mod buffer;
pub mod error;
pub mod locator;
pub mod pipeline;
pub mod plot;
pub mod rms;
pub mod segmenter;
pub mod simulator;
pub mod smoothing;
pub mod source;

pub use buffer::{HistoryBuffer, ProbeHistory, ProbeTrace};
pub use error::{ScopeError, SkipReason};
pub use locator::{locate_anchor, locate_gap, GapLocation};
pub use pipeline::{measure_block, BlockOutcome, FramePipeline, PipelineState, ProbeFrame};
pub use plot::{render_history_png, PlotStyle};
pub use rms::{merge_split, rms, ChannelRms, TailAccumulator};
pub use segmenter::{FrameLayout, Segment, SplitTail};
pub use simulator::{MuxProfile, SimulatedMux};
pub use smoothing::SmoothingMatrix;
pub use source::{BlockSource, ManualSource, RawBlock};
