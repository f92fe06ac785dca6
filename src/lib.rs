//! Frame synchronization and per-probe RMS extraction for a multiplexed
//! probe array sampled as fixed-length two-channel blocks.

pub mod config;
pub mod drivers;
pub mod engine;
pub mod notify;
pub mod recorder;
pub mod types;
