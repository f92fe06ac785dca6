// src/main.rs
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};

use hasel_scope::config::AppConfig;
use hasel_scope::drivers::{render_history_png, BlockSource, MuxProfile, PlotStyle, ProbeTrace, SimulatedMux};
use hasel_scope::engine::{block_feed, spawn_thread, Exporters};
use hasel_scope::types::{EngineCommand, EngineMessage};

/// Pacing of the simulated acquisition, roughly one block per DAQ callback.
const BLOCK_INTERVAL: Duration = Duration::from_millis(5);

fn load_config() -> Result<AppConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            AppConfig::load(&path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(AppConfig::default()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let config = load_config()?;
    config.pipeline.validate().context("invalid pipeline configuration")?;

    let probe_count = config.pipeline.probe_count;
    let exporters =
        Exporters::from_config(&config.export, probe_count).context("opening exporters")?;
    let mut mux = SimulatedMux::new(
        &config.pipeline,
        MuxProfile::ramp(&config.pipeline),
        config.seed,
    )
    .with_block_limit(config.demo_blocks);
    log::info!(
        "simulating {} probes, amplitudes {:?}",
        probe_count,
        mux.profile().amplitudes
    );

    let (tx, rx) = mpsc::channel();
    let (tx_cmd, rx_cmd) = mpsc::channel();
    let (feed, rx_blocks) = block_feed(tx.clone());
    let engine = spawn_thread(config.pipeline.clone(), exporters, tx, rx_cmd, rx_blocks);

    tx_cmd.send(EngineCommand::Start).context("engine stopped early")?;
    let mut mode = config.pipeline.mode;
    let mut offered = 0usize;
    let mut last_traces: Vec<ProbeTrace> = Vec::new();
    let mut frames = 0u64;
    let mut skipped = 0u64;

    while let Some(block) = mux.next_block()? {
        if offered == config.demo_blocks / 2 {
            mode = mode.toggled();
            tx_cmd.send(EngineCommand::SetMode(mode)).context("engine stopped early")?;
        }
        feed.offer(block)?;
        offered += 1;
        std::thread::sleep(BLOCK_INTERVAL);

        for msg in rx.try_iter() {
            match msg {
                EngineMessage::Log(line) => log::info!("{line}"),
                EngineMessage::Status(state) => log::info!("pipeline {state:?}"),
                EngineMessage::Frame(frame) => {
                    frames += 1;
                    log::debug!(
                        "[{}] block {} anchor {}: {:?}",
                        frame.mode_label(),
                        frame.sequence,
                        frame.anchor,
                        frame.filtered
                    );
                    last_traces = frame.traces;
                }
                EngineMessage::Skipped(reason) => {
                    skipped += 1;
                    log::debug!("skipped: {reason}");
                }
                EngineMessage::Fault(message) => log::error!("{message}"),
                EngineMessage::Overrun(total) => log::debug!("{total} blocks dropped"),
            }
        }
    }

    tx_cmd.send(EngineCommand::Shutdown).context("engine stopped early")?;
    if engine.join().is_err() {
        anyhow::bail!("engine thread panicked");
    }
    for msg in rx.try_iter() {
        if let EngineMessage::Frame(frame) = msg {
            frames += 1;
            last_traces = frame.traces;
        }
    }
    log::info!(
        "{offered} blocks offered, {frames} published, {skipped} skipped, {} dropped",
        feed.dropped()
    );
    if let Some(latest) = last_traces.iter().map(|t| t.latest()).collect::<Option<Vec<_>>>() {
        println!("latest filtered readings ({}): {latest:?}", mode.label());
    }

    if let Some(path) = &config.export.history_png {
        let png = render_history_png(&last_traces, &PlotStyle::default())?;
        fs::write(path, png).with_context(|| format!("writing {}", path.display()))?;
        log::info!("history plot written to {}", path.display());
    }
    Ok(())
}
