// src/engine.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{ExportConfig, PipelineConfig};
use crate::drivers::{BlockOutcome, FramePipeline, ProbeFrame, RawBlock, ScopeError};
use crate::notify::{open_serial, ProbeCycle, ProbeNotifier};
use crate::recorder::{DataRecorder, LatestValueSink, ValuesFile};
use crate::types::*;

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Producer side of the single-slot block channel. A block offered while the
/// previous one is still waiting is dropped and counted, never queued.
#[derive(Clone)]
pub struct BlockFeed {
    slot: SyncSender<RawBlock>,
    dropped: Arc<AtomicU64>,
    tx: Sender<EngineMessage>,
}

impl BlockFeed {
    /// `Ok(false)` means the block was dropped.
    pub fn offer(&self, block: RawBlock) -> Result<bool, ScopeError> {
        match self.slot.try_send(block) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("engine busy, block dropped ({total} so far)");
                self.tx.send(EngineMessage::Overrun(total)).ok();
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(ScopeError::ChannelClosed),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub fn block_feed(tx: Sender<EngineMessage>) -> (BlockFeed, Receiver<RawBlock>) {
    let (slot, rx_blocks) = mpsc::sync_channel(1);
    let feed = BlockFeed {
        slot,
        dropped: Arc::new(AtomicU64::new(0)),
        tx,
    };
    (feed, rx_blocks)
}

/// Per-block outputs besides the message channel.
pub struct Exporters {
    values: Option<ValuesFile>,
    latest: Option<LatestValueSink<std::fs::File>>,
    record_path: Option<std::path::PathBuf>,
    recorder: DataRecorder,
    notifier: Option<Box<dyn ProbeNotifier + Send>>,
    cycle: ProbeCycle,
}

impl Exporters {
    pub fn none(probe_count: usize) -> Self {
        Self {
            values: None,
            latest: None,
            record_path: None,
            recorder: DataRecorder::new(),
            notifier: None,
            cycle: ProbeCycle::new(probe_count),
        }
    }

    pub fn from_config(config: &ExportConfig, probe_count: usize) -> Result<Self, ScopeError> {
        let mut exporters = Self::none(probe_count);
        exporters.values = config.values_path.clone().map(ValuesFile::new);
        if let Some(path) = &config.latest_path {
            exporters.latest = Some(LatestValueSink::create(path)?);
        }
        exporters.record_path = config.record_path.clone();
        if let Some(port) = &config.serial_port {
            exporters.notifier = Some(Box::new(open_serial(port, config.baud_rate)?));
        }
        Ok(exporters)
    }

    pub fn with_notifier(mut self, notifier: Box<dyn ProbeNotifier + Send>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Closes any recording still open from a previous session first.
    fn start(&mut self, probe_count: usize) -> Result<(), ScopeError> {
        self.stop()?;
        if let Some(path) = &self.record_path {
            self.recorder.start(path, probe_count)?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ScopeError> {
        self.recorder.stop()
    }

    /// Values file, CSV row, then the next probe number and its reading.
    fn publish(&mut self, frame: &ProbeFrame) -> Result<(), ScopeError> {
        if let Some(values) = &self.values {
            values.write(&frame.raw)?;
        }
        self.recorder.write_record(&frame.raw)?;
        let probe = self.cycle.advance();
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.notify(probe)?;
        }
        if let (Some(latest), Some(&value)) = (self.latest.as_mut(), frame.raw.get(probe - 1)) {
            latest.write(value)?;
        }
        Ok(())
    }
}

/// Runs the pipeline on its own thread until `Shutdown` or until the command
/// channel closes.
pub fn spawn_thread(
    config: PipelineConfig,
    mut exporters: Exporters,
    tx: Sender<EngineMessage>,
    rx_cmd: Receiver<EngineCommand>,
    rx_blocks: Receiver<RawBlock>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut pipeline = FramePipeline::new(config);
        let probe_count = pipeline.config().probe_count;
        let mut feed_open = true;
        tx.send(EngineMessage::Log("engine ready".to_owned())).ok();

        'run: loop {
            // 1. commands
            if !drain_commands(&rx_cmd, &mut pipeline, &mut exporters, &tx, probe_count) {
                break 'run;
            }

            // 2. one block, if any arrives in time
            let block = if feed_open {
                match rx_blocks.recv_timeout(IDLE_POLL) {
                    Ok(block) => block,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        log::info!("block feed closed");
                        feed_open = false;
                        continue;
                    }
                }
            } else {
                thread::sleep(IDLE_POLL);
                continue;
            };

            // commands sent before this block was offered take effect first
            if !drain_commands(&rx_cmd, &mut pipeline, &mut exporters, &tx, probe_count) {
                break 'run;
            }

            match pipeline.on_block(&block) {
                Ok(BlockOutcome::Published(frame)) => {
                    if let Err(e) = exporters.publish(&frame) {
                        log::warn!("export failed: {e}");
                        tx.send(EngineMessage::Log(format!("export failed: {e}"))).ok();
                    }
                    tx.send(EngineMessage::Frame(frame)).ok();
                }
                Ok(BlockOutcome::Skipped(reason)) => {
                    tx.send(EngineMessage::Skipped(reason)).ok();
                }
                Err(ScopeError::NotRunning) => log::debug!("block ignored while idle"),
                Err(e) => {
                    tx.send(EngineMessage::Fault(pipeline.fault(e).to_string())).ok();
                    tx.send(EngineMessage::Status(pipeline.state())).ok();
                }
            }
        }

        pipeline.stop();
        close_exporters(&mut exporters, &tx);
        tx.send(EngineMessage::Status(pipeline.state())).ok();
        tx.send(EngineMessage::Log("engine shut down".to_owned())).ok();
    })
}

fn close_exporters(exporters: &mut Exporters, tx: &Sender<EngineMessage>) {
    if let Err(e) = exporters.stop() {
        log::warn!("recorder not closed cleanly: {e}");
        tx.send(EngineMessage::Log(format!("recorder not closed cleanly: {e}"))).ok();
    }
}

/// Applies every pending command. Returns false when the engine should exit.
fn drain_commands(
    rx_cmd: &Receiver<EngineCommand>,
    pipeline: &mut FramePipeline,
    exporters: &mut Exporters,
    tx: &Sender<EngineMessage>,
    probe_count: usize,
) -> bool {
    loop {
        let cmd = match rx_cmd.try_recv() {
            Ok(cmd) => cmd,
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        };
        match cmd {
            EngineCommand::Start => match pipeline.start() {
                Ok(()) => {
                    if let Err(e) = exporters.start(probe_count) {
                        log::warn!("recorder not started: {e}");
                        tx.send(EngineMessage::Log(format!("recorder not started: {e}"))).ok();
                    }
                    tx.send(EngineMessage::Status(pipeline.state())).ok();
                }
                Err(e) => {
                    log::error!("start failed: {e}");
                    tx.send(EngineMessage::Fault(e.to_string())).ok();
                }
            },
            EngineCommand::Stop => {
                pipeline.stop();
                close_exporters(exporters, tx);
                tx.send(EngineMessage::Status(pipeline.state())).ok();
            }
            EngineCommand::SetMode(mode) => {
                pipeline.set_mode(mode);
                tx.send(EngineMessage::Log(format!("mode: {}", mode.label()))).ok();
            }
            EngineCommand::Fault(message) => {
                let error = pipeline.fault(ScopeError::Acquisition(message));
                close_exporters(exporters, tx);
                tx.send(EngineMessage::Fault(error.to_string())).ok();
                tx.send(EngineMessage::Status(pipeline.state())).ok();
            }
            EngineCommand::Shutdown => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{BlockSource, MuxProfile, PipelineState, SimulatedMux};
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        tx_cmd: Sender<EngineCommand>,
        rx: Receiver<EngineMessage>,
        feed: BlockFeed,
        handle: JoinHandle<()>,
        mux: SimulatedMux,
    }

    fn harness(exporters: Exporters) -> Harness {
        let config = PipelineConfig {
            mode: MeasurementMode::Voltage,
            ..PipelineConfig::default()
        };
        let mux = SimulatedMux::new(&config, MuxProfile::ramp(&config), 11);
        let (tx, rx) = mpsc::channel();
        let (tx_cmd, rx_cmd) = mpsc::channel();
        let (feed, rx_blocks) = block_feed(tx.clone());
        let handle = spawn_thread(config, exporters, tx, rx_cmd, rx_blocks);
        Harness {
            tx_cmd,
            rx,
            feed,
            handle,
            mux,
        }
    }

    impl Harness {
        fn offer_next(&mut self) {
            let block = self.mux.next_block().unwrap().unwrap();
            assert!(self.feed.offer(block).unwrap());
        }

        /// Next message that is not a log line.
        fn next_event(&self) -> EngineMessage {
            loop {
                match self.rx.recv_timeout(WAIT).unwrap() {
                    EngineMessage::Log(_) => continue,
                    other => return other,
                }
            }
        }

        fn shutdown(self) {
            self.tx_cmd.send(EngineCommand::Shutdown).unwrap();
            self.handle.join().unwrap();
        }
    }

    #[derive(Clone, Default)]
    struct SharedNotifier(Arc<Mutex<Vec<usize>>>);

    impl ProbeNotifier for SharedNotifier {
        fn notify(&mut self, probe: usize) -> Result<(), ScopeError> {
            self.0.lock().unwrap().push(probe);
            Ok(())
        }
    }

    #[test]
    fn feed_drops_when_slot_is_full() {
        let (tx, rx) = mpsc::channel();
        let (feed, _rx_blocks) = block_feed(tx);
        let block = RawBlock::new(vec![0.0; 4], vec![0.0; 4]);
        assert!(feed.offer(block.clone()).unwrap());
        assert!(!feed.offer(block.clone()).unwrap());
        assert!(!feed.offer(block).unwrap());
        assert_eq!(feed.dropped(), 2);
        let overruns: Vec<u64> = rx
            .try_iter()
            .filter_map(|m| match m {
                EngineMessage::Overrun(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(overruns, vec![1, 2]);
    }

    #[test]
    fn feed_reports_closed_engine() {
        let (tx, _rx) = mpsc::channel();
        let (feed, rx_blocks) = block_feed(tx);
        drop(rx_blocks);
        let block = RawBlock::new(vec![0.0; 4], vec![0.0; 4]);
        assert!(matches!(feed.offer(block), Err(ScopeError::ChannelClosed)));
    }

    #[test]
    fn publishes_frames_while_running() {
        let notified = SharedNotifier::default();
        let mut h = harness(Exporters::none(7).with_notifier(Box::new(notified.clone())));
        h.tx_cmd.send(EngineCommand::Start).unwrap();
        assert!(matches!(
            h.next_event(),
            EngineMessage::Status(PipelineState::Running)
        ));

        for expected_sequence in 0..3 {
            h.offer_next();
            match h.next_event() {
                EngineMessage::Frame(frame) => {
                    assert_eq!(frame.sequence, expected_sequence);
                    assert_eq!(frame.raw.len(), 7);
                    assert_eq!(frame.mode_label(), "Voltage");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(*notified.0.lock().unwrap(), vec![1, 2, 3]);

        h.tx_cmd
            .send(EngineCommand::SetMode(MeasurementMode::Impedance))
            .unwrap();
        h.offer_next();
        match h.next_event() {
            EngineMessage::Frame(frame) => assert_eq!(frame.mode, MeasurementMode::Impedance),
            other => panic!("unexpected {other:?}"),
        }
        h.shutdown();
    }

    #[test]
    fn fault_stops_the_session() {
        let mut h = harness(Exporters::none(7));
        h.tx_cmd.send(EngineCommand::Start).unwrap();
        assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Running)));

        h.tx_cmd
            .send(EngineCommand::Fault("USB unplugged".into()))
            .unwrap();
        match h.next_event() {
            EngineMessage::Fault(message) => assert_eq!(message, "acquisition fault: USB unplugged"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Idle)));

        h.tx_cmd.send(EngineCommand::Start).unwrap();
        assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Running)));
        h.offer_next();
        assert!(matches!(h.next_event(), EngineMessage::Frame(_)));
        h.shutdown();
    }

    #[test]
    fn restart_keeps_recorded_rows() {
        let path = std::env::temp_dir().join(format!(
            "hasel-scope-engine-{}-restart.csv",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut exporters = Exporters::none(7);
        exporters.record_path = Some(path.clone());
        let mut h = harness(exporters);

        for _ in 0..2 {
            h.tx_cmd.send(EngineCommand::Start).unwrap();
            assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Running)));
            h.offer_next();
            assert!(matches!(h.next_event(), EngineMessage::Frame(_)));
        }
        h.tx_cmd.send(EngineCommand::Stop).unwrap();
        assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Idle)));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3, "{text}");
        assert!(text.starts_with("elapsed_s,p0,"));
        h.shutdown();
    }

    #[test]
    fn skipped_blocks_are_reported() {
        let h = harness(Exporters::none(7));
        h.tx_cmd.send(EngineCommand::Start).unwrap();
        assert!(matches!(h.next_event(), EngineMessage::Status(PipelineState::Running)));
        h.feed
            .offer(RawBlock::new(vec![1.0; 3000], vec![1.0; 3000]))
            .unwrap();
        assert!(matches!(h.next_event(), EngineMessage::Skipped(_)));
        h.shutdown();
    }
}
