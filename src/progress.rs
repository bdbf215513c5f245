#![forbid(unsafe_code)]

//! Progress reporting for in-flight transfers.
//!
//! The transfer loop is the producer; whatever observes progress (CLI, UI,
//! logger) is the consumer. They are decoupled by a bounded channel sized to
//! the full percentage range, and the producer only ever uses a non-blocking
//! send: a slow or absent consumer can never stall the transfer.

/// One slot per possible percentage point, so the channel cannot fill even
/// if the consumer never reads.
pub const PROGRESS_CAPACITY: usize = 100;

/// Producer half of the progress channel. Cloneable so each download
/// attempt gets its own handle.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: flume::Sender<u8>,
}

impl ProgressSender {
    /// Non-blocking send. A full or disconnected channel drops the event;
    /// progress is advisory and must never back-pressure the writer.
    fn emit(&self, level: u8) {
        let _ = self.tx.try_send(level);
    }
}

/// Creates the bounded progress channel. Levels arrive as integer
/// percentages in `[0, 100]`, strictly increasing.
pub fn progress_channel() -> (ProgressSender, flume::Receiver<u8>) {
    let (tx, rx) = flume::bounded(PROGRESS_CAPACITY);
    (ProgressSender { tx }, rx)
}

/// Transient state for one download attempt: cumulative bytes written,
/// expected total length (0 = unknown), and the last emitted progress
/// level. Discarded between fallback attempts, never reused.
#[derive(Debug)]
pub struct DownloadSession {
    total: u64,
    written: u64,
    level: u8,
    progress: ProgressSender,
}

impl DownloadSession {
    pub fn new(total: u64, progress: ProgressSender) -> Self {
        Self {
            total,
            written: 0,
            level: 0,
            progress,
        }
    }

    /// Records `n` freshly written bytes. When the integer percentage passes
    /// the last emitted level, the level advances by exactly one and that
    /// single event is emitted — at most one new level per write callback,
    /// monotonic, clamped to 100. An unknown total suppresses percentage
    /// computation entirely rather than dividing by zero.
    pub fn record(&mut self, n: u64) {
        self.written += n;
        if self.total == 0 {
            return;
        }
        let percent = self.written.saturating_mul(100) / self.total;
        if self.level < 100 && percent > u64::from(self.level) {
            self.level += 1;
            self.progress.emit(self.level);
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn level(&self) -> u8 {
        self.level
    }
}
