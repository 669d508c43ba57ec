use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::chunk::AudioChunk;
use super::device::{CaptureDevice, DeviceError, PcmFrame};

/// Default interval between emitted chunks.
pub const DEFAULT_CHUNK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A recorder is single-use; construct a new one per session.
    #[error("recorder already started (state {0:?})")]
    NotReusable(RecorderState),
}

/// Live output of a started recorder.
pub struct RecorderStream {
    pub chunks: mpsc::Receiver<AudioChunk>,
    /// Loudness meter passed through from the capture device. Best-effort.
    pub meter: mpsc::Receiver<u8>,
}

/// Accumulates PCM frames into fixed-interval chunks.
///
/// All time accounting is derived from sample counts, so chunk timestamps
/// exclude paused intervals by construction: paused frames are simply never
/// ingested.
pub struct ChunkSlicer {
    interval_ms: u64,
    recorded_ms: u64,
    chunk_start_ms: u64,
    next_sequence: u32,
    buf: Vec<u8>,
}

impl ChunkSlicer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis().max(1) as u64,
            recorded_ms: 0,
            chunk_start_ms: 0,
            next_sequence: 0,
            buf: Vec::new(),
        }
    }

    /// Fold one frame in; returns a completed chunk once the interval fills.
    pub fn ingest(&mut self, frame: &PcmFrame) -> Option<AudioChunk> {
        self.buf
            .extend(frame.samples.iter().flat_map(|s| s.to_le_bytes()));
        self.recorded_ms += frame.duration_ms();

        if self.recorded_ms - self.chunk_start_ms >= self.interval_ms {
            return Some(self.take_chunk());
        }
        None
    }

    /// Emit whatever partial chunk is buffered. Called once at stop time so
    /// the trailing interval is kept as a short last chunk, not discarded.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        if self.buf.is_empty() {
            return None;
        }
        Some(self.take_chunk())
    }

    /// Total audio time ingested so far, paused intervals excluded.
    pub fn recorded_ms(&self) -> u64 {
        self.recorded_ms
    }

    fn take_chunk(&mut self) -> AudioChunk {
        let chunk = AudioChunk {
            data: std::mem::take(&mut self.buf),
            timestamp_ms: self.chunk_start_ms,
            sequence: self.next_sequence,
        };
        self.chunk_start_ms = self.recorded_ms;
        self.next_sequence += 1;
        chunk
    }
}

/// Slices live audio from a capture device into fixed-interval chunks.
///
/// States: `Idle -> Recording <-> Paused -> Stopped`. `Stopped` is terminal;
/// a new recorder is constructed for each session.
pub struct ChunkRecorder {
    device: Box<dyn CaptureDevice>,
    state: RecorderState,
    paused: Arc<AtomicBool>,
    recorded_ms: Arc<AtomicU64>,
    pump: Option<JoinHandle<()>>,
}

impl ChunkRecorder {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            state: RecorderState::Idle,
            paused: Arc::new(AtomicBool::new(false)),
            recorded_ms: Arc::new(AtomicU64::new(0)),
            pump: None,
        }
    }

    /// Acquire the capture device and begin emitting chunks at the given
    /// interval. Fails without acquiring anything if the device is not
    /// available; the caller surfaces that to the user.
    pub async fn start(&mut self, chunk_interval: Duration) -> Result<RecorderStream, RecorderError> {
        if self.state != RecorderState::Idle {
            warn!("Chunk recorder is single-use; start refused");
            return Err(RecorderError::NotReusable(self.state));
        }

        let stream = self.device.acquire().await?;
        let mut frames = stream.frames;

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let paused = Arc::clone(&self.paused);
        let recorded_ms = Arc::clone(&self.recorded_ms);

        let pump = tokio::spawn(async move {
            let mut slicer = ChunkSlicer::new(chunk_interval);

            while let Some(frame) = frames.recv().await {
                // Paused frames are dropped whole; the device stays acquired
                // so resume is instantaneous.
                if paused.load(Ordering::Relaxed) {
                    continue;
                }

                if let Some(chunk) = slicer.ingest(&frame) {
                    if chunk_tx.send(chunk).await.is_err() {
                        break;
                    }
                }
                recorded_ms.store(slicer.recorded_ms(), Ordering::Relaxed);
            }

            // Frame stream ended (device released or input exhausted):
            // flush the trailing partial chunk.
            if let Some(chunk) = slicer.flush() {
                if chunk_tx.send(chunk).await.is_err() {
                    error!("Chunk receiver dropped before final flush");
                }
            }
            recorded_ms.store(slicer.recorded_ms(), Ordering::Relaxed);
        });

        self.pump = Some(pump);
        self.state = RecorderState::Recording;

        info!(
            "Chunk recorder started (interval {} ms)",
            chunk_interval.as_millis()
        );

        Ok(RecorderStream {
            chunks: chunk_rx,
            meter: stream.meter,
        })
    }

    /// Valid only while `Recording`; a no-op otherwise.
    pub fn pause(&mut self) {
        if self.state != RecorderState::Recording {
            warn!("Pause ignored in state {:?}", self.state);
            return;
        }
        self.paused.store(true, Ordering::Relaxed);
        self.state = RecorderState::Paused;
        info!("Recording paused");
    }

    /// Valid only while `Paused`; a no-op otherwise.
    pub fn resume(&mut self) {
        if self.state != RecorderState::Paused {
            warn!("Resume ignored in state {:?}", self.state);
            return;
        }
        self.paused.store(false, Ordering::Relaxed);
        self.state = RecorderState::Recording;
        info!("Recording resumed");
    }

    /// Flush the in-flight partial chunk, release the device and return the
    /// total recorded duration, paused intervals excluded. Idempotent.
    pub async fn stop(&mut self) -> Duration {
        if self.state == RecorderState::Stopped {
            return Duration::from_millis(self.recorded_ms.load(Ordering::Relaxed));
        }

        // Releasing the device closes the frame stream, which lets the pump
        // drain buffered frames, flush the partial chunk and exit.
        self.device.release().await;

        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                error!("Recorder pump task panicked: {}", e);
            }
        }

        self.paused.store(false, Ordering::Relaxed);
        self.state = RecorderState::Stopped;

        let duration = Duration::from_millis(self.recorded_ms.load(Ordering::Relaxed));
        info!("Chunk recorder stopped after {:.1}s", duration.as_secs_f64());
        duration
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Audio time recorded so far, paused intervals excluded.
    pub fn recorded(&self) -> Duration {
        Duration::from_millis(self.recorded_ms.load(Ordering::Relaxed))
    }

    pub fn is_paused(&self) -> bool {
        self.state == RecorderState::Paused
    }
}

impl Drop for ChunkRecorder {
    fn drop(&mut self) {
        // The pump owns no device handle; aborting it here covers the case
        // where the recorder is dropped without a stop() call.
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ms: u64) -> PcmFrame {
        // 16 kHz mono: 16 samples per millisecond.
        PcmFrame {
            samples: vec![0i16; (ms * 16) as usize],
            sample_rate: 16000,
            channels: 1,
        }
    }

    #[test]
    fn slicer_emits_on_interval_boundary() {
        let mut slicer = ChunkSlicer::new(Duration::from_millis(500));

        for _ in 0..4 {
            assert!(slicer.ingest(&frame(100)).is_none());
        }
        let chunk = slicer.ingest(&frame(100)).expect("fifth frame fills interval");
        assert_eq!(chunk.sequence, 0);
        assert_eq!(chunk.timestamp_ms, 0);
        assert_eq!(chunk.data.len(), 500 * 16 * 2);
    }

    #[test]
    fn slicer_timestamps_are_monotonic() {
        let mut slicer = ChunkSlicer::new(Duration::from_millis(200));
        let mut timestamps = Vec::new();

        for _ in 0..10 {
            if let Some(chunk) = slicer.ingest(&frame(100)) {
                timestamps.push(chunk.timestamp_ms);
            }
        }

        assert_eq!(timestamps, vec![0, 200, 400, 600, 800]);
    }

    #[test]
    fn slicer_flush_keeps_short_last_chunk() {
        let mut slicer = ChunkSlicer::new(Duration::from_millis(1000));

        assert!(slicer.ingest(&frame(300)).is_none());
        let last = slicer.flush().expect("partial chunk is flushed, not discarded");
        assert_eq!(last.timestamp_ms, 0);
        assert_eq!(last.data.len(), 300 * 16 * 2);
        assert!(slicer.flush().is_none());
    }

    #[test]
    fn slicer_tracks_recorded_time() {
        let mut slicer = ChunkSlicer::new(Duration::from_millis(1000));
        slicer.ingest(&frame(250));
        slicer.ingest(&frame(250));
        assert_eq!(slicer.recorded_ms(), 500);
    }
}
