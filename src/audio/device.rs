use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

/// Errors raised while acquiring or driving a capture device.
///
/// All of these are fatal to session start and require user action
/// (grant permission, plug in a microphone) rather than a retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no capture device found")]
    NotFound,

    #[error("audio capture not supported on this platform: {0}")]
    PlatformUnsupported(String),
}

/// Raw PCM audio produced by a capture device (16-bit, interleaved).
#[derive(Debug, Clone)]
pub struct PcmFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFrame {
    /// Audio time covered by this frame, in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }

    /// Normalized loudness in 0-100, for UI metering only.
    pub fn level(&self) -> u8 {
        if self.samples.is_empty() {
            return 0;
        }
        let sum: u64 = self.samples.iter().map(|s| s.unsigned_abs() as u64).sum();
        let avg = sum / self.samples.len() as u64;
        // Scale so that a quarter of full-scale amplitude pegs the meter.
        ((avg * 100 / 8192).min(100)) as u8
    }
}

/// Live output of an acquired capture device.
///
/// `frames` closes when the device is released or runs out of input.
/// `meter` is best-effort: samples are dropped when the receiver lags,
/// and correctness of the recording never depends on it.
pub struct CaptureStream {
    pub frames: mpsc::Receiver<PcmFrame>,
    pub meter: mpsc::Receiver<u8>,
}

/// Platform microphone abstraction.
///
/// Exactly one `ChunkRecorder` owns a device at a time. `release` must be
/// called on every exit path (including errors) so the underlying input is
/// never left open; it is idempotent.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Open the underlying input and start producing frames.
    async fn acquire(&mut self) -> Result<CaptureStream, DeviceError>;

    /// Idempotently free the underlying input.
    async fn release(&mut self);

    fn is_acquired(&self) -> bool;

    /// Device name for logging.
    fn name(&self) -> &str;
}

/// Pushes frames into a [`ScriptedDevice`] from outside.
///
/// Dropping the feed ends the device's frame stream, like unplugging
/// the microphone mid-session.
#[derive(Clone)]
pub struct FrameFeed {
    tx: mpsc::Sender<PcmFrame>,
}

impl FrameFeed {
    pub async fn push(&self, frame: PcmFrame) {
        // A closed channel means the device was released; nothing to feed.
        let _ = self.tx.send(frame).await;
    }
}

enum FrameSource {
    Preloaded(Vec<PcmFrame>),
    Fed(mpsc::Receiver<PcmFrame>),
}

/// In-process capture device driven by scripted or externally fed frames.
///
/// Stands in for a real microphone in tests and local simulation; the
/// production seam is the [`CaptureDevice`] trait itself.
pub struct ScriptedDevice {
    source: Option<FrameSource>,
    fail_with: Option<DeviceError>,
    acquired: bool,
    pump: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ScriptedDevice {
    /// Device that plays back a fixed list of frames, then ends its stream.
    pub fn preloaded(frames: Vec<PcmFrame>) -> Self {
        Self {
            source: Some(FrameSource::Preloaded(frames)),
            fail_with: None,
            acquired: false,
            pump: None,
            shutdown: None,
        }
    }

    /// Device whose frames are pushed by the returned [`FrameFeed`].
    pub fn fed() -> (Self, FrameFeed) {
        let (tx, rx) = mpsc::channel(256);
        let device = Self {
            source: Some(FrameSource::Fed(rx)),
            fail_with: None,
            acquired: false,
            pump: None,
            shutdown: None,
        };
        (device, FrameFeed { tx })
    }

    /// Device that plays a generated tone for the given duration, in
    /// 100 ms frames. Used to run the pipeline end-to-end without real
    /// microphone input.
    pub fn tone(duration: std::time::Duration, sample_rate: u32, channels: u16) -> Self {
        let frame_samples = (sample_rate as usize / 10) * channels as usize;
        let frame_count = (duration.as_millis() / 100) as usize;

        let mut frames = Vec::with_capacity(frame_count);
        let mut phase = 0usize;
        for _ in 0..frame_count {
            let samples: Vec<i16> = (0..frame_samples)
                .map(|i| {
                    let t = (phase + i) as f32 / sample_rate as f32;
                    ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16
                })
                .collect();
            phase += frame_samples;
            frames.push(PcmFrame {
                samples,
                sample_rate,
                channels,
            });
        }

        Self::preloaded(frames)
    }

    /// Device whose acquisition fails with the given error.
    pub fn failing(err: DeviceError) -> Self {
        Self {
            source: None,
            fail_with: Some(err),
            acquired: false,
            pump: None,
            shutdown: None,
        }
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(&mut self) -> Result<CaptureStream, DeviceError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }

        let source = match self.source.take() {
            Some(s) => s,
            None => return Err(DeviceError::NotFound),
        };

        let (frame_tx, frame_rx) = mpsc::channel(256);
        let (meter_tx, meter_rx) = mpsc::channel(64);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let pump = tokio::spawn(async move {
            match source {
                // Preloaded frames count as already captured: all of them
                // are delivered even when release comes first.
                FrameSource::Preloaded(frames) => {
                    for frame in frames {
                        let _ = meter_tx.try_send(frame.level());
                        if frame_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                }
                FrameSource::Fed(mut rx) => loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => {
                            // Deliver frames pushed before the release, then
                            // close the stream.
                            while let Ok(frame) = rx.try_recv() {
                                let _ = meter_tx.try_send(frame.level());
                                if frame_tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            return;
                        }
                        maybe_frame = rx.recv() => match maybe_frame {
                            Some(frame) => {
                                let _ = meter_tx.try_send(frame.level());
                                if frame_tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            None => return,
                        }
                    }
                },
            }
        });

        self.acquired = true;
        self.pump = Some(pump);
        self.shutdown = Some(shutdown_tx);

        info!("Capture device acquired: {}", self.name());

        Ok(CaptureStream {
            frames: frame_rx,
            meter: meter_rx,
        })
    }

    async fn release(&mut self) {
        // Close the frame source and wait for captured frames to drain;
        // aborting here would lose audio the device already produced.
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
        if self.acquired {
            info!("Capture device released: {}", self.name());
        }
        self.acquired = false;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
