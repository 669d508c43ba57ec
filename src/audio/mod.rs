pub mod chunk;
pub mod device;
pub mod recorder;

pub use chunk::{merge_chunks_to_wav, AudioChunk};
pub use device::{CaptureDevice, CaptureStream, DeviceError, FrameFeed, PcmFrame, ScriptedDevice};
pub use recorder::{
    ChunkRecorder, ChunkSlicer, RecorderError, RecorderState, RecorderStream,
    DEFAULT_CHUNK_INTERVAL,
};
