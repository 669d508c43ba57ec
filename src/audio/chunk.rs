use anyhow::{Context, Result};
use std::io::Cursor;

/// A time-sliced segment of captured audio.
///
/// Immutable once produced by the recorder. `timestamp_ms` is relative to
/// session start and excludes paused time; timestamps are strictly
/// increasing in capture order.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw little-endian 16-bit PCM bytes.
    pub data: Vec<u8>,
    /// Capture-relative start of this chunk, in milliseconds.
    pub timestamp_ms: u64,
    /// Position in the capture sequence (0-indexed).
    pub sequence: u32,
}

impl AudioChunk {
    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Join the PCM payloads of a whole session into one WAV blob.
///
/// Used at stop time to hand the complete audio to `transcribe_full`;
/// chunk boundaries can clip words, so a full-audio pass is preferred
/// over per-chunk transcripts when the service supports it.
pub fn merge_chunks_to_wav(
    chunks: &[AudioChunk],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer for merged audio")?;

        for chunk in chunks {
            for bytes in chunk.data.chunks_exact(2) {
                let sample = i16::from_le_bytes([bytes[0], bytes[1]]);
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to merged WAV")?;
            }
        }

        writer.finalize().context("Failed to finalize merged WAV")?;
    }

    Ok(cursor.into_inner())
}
