//! Transcript fragments and their accumulation into one logical transcript.

mod accumulator;
mod fragment;

pub use accumulator::TranscriptAccumulator;
pub use fragment::TranscriptFragment;
