//! Captured microphone audio.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capture sample rate expected by the transcription engine (16 kHz mono, 16-bit).
pub const SAMPLE_RATE: u32 = 16_000;

/// One block of raw 16-bit mono PCM delivered by the capture source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
}

impl AudioChunk {
    #[must_use]
    pub const fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Decode little-endian 16-bit PCM bytes, the layout raw input streams deliver.
    ///
    /// A trailing odd byte is ignored.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self { samples }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A sealed recording: everything captured while the control was held.
///
/// Created by the capture channel on press and handed to the session
/// controller on release. Once sealed its chunks and duration never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub chunks: Vec<AudioChunk>,
    /// Wall-clock time between open and close.
    pub duration: Duration,
}

impl RecordingSession {
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of samples across all chunks.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.chunks.iter().map(AudioChunk::len).sum()
    }

    /// All samples concatenated in capture order.
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        let mut out = Vec::with_capacity(self.sample_count());
        for chunk in &self.chunks {
            out.extend_from_slice(&chunk.samples);
        }
        out
    }

    /// Length of the captured audio derived from the sample count.
    #[must_use]
    pub fn audio_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        Duration::from_secs_f64(self.sample_count() as f64 / f64::from(self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(chunks: Vec<AudioChunk>) -> RecordingSession {
        RecordingSession {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            sample_rate: SAMPLE_RATE,
            chunks,
            duration: Duration::from_millis(250),
        }
    }

    #[test]
    fn from_le_bytes_decodes_pairs() {
        let chunk = AudioChunk::from_le_bytes(&[0x01, 0x00, 0xff, 0xff, 0x7f]);
        assert_eq!(chunk.samples, vec![1, -1]);
    }

    #[test]
    fn samples_concatenate_in_order() {
        let s = session(vec![AudioChunk::new(vec![1, 2]), AudioChunk::new(vec![3])]);
        assert_eq!(s.samples(), vec![1, 2, 3]);
        assert_eq!(s.chunk_count(), 2);
        assert_eq!(s.sample_count(), 3);
    }

    #[test]
    fn audio_duration_uses_sample_rate() {
        let s = session(vec![AudioChunk::new(vec![0; 8_000])]);
        assert_eq!(s.audio_duration(), Duration::from_millis(500));
    }
}
