//! WAV validation and bounded-memory base64 encoding.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;

/// Reject audio artifacts above this size.
pub const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Chunk size for the streaming base64 encode.
const ENCODE_CHUNK: usize = 32 * 1024;

/// Why an audio artifact was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavRejection {
    /// Larger than 25 MiB
    TooLarge,
    /// First four bytes are not ASCII `RIFF`
    NotRiff,
}

impl WavRejection {
    pub fn code(&self) -> &'static str {
        match self {
            WavRejection::TooLarge => "audio-too-large",
            WavRejection::NotRiff => "invalid-wav",
        }
    }
}

/// Validate a WAV artifact before it is handed to the transcription model.
pub fn validate_wav(bytes: &[u8]) -> Result<(), WavRejection> {
    if bytes.len() > MAX_AUDIO_BYTES {
        return Err(WavRejection::TooLarge);
    }
    if bytes.len() < 4 || &bytes[..4] != b"RIFF" {
        return Err(WavRejection::NotRiff);
    }
    Ok(())
}

/// Base64-encode audio in 32 KiB writes.
///
/// The encoder carries partial quanta across writes, so chunking bounds
/// working memory without changing the output.
pub fn encode_base64_chunked(bytes: &[u8]) -> String {
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    for chunk in bytes.chunks(ENCODE_CHUNK) {
        encoder
            .write_all(chunk)
            .expect("string writer cannot fail");
    }
    encoder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    /// A minimal 44-byte RIFF/WAVE header (16 kHz mono 16-bit).
    pub(crate) fn riff_header() -> Vec<u8> {
        let mut bytes = Vec::with_capacity(44);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&36u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&16_000u32.to_le_bytes());
        bytes.extend_from_slice(&32_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_riff_header_accepted() {
        assert!(validate_wav(&riff_header()).is_ok());
    }

    #[test]
    fn test_zeroed_magic_rejected() {
        let mut bytes = riff_header();
        bytes[..4].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(validate_wav(&bytes), Err(WavRejection::NotRiff));
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(validate_wav(b"RI"), Err(WavRejection::NotRiff));
    }

    #[test]
    fn test_oversize_rejected() {
        let bytes = vec![0u8; MAX_AUDIO_BYTES + 1];
        assert_eq!(validate_wav(&bytes), Err(WavRejection::TooLarge));
    }

    #[test]
    fn test_chunked_encode_matches_whole() {
        // Cross the chunk boundary so carry-over is exercised
        let bytes: Vec<u8> = (0..(ENCODE_CHUNK * 2 + 7)).map(|i| (i % 251) as u8).collect();
        let chunked = encode_base64_chunked(&bytes);
        let whole = STANDARD.encode(&bytes);
        assert_eq!(chunked, whole);
    }
}
