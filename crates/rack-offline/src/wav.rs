//! 16-bit PCM RIFF/WAVE container
//!
//! Layout (little-endian):
//!
//! ```text
//! 0   "RIFF"  total size - 8  "WAVE"
//! 12  "fmt "  16  tag=1  channels  rate  byte rate  block align  16
//! 36  "data"  frames * channels * 2  interleaved i16 samples
//! ```

use std::io::Write;
use std::path::Path;

use rack_core::{AudioBuffer, Sample};
use tempfile::NamedTempFile;

use crate::error::{OfflineError, OfflineResult};

/// Size of the RIFF + fmt + data headers
pub const HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: usize = 2;
const PCM_FORMAT_TAG: u16 = 1;

/// Float sample to signed 16-bit
///
/// Clamped to [-1, 1] first; negative values scale by 32768 and the rest by
/// 32767, so both ends of the range are reachable and 0.0 stays 0.
#[inline]
pub fn quantize(sample: Sample) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode `sample_count` frames of `buffer` as a WAV file image
///
/// Frames past the end of the buffer are written as silence.
pub fn encode(buffer: &AudioBuffer, sample_count: usize) -> OfflineResult<Vec<u8>> {
    let channels = buffer.num_channels();
    if channels == 0 || channels > u16::MAX as usize {
        return Err(OfflineError::EncodingError(format!("unsupported channel count {channels}")));
    }

    let block_align = channels * BYTES_PER_SAMPLE;
    let data_len = sample_count
        .checked_mul(block_align)
        .filter(|&len| len <= u32::MAX as usize - (HEADER_LEN - 8))
        .ok_or_else(|| OfflineError::EncodingError(format!("{sample_count} frames do not fit a RIFF container")))?;
    let byte_rate = (buffer.sample_rate() as u64) * block_align as u64;
    let byte_rate = u32::try_from(byte_rate)
        .map_err(|_| OfflineError::EncodingError(format!("byte rate {byte_rate} out of range")))?;

    let mut out = Vec::new();
    out.try_reserve_exact(HEADER_LEN + data_len)
        .map_err(|e| OfflineError::EncodingError(format!("cannot allocate {} bytes: {e}", HEADER_LEN + data_len)))?;

    // RIFF header
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((HEADER_LEN - 8 + data_len) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt chunk
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    out.extend_from_slice(&(channels as u16).to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&(block_align as u16).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    // data chunk
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());

    let frames = buffer.frames().min(sample_count);
    for frame in 0..frames {
        for ch in 0..channels {
            out.extend_from_slice(&quantize(buffer.channel(ch)[frame]).to_le_bytes());
        }
    }
    out.resize(HEADER_LEN + data_len, 0);

    Ok(out)
}

/// Write `bytes` to `path` through a temporary file in the same directory,
/// so a failed write never leaves a partial file behind
pub fn write_atomic(path: &Path, bytes: &[u8]) -> OfflineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(OfflineError::WriteError(format!(
            "Output directory does not exist: {}",
            dir.display()
        )));
    }

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e.error)))?;

    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_asymmetric_scale() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(-0.0), 0);
        assert_eq!(quantize(2.5), 32767);
        assert_eq!(quantize(-7.0), -32768);
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16384);
        assert_eq!(quantize(f64::NAN), 0);
    }

    #[test]
    fn test_encode_exact_bytes() {
        let buffer = AudioBuffer::from_planar(vec![vec![1.0, -1.0], vec![0.0, 0.0]], 44100).unwrap();
        let bytes = encode(&buffer, 2).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"RIFF");
        expected.extend_from_slice(&44u32.to_le_bytes());
        expected.extend_from_slice(b"WAVE");
        expected.extend_from_slice(b"fmt ");
        expected.extend_from_slice(&16u32.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&2u16.to_le_bytes());
        expected.extend_from_slice(&44100u32.to_le_bytes());
        expected.extend_from_slice(&176_400u32.to_le_bytes());
        expected.extend_from_slice(&4u16.to_le_bytes());
        expected.extend_from_slice(&16u16.to_le_bytes());
        expected.extend_from_slice(b"data");
        expected.extend_from_slice(&8u32.to_le_bytes());
        // frame 0: L=32767 R=0, frame 1: L=-32768 R=0
        expected.extend_from_slice(&[0xFF, 0x7F, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00]);

        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_encode_pads_past_buffer_end() {
        let buffer = AudioBuffer::from_planar(vec![vec![0.5; 3]], 8000).unwrap();
        let bytes = encode(&buffer, 5).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 10);
        assert_eq!(&bytes[22..24], &1u16.to_le_bytes());
        assert!(bytes[HEADER_LEN + 6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_truncates_to_sample_count() {
        let buffer = AudioBuffer::from_planar(vec![vec![0.25; 100]; 2], 8000).unwrap();
        let bytes = encode(&buffer, 10).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 40);
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("out.wav");
        assert!(matches!(write_atomic(&path, b"x"), Err(OfflineError::WriteError(_))));
    }
}
