//! Source decoding
//!
//! Uses symphonia for every common container and codec (WAV, AIFF, FLAC,
//! MP3, OGG Vorbis). Decoded audio always comes back as stereo: mono is
//! duplicated, extra channels beyond the first two are dropped.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use rack_core::{AudioBuffer, Sample};
use symphonia::core::audio::{AudioBuffer as DecodedBuffer, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{OfflineError, OfflineResult};

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Decode an audio file into a stereo buffer
pub fn load_source(path: &Path) -> OfflineResult<AudioBuffer> {
    if !path.exists() {
        return Err(OfflineError::InputNotFound(path.display().to_string()));
    }
    let file = File::open(path).map_err(|e| OfflineError::ReadError(format!("Failed to open file: {e}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let buffer = decode_stream(mss, hint)?;
    log::info!(
        "decoded {}: {} frames at {} Hz",
        path.display(),
        buffer.frames(),
        buffer.sample_rate()
    );
    Ok(buffer)
}

/// Decode an in-memory file image; `extension` helps format probing
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> OfflineResult<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode_stream(mss, hint)
}

fn decode_stream(mss: MediaSourceStream, hint: Hint) -> OfflineResult<AudioBuffer> {
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| OfflineError::ReadError(format!("Failed to probe format: {e}")))?;
    let mut format = probed.format;

    // First audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| OfflineError::ReadError("No audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| OfflineError::ReadError(format!("Failed to create decoder: {e}")))?;

    let mut channels: Vec<Vec<Sample>> = Vec::new();
    let mut sample_rate = codec_params.sample_rate;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(OfflineError::ReadError(format!("Packet read error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip corrupt packets
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(OfflineError::ReadError(format!("Decode error: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let mut planar = DecodedBuffer::<Sample>::new(decoded.capacity() as u64, spec);
        decoded.convert(&mut planar);

        let count = spec.channels.count();
        if channels.is_empty() {
            channels.resize_with(count, Vec::new);
        }
        for (ch, dst) in channels.iter_mut().enumerate().take(count) {
            dst.extend_from_slice(planar.chan(ch));
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| OfflineError::ReadError("Unknown sample rate".to_string()))?;
    if channels.is_empty() || channels[0].is_empty() {
        return Err(OfflineError::ReadError("File contains no audio".to_string()));
    }

    let buffer = AudioBuffer::from_planar(channels, sample_rate)
        .map_err(|e| OfflineError::ReadError(e.to_string()))?;
    Ok(buffer.to_stereo())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_mono_is_duplicated() {
        let bytes = wav_bytes(1, &[0, 16384, -16384, 32767]);
        let buffer = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(buffer.num_channels(), 2);
        assert_eq!(buffer.frames(), 4);
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.channel(0), buffer.channel(1));
        assert_eq!(buffer.channel(0)[1], 0.5);
    }

    #[test]
    fn test_stereo_keeps_channel_order() {
        let bytes = wav_bytes(2, &[16384, -16384, 0, 8192]);
        let buffer = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(buffer.channel(0), &[0.5, 0.0]);
        assert_eq!(buffer.channel(1), &[-0.5, 0.25]);
    }

    #[test]
    fn test_garbage_is_read_error() {
        let err = decode_bytes(b"definitely not audio".to_vec(), None).unwrap_err();
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_missing_file() {
        let err = load_source(Path::new("/nonexistent/source.wav")).unwrap_err();
        assert!(matches!(err, OfflineError::InputNotFound(_)));
    }
}
