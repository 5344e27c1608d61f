//! Media decoding using symphonia
//!
//! Decodes whole files or in-memory blobs (mp3, wav, flac, ogg, aac) to
//! interleaved `f32` PCM.

use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::buffer::PcmBuffer;
use crate::error::AudioError;

/// Decode a file on disk
pub fn decode_file(path: &Path) -> Result<PcmBuffer, AudioError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AudioError::MediaNotFound(format!("{}: {}", path.display(), e)))?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_source(Box::new(file), extension)
}

/// Decode an in-memory blob; `extension` is a format hint
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<PcmBuffer, AudioError> {
    decode_source(Box::new(Cursor::new(bytes)), extension)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> Result<PcmBuffer, AudioError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(AudioError::DecodeFailed(e.to_string())),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(AudioError::DecodeFailed(
            "Stream has no sample rate or channel layout".to_string(),
        ));
    }

    debug!(
        "Decoded {} frames at {} Hz, {} channels",
        samples.len() / channels as usize,
        sample_rate,
        channels
    );

    Ok(PcmBuffer::new(samples, channels, sample_rate))
}

/// Write PCM as a 32-bit float WAV file
pub fn write_wav(path: &Path, buffer: &PcmBuffer) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| AudioError::StreamError(e.to_string()))?;
    for sample in &buffer.samples {
        writer
            .write_sample(*sample)
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, frames: usize, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let v = if i % 2 == 0 { 8000i16 } else { -8000i16 };
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.wav");
        write_test_wav(&path, 8000, 8000);

        let pcm = decode_file(&path).unwrap();
        assert_eq!(pcm.channels, 1);
        assert_eq!(pcm.sample_rate, 8000);
        assert_eq!(pcm.frames(), 8000);
        assert!((pcm.peak() - 8000.0 / 32768.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_bytes_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.wav");
        write_test_wav(&path, 400, 16000);

        let bytes = std::fs::read(&path).unwrap();
        let pcm = decode_bytes(bytes, Some("wav")).unwrap();
        assert_eq!(pcm.frames(), 400);
        assert_eq!(pcm.sample_rate, 16000);
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let err = decode_bytes(b"definitely not audio".to_vec(), None).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = decode_file(Path::new("/nonexistent/voice.mp3")).unwrap_err();
        assert!(matches!(err, AudioError::MediaNotFound(_)));
    }

    #[test]
    fn test_write_wav_round_trip_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = PcmBuffer::new(vec![0.25, -0.25, 0.5, -0.5], 2, 22050);
        write_wav(&path, &buffer).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.duration(), 2);
    }
}
