//! Offline sample rate conversion using rubato
//!
//! Decoded media is brought to the output context rate once, at load, and
//! the mixdown converts the background to the voice's rate. Only the
//! playback-rate step in `MediaElement::render_add` interpolates in real
//! time.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::audio::buffer::PcmBuffer;
use crate::error::AudioError;

/// Frames fed to the resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Resample to `sample_rate`, keeping the channel layout.
///
/// The result has exactly `round(frames * out / in)` frames, so durations
/// survive conversion; the filter delay is trimmed and the tail flushed.
pub fn resample(buffer: &PcmBuffer, sample_rate: u32) -> Result<PcmBuffer, AudioError> {
    if buffer.sample_rate == sample_rate {
        return Ok(buffer.clone());
    }
    if buffer.sample_rate == 0 || sample_rate == 0 {
        return Err(AudioError::UnsupportedFormat(format!(
            "cannot resample {} Hz to {} Hz",
            buffer.sample_rate, sample_rate
        )));
    }

    let channels = buffer.channels as usize;
    let frames = buffer.frames();
    let ratio = sample_rate as f64 / buffer.sample_rate as f64;
    let expected = (frames as f64 * ratio).round() as usize;
    if frames == 0 {
        return Ok(PcmBuffer::new(Vec::new(), buffer.channels, sample_rate));
    }

    debug!(
        "Resampling {} frames from {}Hz to {}Hz ({} channels)",
        frames, buffer.sample_rate, sample_rate, channels
    );

    let mut resampler = FastFixedIn::<f32>::new(
        ratio,
        1.0,
        PolynomialDegree::Septic,
        CHUNK_FRAMES,
        channels,
    )
    .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;

    let planar = deinterleave(&buffer.samples, channels);
    let delay = resampler.output_delay();
    let mut output: Vec<Vec<f32>> =
        vec![Vec::with_capacity(expected + delay + CHUNK_FRAMES); channels];

    let mut position = 0;
    while position + CHUNK_FRAMES <= frames {
        let chunk: Vec<&[f32]> = planar
            .iter()
            .map(|ch| &ch[position..position + CHUNK_FRAMES])
            .collect();
        let block = resampler
            .process(&chunk, None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        append(&mut output, block);
        position += CHUNK_FRAMES;
    }

    if position < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|ch| &ch[position..]).collect();
        let block = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        append(&mut output, block);
    }

    // flush what is still inside the filter
    while output[0].len() < delay + expected {
        let block = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| AudioError::ResampleFailed(e.to_string()))?;
        if block.first().map_or(true, |ch| ch.is_empty()) {
            break;
        }
        append(&mut output, block);
    }

    let samples = interleave(&output, delay, expected);
    Ok(PcmBuffer::new(samples, buffer.channels, sample_rate))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

fn append(output: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (ch, samples) in output.iter_mut().zip(block) {
        ch.extend(samples);
    }
}

/// Interleave `frames` frames starting at `offset`; short input holds its
/// last frame.
fn interleave(planar: &[Vec<f32>], offset: usize, frames: usize) -> Vec<f32> {
    let mut samples = Vec::with_capacity(frames * planar.len());
    for frame in 0..frames {
        for ch in planar {
            let sample = ch
                .get(offset + frame)
                .or_else(|| ch.last())
                .copied()
                .unwrap_or(0.0);
            samples.push(sample);
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, seconds: f32) -> PcmBuffer {
        let frames = (sample_rate as f32 * seconds) as usize;
        let samples = (0..frames)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5
            })
            .collect();
        PcmBuffer::new(samples, 1, sample_rate)
    }

    #[test]
    fn test_same_rate_is_a_copy() {
        let buffer = PcmBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 2, 44100);
        assert_eq!(resample(&buffer, 44100).unwrap(), buffer);
    }

    #[test]
    fn test_duration_is_preserved() {
        let buffer = sine(440.0, 44100, 1.5);
        let out = resample(&buffer, 48000).unwrap();
        assert_eq!(out.sample_rate, 48000);
        assert_eq!(out.channels, 1);
        assert_eq!(out.frames(), 72000);
        assert!((out.duration_secs() - buffer.duration_secs()).abs() < 1e-3);
    }

    #[test]
    fn test_constant_signal_settles_to_its_level() {
        let buffer = PcmBuffer::new(vec![0.5; 4000 * 2], 2, 8000);
        let out = resample(&buffer, 22050).unwrap();
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 2205);
        // away from the edges the filter passes DC unchanged
        let middle = &out.samples[1000..3000];
        assert!(middle.iter().all(|s| (*s - 0.5).abs() < 0.01));
    }

    #[test]
    fn test_sine_keeps_its_amplitude() {
        let buffer = sine(220.0, 16000, 1.0);
        let out = resample(&buffer, 48000).unwrap();
        let peak = out.samples[4800..43200]
            .iter()
            .fold(0.0f32, |peak, s| peak.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.02, "peak {}", peak);
    }

    #[test]
    fn test_empty_and_zero_rate() {
        let empty = PcmBuffer::new(Vec::new(), 2, 44100);
        let out = resample(&empty, 48000).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.sample_rate, 48000);

        let broken = PcmBuffer::new(vec![0.0; 4], 1, 0);
        assert!(matches!(
            resample(&broken, 48000),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }
}
