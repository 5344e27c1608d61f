//! Offline mixdown
//!
//! Renders the same mix the backend's finalize step bakes: the voice at its
//! volume, the background attenuated, looped to the voice length, faded at
//! both ends and overlaid. Used for local previews and the `mixdown` binary.

use chrono::{DateTime, TimeZone};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::audio::buffer::PcmBuffer;
use crate::audio::decode::{decode_file, write_wav};
use crate::constants::MIXDOWN_FADE_SECS;
use crate::error::AudioError;

/// Gain treated as silence
pub const MUTE_DB: f32 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixdownSettings {
    /// 0-100
    pub voice_volume: u8,
    /// 0-100; 0 leaves the background out
    pub background_volume: u8,
}

impl Default for MixdownSettings {
    fn default() -> Self {
        Self {
            voice_volume: 100,
            background_volume: crate::constants::DEFAULT_BACKGROUND_VOLUME,
        }
    }
}

/// Volume percent to gain in dB: 100 and above is unity, 1 and below mutes
pub fn volume_to_db(percent: u8) -> f32 {
    match percent {
        p if p >= 100 => 0.0,
        p if p <= 1 => MUTE_DB,
        p => 20.0 * (p as f32 / 100.0).log10(),
    }
}

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Repeat `buffer` until it covers `frames`, then cut it there
pub fn loop_to_length(buffer: &PcmBuffer, frames: usize) -> PcmBuffer {
    let channels = buffer.channels as usize;
    let wanted = frames * channels;
    if buffer.is_empty() {
        return PcmBuffer::silence(frames, buffer.channels, buffer.sample_rate);
    }
    let samples = buffer
        .samples
        .iter()
        .copied()
        .cycle()
        .take(wanted)
        .collect();
    PcmBuffer::new(samples, buffer.channels, buffer.sample_rate)
}

/// Linear fade in and fade out, each clamped to the buffer length
pub fn apply_fades(buffer: &mut PcmBuffer, fade_secs: f64) {
    let frames = buffer.frames();
    let fade_frames = ((fade_secs * buffer.sample_rate as f64).round() as usize).min(frames);
    if fade_frames == 0 {
        return;
    }
    let channels = buffer.channels as usize;
    for frame in 0..frames {
        let mut gain = 1.0f32;
        if frame < fade_frames {
            gain *= frame as f32 / fade_frames as f32;
        }
        let remaining = frames - frame;
        if remaining <= fade_frames {
            gain *= (remaining - 1) as f32 / fade_frames as f32;
        }
        if gain < 1.0 {
            for sample in &mut buffer.samples[frame * channels..(frame + 1) * channels] {
                *sample *= gain;
            }
        }
    }
}

/// Mix `background` under `voice`. The result has the voice's format and length.
pub fn mix(voice: &PcmBuffer, background: Option<&PcmBuffer>, settings: MixdownSettings) -> PcmBuffer {
    let voice_gain = db_to_gain(volume_to_db(settings.voice_volume));
    let mut out = voice.clone();
    if voice_gain != 1.0 {
        out.samples.iter_mut().for_each(|s| *s *= voice_gain);
    }

    let background = match background {
        Some(bg) if settings.background_volume > 0 && !bg.is_empty() => bg,
        _ => {
            debug!("Mixdown without background");
            return out;
        }
    };

    let converted = match background.converted(voice.channels, voice.sample_rate) {
        Ok(converted) => converted,
        Err(e) => {
            warn!("Background skipped: {}", e);
            return out;
        }
    };
    let mut bed = loop_to_length(&converted, voice.frames());
    let bg_gain = db_to_gain(volume_to_db(settings.background_volume));
    bed.samples.iter_mut().for_each(|s| *s *= bg_gain);
    apply_fades(&mut bed, MIXDOWN_FADE_SECS);

    for (sample, bg) in out.samples.iter_mut().zip(&bed.samples) {
        *sample = (*sample + bg).clamp(-1.0, 1.0);
    }
    out
}

/// Keep alphanumerics, space, `_` and `-`; trim; spaces become `_`
pub fn sanitize_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// `<user>_final_manifestation_<YYYYmmdd_HHMMSS>.wav`
pub fn output_filename<Tz>(username: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_final_manifestation_{}.wav",
        sanitize_username(username),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Decode, mix and write a WAV. An unreadable background is left out.
pub fn render_to_file(
    voice_path: &Path,
    background_path: Option<&Path>,
    settings: MixdownSettings,
    output: &Path,
) -> Result<PcmBuffer, AudioError> {
    let voice = decode_file(voice_path)?;
    let background = match background_path {
        Some(path) if settings.background_volume > 0 => match decode_file(path) {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!("Skipping background {}: {}", path.display(), e);
                None
            }
        },
        _ => None,
    };

    let mixed = mix(&voice, background.as_ref(), settings);
    write_wav(output, &mixed)?;
    info!(
        "Wrote {:.1}s mix to {}",
        mixed.duration_secs(),
        output.display()
    );
    Ok(mixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_volume_to_db() {
        assert_eq!(volume_to_db(100), 0.0);
        assert_eq!(volume_to_db(1), MUTE_DB);
        assert_eq!(volume_to_db(0), MUTE_DB);
        assert!((volume_to_db(50) - -6.0206).abs() < 1e-3);
        assert!((db_to_gain(volume_to_db(20)) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_loop_to_length_repeats_and_trims() {
        let bg = PcmBuffer::new(vec![0.1, 0.2, 0.3], 1, 10);
        let looped = loop_to_length(&bg, 7);
        assert_eq!(looped.samples, vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);
    }

    #[test]
    fn test_fades_reach_silence_at_both_ends() {
        let mut buffer = PcmBuffer::new(vec![1.0; 100], 1, 10);
        apply_fades(&mut buffer, 2.0);

        assert_eq!(buffer.samples[0], 0.0);
        assert_eq!(buffer.samples[99], 0.0);
        assert!((buffer.samples[10] - 0.5).abs() < 1e-6);
        assert_eq!(buffer.samples[50], 1.0);
        assert!(buffer.samples[5] < buffer.samples[15]);
    }

    #[test]
    fn test_mix_without_background_scales_voice() {
        let voice = PcmBuffer::new(vec![0.5; 40], 2, 10);
        let out = mix(
            &voice,
            None,
            MixdownSettings {
                voice_volume: 50,
                background_volume: 20,
            },
        );
        assert_eq!(out.frames(), 20);
        assert!((out.samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_zero_background_volume_skips_background() {
        let voice = PcmBuffer::new(vec![0.0; 100], 1, 10);
        let bg = PcmBuffer::new(vec![1.0; 10], 1, 10);
        let out = mix(
            &voice,
            Some(&bg),
            MixdownSettings {
                voice_volume: 100,
                background_volume: 0,
            },
        );
        assert_eq!(out.peak(), 0.0);
    }

    #[test]
    fn test_background_follows_voice_format() {
        let voice = PcmBuffer::new(vec![0.0; 200], 2, 20);
        let bg = PcmBuffer::new(vec![1.0; 30], 1, 10);
        let out = mix(
            &voice,
            Some(&bg),
            MixdownSettings {
                voice_volume: 100,
                background_volume: 100,
            },
        );
        assert_eq!(out.channels, 2);
        assert_eq!(out.sample_rate, 20);
        assert_eq!(out.frames(), 100);
        // middle of the bed is past both fades
        assert!((out.samples[100] - 1.0).abs() < 0.01);
        assert!((out.samples[101] - 1.0).abs() < 0.01);
        assert_eq!(out.samples[0], 0.0);
    }

    #[test]
    fn test_overlay_clamps() {
        let voice = PcmBuffer::new(vec![0.9; 200], 1, 10);
        let bg = PcmBuffer::new(vec![0.9; 200], 1, 10);
        let out = mix(
            &voice,
            Some(&bg),
            MixdownSettings {
                voice_volume: 100,
                background_volume: 100,
            },
        );
        assert_eq!(out.peak(), 1.0);
    }

    #[test]
    fn test_output_filename() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            output_filename("  Asha K. Rao! ", &at),
            "Asha_K_Rao_final_manifestation_20260304_050607.wav"
        );
        assert_eq!(sanitize_username("dev-ops_1"), "dev-ops_1");
    }

    #[test]
    fn test_render_to_file_skips_missing_background() {
        let dir = tempfile::tempdir().unwrap();
        let voice_path = dir.path().join("voice.wav");
        write_wav(&voice_path, &PcmBuffer::new(vec![0.25; 800], 1, 8000)).unwrap();
        let out_path = dir.path().join("out.wav");

        let mixed = render_to_file(
            &voice_path,
            Some(&dir.path().join("missing.mp3")),
            MixdownSettings::default(),
            &out_path,
        )
        .unwrap();

        assert_eq!(mixed.frames(), 800);
        assert!(out_path.exists());
        let reader = hound::WavReader::open(&out_path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
    }
}
