//! Decoded PCM audio held in memory
//!
//! Media elements play from a shared, immutable `PcmBuffer`; the offline
//! mixdown reads and produces them too.

use std::sync::Arc;

use crate::audio::resample::resample;
use crate::error::AudioError;

/// Interleaved `f32` PCM with its format
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Interleaved audio samples
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Silent buffer of the given length
    pub fn silence(frames: usize, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        Self::new(vec![0.0; frames * channels as usize], channels, sample_rate)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at `frame` for output channel `channel`.
    ///
    /// Output channels beyond the source's wrap around, so mono feeds
    /// both sides of a stereo output.
    #[inline]
    pub fn sample(&self, frame: usize, channel: u16) -> f32 {
        let ch = (channel % self.channels) as usize;
        self.samples
            .get(frame * self.channels as usize + ch)
            .copied()
            .unwrap_or(0.0)
    }

    /// Linearly interpolated sample at a fractional frame position
    #[inline]
    pub fn sample_interpolated(&self, position: f64, channel: u16) -> f32 {
        let base = position.floor();
        let frac = (position - base) as f32;
        let i = base as usize;
        let a = self.sample(i, channel);
        if frac == 0.0 {
            return a;
        }
        let b = if i + 1 < self.frames() {
            self.sample(i + 1, channel)
        } else {
            a
        };
        a + (b - a) * frac
    }

    /// Same audio with `channels` channels; extra output channels wrap
    /// around the source's
    pub fn remapped(&self, channels: u16) -> PcmBuffer {
        let channels = channels.max(1);
        if channels == self.channels {
            return self.clone();
        }
        let frames = self.frames();
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for frame in 0..frames {
            for ch in 0..channels {
                samples.push(self.sample(frame, ch));
            }
        }
        PcmBuffer::new(samples, channels, self.sample_rate)
    }

    /// Convert to another channel count and sample rate
    pub fn converted(&self, channels: u16, sample_rate: u32) -> Result<PcmBuffer, AudioError> {
        resample(&self.remapped(channels), sample_rate)
    }

    /// Peak absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Thread-safe handle to decoded media
pub type SharedPcm = Arc<PcmBuffer>;
