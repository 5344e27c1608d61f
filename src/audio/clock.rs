//! Audio clock
//!
//! Time of an output context in seconds, derived from the number of frames
//! it has rendered. It stands still while the context is suspended, which is
//! what gain automation and fade timers are scheduled against.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cloneable handle to a context's frame counter
#[derive(Debug, Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Current time in seconds
    pub fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of one frame in seconds
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Advance by `frames` rendered frames
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_by_frames() {
        let clock = AudioClock::new(48000);
        assert_eq!(clock.now(), 0.0);

        let handle = clock.clone();
        handle.advance(24000);
        assert!((clock.now() - 0.5).abs() < 1e-12);
        assert_eq!(clock.frames(), 24000);
    }
}
