//! Output context
//!
//! The shared output of the graph. Connected elements are pulled block by
//! block, each scaled by its gain stage, summed and clamped. The context
//! owns the audio clock: time only advances while it is `Running`.
//!
//! With the `Device` backend a cpal output stream drives rendering from a
//! dedicated thread. With `Headless` nothing drives it; callers render
//! blocks themselves, which keeps timing deterministic.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::clock::AudioClock;
use crate::audio::device::{get_default_output_device, get_output_device};
use crate::audio::element::MediaElement;
use crate::audio::param::GainStage;
use crate::config::{OutputBackend, OutputConfig};
use crate::error::AudioError;

/// Lifecycle of an output context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    Suspended = 0,
    Running = 1,
    Closed = 2,
}

impl ContextState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ContextState::Suspended,
            1 => ContextState::Running,
            _ => ContextState::Closed,
        }
    }
}

struct Input {
    element: MediaElement,
    gain: GainStage,
}

struct MixInputs {
    inputs: Vec<Input>,
    gains: Vec<f32>,
}

/// State shared between the control side and the render thread
struct Mixer {
    state: AtomicU8,
    clock: AudioClock,
    channels: u16,
    inputs: Mutex<MixInputs>,
}

impl Mixer {
    fn state(&self) -> ContextState {
        ContextState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        if self.state() != ContextState::Running {
            return;
        }

        let channels = self.channels.max(1) as usize;
        let frames = out.len() / channels;
        let start = self.clock.now();
        let frame_duration = self.clock.frame_duration();
        let sample_rate = self.clock.sample_rate();

        let mut mix = self.inputs.lock();
        let MixInputs { inputs, gains } = &mut *mix;
        gains.resize(frames, 0.0);
        for input in inputs.iter() {
            input.gain.fill_block(start, frame_duration, gains);
            input
                .element
                .render_add(out, gains, self.channels, sample_rate);
        }
        drop(mix);

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        self.clock.advance(frames as u64);
    }
}

/// The graph's output destination and clock
pub struct OutputContext {
    mixer: Arc<Mixer>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl OutputContext {
    /// A context nothing drives; render with [`OutputContext::render`]
    pub fn headless(sample_rate: u32, channels: u16) -> Self {
        Self {
            mixer: Arc::new(Mixer {
                state: AtomicU8::new(ContextState::Suspended as u8),
                clock: AudioClock::new(sample_rate),
                channels: channels.max(1),
                inputs: Mutex::new(MixInputs {
                    inputs: Vec::new(),
                    gains: Vec::new(),
                }),
            }),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Open a context for the configured backend. It starts suspended.
    pub fn open(config: &OutputConfig) -> Result<Self, AudioError> {
        match config.backend {
            OutputBackend::Headless => Ok(Self::headless(config.sample_rate, config.channels)),
            OutputBackend::Device => Self::open_device(config),
        }
    }

    fn open_device(config: &OutputConfig) -> Result<Self, AudioError> {
        let device = match &config.device_id {
            Some(id) => get_output_device(id)?,
            None => get_default_output_device()?,
        };
        let default_config = device.default_config()?;
        let sample_format = require_supported(default_config.sample_format())?;
        let stream_config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut context = Self::headless(stream_config.sample_rate.0, stream_config.channels);
        let mixer = context.mixer.clone();
        let running = context.running.clone();
        let device_name = device.name.clone();
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let stream = build_stream(&cpal_device, &stream_config, sample_format, mixer);

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::CpalError(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive while running
                while running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        context.thread_handle = Some(handle);

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!(
                    "Output stream on '{}' at {} Hz, {} channels, {:?}",
                    device_name,
                    context.sample_rate(),
                    context.channels(),
                    sample_format
                );
                Ok(context)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::StreamError(
                "Output thread exited before starting".to_string(),
            )),
        }
    }

    pub fn state(&self) -> ContextState {
        self.mixer.state()
    }

    /// Start the clock. Fails once closed.
    pub fn resume(&self) -> Result<(), AudioError> {
        self.mixer
            .state
            .compare_exchange(
                ContextState::Suspended as u8,
                ContextState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .or_else(|current| match ContextState::from_u8(current) {
                ContextState::Closed => Err(AudioError::ContextClosed),
                _ => Ok(()),
            })
    }

    /// Halt the clock and render silence
    pub fn suspend(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Closed => Err(AudioError::ContextClosed),
            _ => {
                self.mixer
                    .state
                    .store(ContextState::Suspended as u8, Ordering::Release);
                Ok(())
            }
        }
    }

    /// Release the output. Idempotent.
    pub fn close(&mut self) {
        self.mixer
            .state
            .store(ContextState::Closed as u8, Ordering::Release);
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.mixer.inputs.lock().inputs.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ContextState::Closed
    }

    /// Route `element` through `gain` into the output
    pub fn connect(&self, element: MediaElement, gain: GainStage) -> Result<(), AudioError> {
        if self.is_closed() {
            return Err(AudioError::ContextClosed);
        }
        self.mixer.inputs.lock().inputs.push(Input { element, gain });
        Ok(())
    }

    pub fn input_count(&self) -> usize {
        self.mixer.inputs.lock().inputs.len()
    }

    /// Render interleaved samples into `out`
    pub fn render(&self, out: &mut [f32]) {
        self.mixer.render(out);
    }

    /// Render `frames` frames and return them
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * self.channels() as usize];
        self.render(&mut out);
        out
    }

    /// Render `seconds` of audio in blocks of `block` frames
    pub fn advance(&self, seconds: f64, block: usize) {
        let total = (seconds * self.sample_rate() as f64).round() as usize;
        let block = block.max(1);
        let mut out = vec![0.0; block * self.channels() as usize];
        let mut done = 0;
        while done < total {
            let frames = block.min(total - done);
            self.render(&mut out[..frames * self.channels() as usize]);
            done += frames;
        }
    }

    pub fn clock(&self) -> AudioClock {
        self.mixer.clock.clone()
    }

    /// Context time in seconds
    pub fn now(&self) -> f64 {
        self.mixer.clock.now()
    }

    pub fn sample_rate(&self) -> u32 {
        self.mixer.clock.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.mixer.channels
    }

    /// Whether a device stream drives this context
    pub fn is_driven(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for OutputContext {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sample formats the output stream can be built for
fn require_supported(format: SampleFormat) -> Result<SampleFormat, AudioError> {
    match format {
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16 => Ok(format),
        other => Err(AudioError::UnsupportedFormat(format!(
            "output sample format {:?}",
            other
        ))),
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: SampleFormat,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, AudioError> {
    let stream = match format {
        SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.render(data),
            stream_error,
            None,
        ),
        SampleFormat::I16 => build_converting_stream::<i16>(device, config, mixer),
        SampleFormat::U16 => build_converting_stream::<u16>(device, config, mixer),
        other => {
            return Err(AudioError::UnsupportedFormat(format!(
                "output sample format {:?}",
                other
            )))
        }
    };
    stream.map_err(|e| AudioError::CpalError(e.to_string()))
}

fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            render_converted(&mixer, &mut scratch, data);
        },
        stream_error,
        None,
    )
}

/// Render through an f32 scratch block into the device's sample type.
/// The scratch only grows, so steady-state callbacks do not allocate.
fn render_converted<T>(mixer: &Mixer, scratch: &mut Vec<f32>, out: &mut [T])
where
    T: SizedSample + FromSample<f32>,
{
    scratch.resize(out.len(), 0.0);
    mixer.render(scratch);
    for (dst, src) in out.iter_mut().zip(scratch.iter()) {
        *dst = src.to_sample::<T>();
    }
}

fn stream_error(err: cpal::StreamError) {
    tracing::error!("Output stream error: {}", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::PcmBuffer;
    use crate::audio::loader::MemoryLoader;

    fn element(loader: &MemoryLoader, name: &'static str, value: f32) -> MediaElement {
        loader.insert(name, PcmBuffer::new(vec![value; 4000], 1, 1000));
        let element = MediaElement::new(name);
        element.load(Some(name), loader).unwrap();
        element.play().unwrap();
        element
    }

    #[test]
    fn test_starts_suspended_and_silent() {
        let loader = MemoryLoader::new();
        let context = OutputContext::headless(1000, 1);
        context
            .connect(element(&loader, "voice", 0.5), GainStage::new(1.0))
            .unwrap();

        let out = context.render_frames(100);
        assert_eq!(context.state(), ContextState::Suspended);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(context.now(), 0.0);
    }

    #[test]
    fn test_mixes_inputs_with_gain() {
        let loader = MemoryLoader::new();
        let context = OutputContext::headless(1000, 1);
        context
            .connect(element(&loader, "voice", 0.5), GainStage::new(1.0))
            .unwrap();
        context
            .connect(element(&loader, "background", 0.5), GainStage::new(0.4))
            .unwrap();
        context.resume().unwrap();

        let out = context.render_frames(100);
        assert!(out.iter().all(|s| (*s - 0.7).abs() < 1e-6));
        assert!((context.now() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_output_is_clamped() {
        let loader = MemoryLoader::new();
        let context = OutputContext::headless(1000, 1);
        context
            .connect(element(&loader, "a", 0.9), GainStage::new(1.0))
            .unwrap();
        context
            .connect(element(&loader, "b", 0.9), GainStage::new(1.0))
            .unwrap();
        context.resume().unwrap();

        let out = context.render_frames(10);
        assert!(out.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_gain_ramp_is_sample_accurate() {
        let loader = MemoryLoader::new();
        let context = OutputContext::headless(1000, 1);
        let gain = GainStage::new(0.0);
        gain.ramp_to(1.0, 0.0, 1.0);
        context
            .connect(element(&loader, "voice", 1.0), gain)
            .unwrap();
        context.resume().unwrap();

        let out = context.render_frames(1000);
        assert!((out[500] - 0.5).abs() < 1e-3);
        assert!(out[999] > 0.99);
    }

    #[test]
    fn test_closed_context() {
        let loader = MemoryLoader::new();
        let mut context = OutputContext::headless(1000, 2);
        context
            .connect(element(&loader, "voice", 0.5), GainStage::new(1.0))
            .unwrap();
        context.close();
        context.close();

        assert!(context.is_closed());
        assert_eq!(context.input_count(), 0);
        assert!(matches!(context.resume(), Err(AudioError::ContextClosed)));
        assert!(context
            .connect(MediaElement::new("late"), GainStage::new(1.0))
            .is_err());
    }

    #[test]
    fn test_advance_moves_clock() {
        let context = OutputContext::headless(48000, 2);
        context.resume().unwrap();
        context.advance(0.5, 512);
        assert!((context.now() - 0.5).abs() < 1e-9);

        context.suspend().unwrap();
        context.advance(0.5, 512);
        assert!((context.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_integer_output_formats() {
        let loader = MemoryLoader::new();
        let context = OutputContext::headless(1000, 1);
        context
            .connect(element(&loader, "voice", 0.5), GainStage::new(1.0))
            .unwrap();
        context.resume().unwrap();

        let mut scratch = Vec::new();
        let mut signed = [0i16; 64];
        render_converted(&context.mixer, &mut scratch, &mut signed);
        assert!(signed.iter().all(|s| (*s as i32 - 16384).abs() <= 1));

        let mut unsigned = [0u16; 64];
        render_converted(&context.mixer, &mut scratch, &mut unsigned);
        assert!(unsigned.iter().all(|s| (*s as i32 - 49152).abs() <= 1));
        assert!((context.now() - 0.128).abs() < 1e-9);
    }

    #[test]
    fn test_sample_format_support() {
        assert!(require_supported(SampleFormat::F32).is_ok());
        assert!(require_supported(SampleFormat::I16).is_ok());
        assert!(require_supported(SampleFormat::U16).is_ok());
        assert!(matches!(
            require_supported(SampleFormat::F64),
            Err(AudioError::UnsupportedFormat(_))
        ));
    }
}
