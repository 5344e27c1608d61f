//! Audio graph manager
//!
//! Owns the native graph of one mix session: a single output context, a
//! voice element and a looping background element, each wired through its
//! own gain stage into the shared output.
//!
//! ```text
//!   voice element ──► voice gain ──────┐
//!                                      ├──► OutputContext ──► device
//!   background element ──► bg gain ────┘
//! ```
//!
//! A graph is built once per voice locator. Re-initializing tears the old
//! graph down first, so events from the previous voice element never reach
//! the new session.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::element::{MediaElement, TransportEvent};
use crate::audio::loader::{MediaLoader, ResamplingLoader};
use crate::audio::output::OutputContext;
use crate::audio::param::GainStage;
use crate::config::OutputConfig;
use crate::error::AudioError;

/// A media element and the gain stage it plays through
#[derive(Debug, Clone)]
pub struct GraphInput {
    pub element: MediaElement,
    pub gain: GainStage,
}

struct Mounted {
    voice_url: String,
    context: OutputContext,
    voice: GraphInput,
    background: GraphInput,
    voice_events: Receiver<TransportEvent>,
}

/// Builds and owns the graph for one session
pub struct AudioGraph {
    config: OutputConfig,
    loader: Arc<dyn MediaLoader>,
    mounted: Option<Mounted>,
}

impl AudioGraph {
    pub fn new(config: OutputConfig, loader: Arc<dyn MediaLoader>) -> Self {
        Self {
            config,
            loader,
            mounted: None,
        }
    }

    /// Build a fresh graph for `voice_url`, tearing down any previous one.
    ///
    /// The graph stays mounted even if the voice fails to load, so the
    /// caller can report the failure and still tear down normally.
    pub fn initialize(
        &mut self,
        voice_url: &str,
        voice_gain: f32,
        background_gain: f32,
    ) -> Result<(), AudioError> {
        self.teardown();

        let context = OutputContext::open(&self.config)?;

        let voice = GraphInput {
            element: MediaElement::new("voice"),
            gain: GainStage::new(voice_gain),
        };
        let background = GraphInput {
            element: MediaElement::new("background"),
            gain: GainStage::new(background_gain),
        };
        background.element.set_looping(true);

        context.connect(voice.element.clone(), voice.gain.clone())?;
        context.connect(background.element.clone(), background.gain.clone())?;
        let voice_events = voice.element.subscribe();

        debug!(
            sample_rate = context.sample_rate(),
            channels = context.channels(),
            "graph wired"
        );

        self.mounted = Some(Mounted {
            voice_url: voice_url.to_string(),
            context,
            voice,
            background,
            voice_events,
        });
        info!("Audio graph initialized for {}", voice_url);

        match &self.mounted {
            Some(mounted) => {
                let loader =
                    ResamplingLoader::new(self.loader.as_ref(), mounted.context.sample_rate());
                mounted.voice.element.load(Some(voice_url), &loader)
            }
            None => Ok(()),
        }
    }

    /// Release the output and detach every listener. Safe to call repeatedly;
    /// returns whether a graph was torn down.
    pub fn teardown(&mut self) -> bool {
        let Some(mut mounted) = self.mounted.take() else {
            return false;
        };

        for input in [&mounted.voice, &mounted.background] {
            input.element.pause();
            input.element.detach_listeners();
        }
        mounted.context.close();
        info!("Audio graph torn down for {}", mounted.voice_url);
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.mounted.is_some()
    }

    /// Rebind the background element to `url`. Rebinding pauses it;
    /// playback restarts only when `resume` is set.
    pub fn set_track_for_background(&mut self, url: &str, resume: bool) -> Result<(), AudioError> {
        let Some(mounted) = &self.mounted else {
            return Ok(());
        };
        let element = &mounted.background.element;
        if element.src().as_deref() == Some(url) && element.has_media() {
            if resume {
                element.play()?;
            }
            return Ok(());
        }

        info!("Background track -> {}", url);
        let loader = ResamplingLoader::new(self.loader.as_ref(), mounted.context.sample_rate());
        element.load(Some(url), &loader)?;
        if resume {
            element.play()?;
        }
        Ok(())
    }

    pub fn voice(&self) -> Option<&GraphInput> {
        self.mounted.as_ref().map(|m| &m.voice)
    }

    pub fn background(&self) -> Option<&GraphInput> {
        self.mounted.as_ref().map(|m| &m.background)
    }

    pub fn context(&self) -> Option<&OutputContext> {
        self.mounted.as_ref().map(|m| &m.context)
    }

    /// Events from the current voice element
    pub fn voice_events(&self) -> Option<&Receiver<TransportEvent>> {
        self.mounted.as_ref().map(|m| &m.voice_events)
    }

    pub fn voice_url(&self) -> Option<&str> {
        self.mounted.as_ref().map(|m| m.voice_url.as_str())
    }

    /// Context time, or 0 when nothing is mounted
    pub fn now(&self) -> f64 {
        self.context().map(|c| c.now()).unwrap_or(0.0)
    }

    pub fn loader(&self) -> &Arc<dyn MediaLoader> {
        &self.loader
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::PcmBuffer;
    use crate::audio::loader::MemoryLoader;
    use crate::audio::output::ContextState;

    fn graph() -> AudioGraph {
        let loader = MemoryLoader::new();
        loader.insert("sample.mp3", PcmBuffer::new(vec![0.5; 2000], 1, 1000));
        loader.insert("other.mp3", PcmBuffer::new(vec![0.5; 1000], 1, 1000));
        loader.insert("ocean-waves", PcmBuffer::new(vec![0.1; 500], 1, 1000));
        loader.insert("rain", PcmBuffer::new(vec![0.2; 500], 1, 1000));
        AudioGraph::new(OutputConfig::headless(), Arc::new(loader))
    }

    #[test]
    fn test_initialize_wires_two_inputs() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.08).unwrap();

        let context = graph.context().unwrap();
        assert_eq!(context.input_count(), 2);
        assert_eq!(context.state(), ContextState::Suspended);
        assert!(graph.background().unwrap().element.is_looping());
        assert!(!graph.background().unwrap().element.has_media());
        assert_eq!(graph.voice().unwrap().element.duration(), Some(2.0));

        let event = graph.voice_events().unwrap().try_recv().unwrap();
        assert_eq!(event, TransportEvent::LoadedMetadata { duration: 2.0 });
    }

    #[test]
    fn test_reinitialize_drops_stale_events() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.0).unwrap();
        let old_voice = graph.voice().unwrap().element.clone();

        graph.initialize("other.mp3", 1.0, 0.0).unwrap();
        assert_eq!(old_voice.listener_count(), 0);
        assert!(old_voice.is_paused());
        assert_eq!(graph.voice_url(), Some("other.mp3"));
        assert_eq!(graph.voice().unwrap().element.duration(), Some(1.0));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.0).unwrap();
        assert!(graph.teardown());
        assert!(!graph.teardown());
        assert!(!graph.is_initialized());
        assert_eq!(graph.now(), 0.0);
    }

    #[test]
    fn test_missing_voice_still_mounts() {
        let mut graph = graph();
        let err = graph.initialize("missing.mp3", 1.0, 0.0).unwrap_err();
        assert!(matches!(err, AudioError::MediaNotFound(_)));
        assert!(graph.is_initialized());
        assert!(graph.teardown());
    }

    #[test]
    fn test_rebind_without_resume_stays_paused() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.0).unwrap();

        graph.set_track_for_background("ocean-waves", false).unwrap();
        let bg = &graph.background().unwrap().element;
        assert_eq!(bg.src().as_deref(), Some("ocean-waves"));
        assert!(bg.is_paused());
    }

    #[test]
    fn test_rebind_with_resume_plays_new_track() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.0).unwrap();
        graph.set_track_for_background("ocean-waves", true).unwrap();
        graph.set_track_for_background("rain", true).unwrap();

        let bg = &graph.background().unwrap().element;
        assert_eq!(bg.src().as_deref(), Some("rain"));
        assert!(!bg.is_paused());
        assert_eq!(bg.position(), 0.0);
    }

    #[test]
    fn test_rebind_before_initialize_is_noop() {
        let mut graph = graph();
        assert!(graph.set_track_for_background("rain", true).is_ok());
    }

    #[test]
    fn test_media_plays_at_context_rate() {
        let mut graph = graph();
        graph.initialize("sample.mp3", 1.0, 0.0).unwrap();
        graph.set_track_for_background("rain", false).unwrap();

        let rate = graph.context().unwrap().sample_rate();
        let voice = graph.voice().unwrap().element.media().unwrap();
        let bg = graph.background().unwrap().element.media().unwrap();
        assert_eq!(voice.sample_rate, rate);
        assert_eq!(bg.sample_rate, rate);
        assert_eq!(bg.duration_secs(), 0.5);
    }
}
