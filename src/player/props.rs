//! Externally owned player inputs
//!
//! The owner of the player (a page, a CLI) controls these values. Each time
//! it hands over a new set, `PlayerProps::diff` says what changed and
//! `MixSession::apply_props` reacts to each change in turn.

use crate::config::MixerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerProps {
    /// Voice media locator; a change remounts the graph
    pub audio_url: String,
    /// 0-100
    pub voice_volume: u8,
    /// 0-100, scaled by the background ceiling
    pub background_volume: u8,
    pub selected_track_id: Option<String>,
    pub background_enabled: bool,
    /// The voice already contains the baked mix
    pub finalized: bool,
}

/// One changed input
#[derive(Debug, Clone, PartialEq)]
pub enum PropChange {
    AudioUrl(String),
    Finalized(bool),
    BackgroundTrack(Option<String>),
    BackgroundEnabled(bool),
    VoiceVolume(u8),
    BackgroundVolume(u8),
}

impl PlayerProps {
    pub fn new(audio_url: impl Into<String>) -> Self {
        Self::from_config(audio_url, &MixerConfig::default())
    }

    pub fn from_config(audio_url: impl Into<String>, mixer: &MixerConfig) -> Self {
        Self {
            audio_url: audio_url.into(),
            voice_volume: mixer.voice_volume.min(100),
            background_volume: mixer.background_volume.min(100),
            selected_track_id: None,
            background_enabled: mixer.background_enabled,
            finalized: false,
        }
    }

    /// Changes from `self` to `next`, in the order they should be applied.
    /// A new audio URL supersedes everything else.
    pub fn diff(&self, next: &PlayerProps) -> Vec<PropChange> {
        if self.audio_url != next.audio_url {
            return vec![PropChange::AudioUrl(next.audio_url.clone())];
        }

        let mut changes = Vec::new();
        if self.finalized != next.finalized {
            changes.push(PropChange::Finalized(next.finalized));
        }
        if self.selected_track_id != next.selected_track_id {
            changes.push(PropChange::BackgroundTrack(next.selected_track_id.clone()));
        }
        if self.background_enabled != next.background_enabled {
            changes.push(PropChange::BackgroundEnabled(next.background_enabled));
        }
        if self.voice_volume != next.voice_volume {
            changes.push(PropChange::VoiceVolume(next.voice_volume));
        }
        if self.background_volume != next.background_volume {
            changes.push(PropChange::BackgroundVolume(next.background_volume));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_changes() {
        let props = PlayerProps::new("sample.mp3");
        assert!(props.diff(&props.clone()).is_empty());
    }

    #[test]
    fn test_changes_in_apply_order() {
        let prev = PlayerProps::new("sample.mp3");
        let mut next = prev.clone();
        next.background_volume = 80;
        next.background_enabled = false;
        next.selected_track_id = Some("ocean-waves".to_string());

        assert_eq!(
            prev.diff(&next),
            vec![
                PropChange::BackgroundTrack(Some("ocean-waves".to_string())),
                PropChange::BackgroundEnabled(false),
                PropChange::BackgroundVolume(80),
            ]
        );
    }

    #[test]
    fn test_new_url_supersedes() {
        let prev = PlayerProps::new("sample.mp3");
        let mut next = PlayerProps::new("final.wav");
        next.finalized = true;
        assert_eq!(
            prev.diff(&next),
            vec![PropChange::AudioUrl("final.wav".to_string())]
        );
    }

    #[test]
    fn test_config_volumes_are_capped() {
        let mixer = MixerConfig {
            voice_volume: 150,
            ..Default::default()
        };
        assert_eq!(PlayerProps::from_config("a.mp3", &mixer).voice_volume, 100);
    }
}
