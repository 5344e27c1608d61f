//! Mix player
//!
//! `MixSession` is the playback synchronizer and reactivity layer on top of
//! the audio graph; `PlayerShell` is the thin control surface in front of
//! it.

pub mod fade;
pub mod notify;
pub mod props;
pub mod session;
pub mod shell;

pub use notify::{Level, Notification, Notifier};
pub use props::{PlayerProps, PropChange};
pub use session::{MixSession, PlaybackState, Progress};
pub use shell::{format_time, PlayerShell, ShellView};

/// Player controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    PlayPause,
    Seek,
    Speed,
    DownloadText,
    DownloadAudio,
    VoiceVolume,
    BackgroundToggle,
    TrackPicker,
    Upload,
    BackgroundVolume,
}

impl Control {
    pub const ALL: [Control; 10] = [
        Control::PlayPause,
        Control::Seek,
        Control::Speed,
        Control::DownloadText,
        Control::DownloadAudio,
        Control::VoiceVolume,
        Control::BackgroundToggle,
        Control::TrackPicker,
        Control::Upload,
        Control::BackgroundVolume,
    ];

    /// Mixing controls go inert once the audio is finalized
    pub fn is_mixing(&self) -> bool {
        matches!(
            self,
            Control::VoiceVolume
                | Control::BackgroundToggle
                | Control::TrackPicker
                | Control::Upload
                | Control::BackgroundVolume
        )
    }
}
