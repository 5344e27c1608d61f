//! Offline Mixdown Application
//!
//! Renders voice + background to a WAV file without an audio device.
//!
//! Usage: `mixdown <voice> <background|none> <out.wav> [bg_volume] [voice_volume]`

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifest_mixer::{
    constants::NO_TRACK_ID,
    mixdown::{render_to_file, MixdownSettings},
    player::format_time,
};

fn parse_volume(arg: Option<String>, default: u8) -> Result<u8> {
    match arg {
        None => Ok(default),
        Some(text) => {
            let value: u8 = text
                .parse()
                .with_context(|| format!("invalid volume: {}", text))?;
            Ok(value.min(100))
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: mixdown <voice> <background|none> <out.wav> [bg_volume] [voice_volume]");
    }

    let voice = PathBuf::from(&args[0]);
    let background = match args[1].as_str() {
        NO_TRACK_ID => None,
        path => Some(PathBuf::from(path)),
    };
    let output = PathBuf::from(&args[2]);

    let defaults = MixdownSettings::default();
    let mut rest = args.into_iter().skip(3);
    let settings = MixdownSettings {
        background_volume: parse_volume(rest.next(), defaults.background_volume)?,
        voice_volume: parse_volume(rest.next(), defaults.voice_volume)?,
    };

    tracing::info!(
        voice = %voice.display(),
        background = ?background,
        bg_volume = settings.background_volume,
        voice_volume = settings.voice_volume,
        "Rendering mix"
    );

    let mixed = render_to_file(&voice, background.as_deref(), settings, &output)
        .with_context(|| format!("failed to render {}", output.display()))?;

    println!(
        "Wrote {} ({}, {} Hz, {} ch)",
        output.display(),
        format_time(mixed.duration_secs()),
        mixed.sample_rate,
        mixed.channels
    );
    Ok(())
}
