//! Mix Player Application
//!
//! Plays a voice file over a looping background track from the backend
//! catalog.
//!
//! Usage: `player <voice file> [track id]`

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifest_mixer::{
    audio::{list_output_devices, MemoryLoader, TransportEvent},
    config::{AppConfig, OutputBackend},
    network::ApiClient,
    player::{format_time, MixSession, Notifier, PlayerProps, PlayerShell},
    tracks::TrackCatalog,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Manifest Mixer player");

    let mut args = std::env::args().skip(1);
    let Some(voice) = args.next() else {
        bail!("usage: player <voice file> [track id]");
    };
    let track_id = args.next();

    let config = AppConfig::load().context("failed to load configuration")?;

    if config.output.backend == OutputBackend::Device {
        println!("\n=== Output Devices ===");
        for device in list_output_devices() {
            let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
            println!("  {}{}", device.name, default_marker);
            println!("    ID: {}", device.id);
            println!("    Sample rates: {:?}", device.sample_rates);
            println!("    Channels: {:?}", device.channels);
        }
        println!();
    }

    // Catalog and the selected track's audio
    let client = ApiClient::new(&config.api)?;
    let catalog = Arc::new(TrackCatalog::new());
    match client.background_tracks().await {
        Ok(tracks) => {
            tracing::info!("Loaded {} background tracks", tracks.len());
            catalog.replace_all(tracks);
        }
        Err(e) => tracing::warn!("Background tracks unavailable: {}", e),
    }

    let loader = Arc::new(MemoryLoader::with_file_fallback());
    let selection = catalog
        .initial_selection(track_id.as_deref())
        .unwrap_or_else(|| config.mixer.default_track_id.clone());

    let (notifier, notifications) = Notifier::channel();
    let session = MixSession::new(config.output.clone(), loader.clone(), catalog.clone(), notifier);
    let mut shell = PlayerShell::new(session, config.downloads.resolve_dir())
        .with_media_cache(loader);

    if let Some(track) = catalog.get(&selection) {
        if let Err(e) = shell.cache_track(&client, &track).await {
            tracing::warn!("Could not fetch {}: {}", track.display_name, e);
        }
    }

    let mut props = PlayerProps::from_config(&voice, &config.mixer);
    props.selected_track_id = Some(selection);
    shell.session_mut().mount(props);
    if !shell.session().is_mounted() {
        bail!("could not open audio output");
    }

    let duration = shell.session().progress().duration;
    tracing::info!("Playing {} ({})", voice, format_time(duration));
    shell.toggle_play();

    let tick = Duration::from_millis(config.output.tick_interval_ms.max(1));
    let mut interval = tokio::time::interval(tick);
    let mut last_second = u64::MAX;

    tracing::info!("Press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        let events = shell.session_mut().drive(tick.as_secs_f64());
        for note in notifications.try_iter() {
            println!("[{:?}] {}", note.level, note.message);
        }

        let view = shell.view();
        let second = shell.session().progress().position as u64;
        if second != last_second {
            last_second = second;
            println!(
                "  {} / {}  ({:.0}%)",
                view.current_time, view.duration, view.progress_percent
            );
        }

        if events.iter().any(|e| matches!(e, TransportEvent::Ended)) {
            tracing::info!("Playback finished");
            // let the background fade out
            let fade = Duration::from_secs_f64(manifest_mixer::constants::FADE_OUT_SECS);
            let deadline = tokio::time::Instant::now() + fade;
            while tokio::time::Instant::now() < deadline {
                interval.tick().await;
                shell.session_mut().drive(tick.as_secs_f64());
            }
            break;
        }
    }

    shell.session_mut().unmount();
    Ok(())
}
