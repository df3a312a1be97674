//! Binary entry point: load config, wire the app, and run until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use speakwrite::app::App;
use speakwrite::config::AppConfig;
use speakwrite::events::{handler, EventName, EventPayload};
use speakwrite::stt::WhisperFactory;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = AppConfig::config_file();
    let config = AppConfig::load_from(&config_path)?;
    if !config_path.exists() {
        config
            .save_to(&config_path)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("wrote default config to {}", config_path.display());
    }
    config.validate().context("validating configuration")?;

    let factory = Arc::new(WhisperFactory::from_config(&config.model));
    if !factory.model_path().exists() {
        log::warn!(
            "model file {} not found; place a GGML model there before toggling",
            factory.model_path().display()
        );
    }

    let app = App::new(config, factory);

    // Print finished transcripts; a downstream consumer would subscribe the
    // same way.
    app.hub().subscribe(
        EventName::TranscriptionResult,
        handler(|ev| {
            if let EventPayload::Transcript { text, .. } = &ev.payload {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
        }),
    );

    // The hotkey fires on its own OS thread; bridge it into the async
    // runtime over a channel.
    let (toggle_tx, mut toggle_rx) = mpsc::channel::<()>(16);
    app.initialize(Arc::new(move || {
        let _ = toggle_tx.blocking_send(());
    }))?;

    log::info!("speakwrite running; press the hotkey to toggle transcription");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("received Ctrl-C, shutting down");
                break;
            }
            toggled = toggle_rx.recv() => {
                match toggled {
                    Some(()) => {
                        let app = Arc::clone(&app);
                        // toggle publishes synchronously to every subscriber;
                        // keep it off the async worker threads.
                        tokio::task::spawn_blocking(move || app.toggle_transcription())
                            .await
                            .ok();
                    }
                    None => break,
                }
            }
        }
    }

    let app_for_shutdown = Arc::clone(&app);
    tokio::task::spawn_blocking(move || app_for_shutdown.shutdown())
        .await
        .ok();
    Ok(())
}
