//! # fretnote-listen
//!
//! Headless driver for the note detector. Listens on the default microphone,
//! ticks the engine at roughly 60 Hz and writes every newly recognised note to
//! stdout as one JSON line. It plays the part of an exercise that accepts
//! whatever note it hears: each accepted note starts the engine's cooldown so
//! the ringing string is not reported twice.
//!
//! Usage: `fretnote-listen [config.json]`. Press Enter to quit.
//! `RUST_LOG=debug` shows lifecycle transitions, `trace` every tick.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{select, Receiver};
use fretnote_core::{audio::MicrophoneSource, DetectorConfig, NoteEngine, NoteEvent};
use log::{error, info};

/// Display-synchronised tick interval.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run() {
        error!("[LISTEN] {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => DetectorConfig::load(&path)
            .with_context(|| format!("loading detector config from {}", path))?,
        None => DetectorConfig::default(),
    };

    let mut engine = NoteEngine::new(config)?;
    let session = engine.start(Box::new(MicrophoneSource::new()))?;
    info!(
        "[LISTEN] Listening at {} Hz ({} samples per window). Press Enter to stop.",
        session.sample_rate, session.buffer_size
    );

    let shutdown = spawn_stdin_watcher();
    let ticker = crossbeam_channel::tick(TICK_INTERVAL);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    loop {
        select! {
            recv(ticker) -> _ => {
                if let Some(output) = engine.tick() {
                    if let Some(note) = output.note {
                        report(&mut out, &note, output.volume_level)?;
                        engine.trigger_cooldown();
                    }
                }
            },
            recv(shutdown) -> _ => {
                info!("[LISTEN] Received shutdown signal");
                break;
            },
        }
    }

    engine.stop();
    Ok(())
}

/// Writes one accepted note as a JSON line.
fn report(out: &mut impl Write, note: &NoteEvent, volume_level: f32) -> Result<()> {
    info!(
        "[LISTEN] Heard {} ({:.1} Hz, {:+} cents, volume {:.0})",
        note.display_name, note.frequency_hz, note.cents, volume_level
    );
    serde_json::to_writer(&mut *out, note)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Fires once when stdin yields a line or closes.
fn spawn_stdin_watcher() -> Receiver<()> {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = shutdown_tx.send(());
    });
    shutdown_rx
}
