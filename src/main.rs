use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use jamtune::app::cli::Args;
use jamtune::app::config::{AppConfig, FileStore, KeyValueStore};
use jamtune::app::lock::{default_lock_path, AudioLock};
use jamtune::app::{parse, AppEvent, Flow, Shell};
use jamtune::catalog::{Catalog, JamendoClient, TrackBrowser};
use jamtune::player::{MediaSink, MemorySink, PlaybackController, RodioSink};

fn init_logging(verbose: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = AppConfig::get_log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "jamtune.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jamtune=info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(false);

    // The prompt shares the terminal, so stderr logging is opt-in
    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("installing log subscriber")?;

    Ok(guard)
}

fn spawn_stdin(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(AppEvent::Input(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = tx.send(AppEvent::InputClosed);
                    break;
                }
                Err(e) => {
                    error!(error = %e, "stdin read failed");
                    let _ = tx.send(AppEvent::InputClosed);
                    break;
                }
            }
        }
    });
}

fn spawn_ticker(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tx.send(AppEvent::Tick).is_err() {
                break;
            }
        }
    });
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn run<S, C, K>(
    mut shell: Shell<S, C, K>,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
    on_tick: impl Fn(),
) -> Result<()>
where
    S: MediaSink,
    C: Catalog,
    K: KeyValueStore,
{
    if !shell.refresh_connection().await {
        println!(
            "Catalog is not configured. Set client_id in {} or JAMENDO_CLIENT_ID.",
            AppConfig::get_config_path().display()
        );
    }
    println!("jamtune ready, type `help` for commands");
    prompt();

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                AppEvent::Input(line) => {
                    if !line.trim().is_empty() {
                        match parse(&line) {
                            Ok(cmd) => match shell.execute(cmd).await {
                                Flow::Print(text) => println!("{}", text),
                                Flow::Quit => break,
                            },
                            Err(e) => println!("{}", e),
                        }
                    }
                    prompt();
                }
                AppEvent::InputClosed => break,
                AppEvent::Tick => on_tick(),
            },
            event = shell.controller_mut().next_event() => {
                if let Some(line) = shell.on_controller_event(event).await {
                    println!("\n{}", line);
                    prompt();
                }
            }
        }
    }

    shell.persist();
    shell.controller_mut().disconnect();
    info!("shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        println!("{}", AppConfig::default_config_toml());
        return Ok(());
    }

    let _log_guard = init_logging(args.verbose)?;

    let mut config = AppConfig::load();
    args.apply(&mut config);
    info!(
        mode = ?config.catalog,
        dry_run = args.dry_run,
        "jamtune v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let client = JamendoClient::new(config.jamendo_settings()).context("building catalog client")?;
    let browser = TrackBrowser::new(client, config.limit);
    let store = FileStore::open(AppConfig::get_state_path());

    let (app_tx, app_rx) = mpsc::unbounded_channel();
    spawn_stdin(app_tx.clone());

    if args.dry_run {
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let sink = MemorySink::new(sink_tx);
        let handle = sink.handle();
        let mut controller = PlaybackController::new(config.controller_options());
        controller.attach(sink, sink_rx);
        spawn_ticker(app_tx);

        let shell = Shell::new(controller, browser, store);
        return run(shell, app_rx, move || handle.advance(1.0)).await;
    }
    drop(app_tx);

    let _audio_lock = if config.audio_lock {
        match AudioLock::try_acquire(&default_lock_path()) {
            Ok(Some(lock)) => Some(lock),
            Ok(None) => anyhow::bail!("another jamtune instance is using the audio device"),
            Err(e) => {
                warn!(error = %e, "audio lock unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    let sink = RodioSink::new(sink_tx).context("opening audio output")?;
    let mut controller = PlaybackController::new(config.controller_options());
    controller.attach(sink, sink_rx);

    let shell = Shell::new(controller, browser, store);
    run(shell, app_rx, || {}).await
}
