//! Headless viewer binary.
//!
//! Usage:
//!   cargo run -p stage_viewer -- [--model <dir>] [--width 800] [--height 600]
//!                                [--tick-hz 60] [--config stage.json]
//!
//! Console commands:
//!   load <dir>        - Load the model found in a folder
//!   unload            - Release the active model
//!   resize <w> <h>    - Change the surface size
//!   status            - Show lifecycle status
//!   quit              - Exit viewer

use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use stage_core::config::StageConfig;
use stage_viewer::Viewer;
use tokio::sync::mpsc;
use tracing::{info, warn};

struct Args {
    cfg: StageConfig,
    model: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();

    // Config file first so flags override it regardless of order.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => {
            let path = &args[i + 1];
            let text = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
            StageConfig::from_json_str(&text).with_context(|| format!("parse {path}"))?
        }
        _ => StageConfig::default(),
    };

    let mut model = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--model" if i + 1 < args.len() => {
                model = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--width" if i + 1 < args.len() => {
                cfg.surface_width = args[i + 1].parse().context("--width")?;
                i += 2;
            }
            "--height" if i + 1 < args.len() => {
                cfg.surface_height = args[i + 1].parse().context("--height")?;
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().context("--tick-hz")?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(Args { cfg, model })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, model } = parse_args()?;
    info!(
        width = cfg.surface_width,
        height = cfg.surface_height,
        tick_hz = cfg.tick_hz,
        "Starting viewer"
    );

    let tick_interval = Duration::from_secs_f32(1.0 / cfg.tick_hz.max(1) as f32);
    let mut viewer = Viewer::new(cfg);

    if let Some(dir) = model {
        if let Err(e) = viewer.load_folder(&dir).await {
            warn!(dir = %dir.display(), error = %format!("{e:#}"), "Initial model load failed");
        }
    }

    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Viewer running. Type 'status' for info, 'quit' to exit.");
    println!();

    let mut last = Instant::now();
    loop {
        while let Ok(line) = console_rx.try_recv() {
            match viewer.exec_console(&line).await {
                Ok(output) => {
                    for line in output {
                        println!("{}", line);
                    }
                }
                Err(e) => {
                    println!("Error: {}", e);
                }
            }
        }

        if viewer.should_quit() {
            break;
        }

        let now = Instant::now();
        viewer.tick(now.duration_since(last).as_secs_f32());
        last = now;

        tokio::time::sleep(tick_interval).await;
    }

    info!(frames = viewer.frames(), "Viewer stopped");
    Ok(())
}
