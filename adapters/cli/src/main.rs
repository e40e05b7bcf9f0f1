#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays Merge Six headlessly.

mod autoplay;
mod cli;
mod file_store;

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, CommonArgs};
use file_store::FileStore;
use merge_six_session::{GameSession, SessionConfig};
use merge_six_system_lifecycle::Phase;
use merge_six_system_persistence::{PersistenceManager, SystemClock};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_millis(100);
const MAX_IDLE_FRAMES: u32 = 200;

/// Entry point for the Merge Six command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Play {
            common,
            seed,
            columns,
            rows,
            turns,
            fresh,
            quiet,
        } => {
            let mut config = load_config(common.config.as_deref())?;
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(columns) = columns {
                config.columns = columns;
            }
            if let Some(rows) = rows {
                config.rows = rows;
            }
            config.auto_complete_visuals = true;
            play(&config, &common, turns, fresh, quiet)
        }
        Command::Inspect { common } => inspect(&common),
        Command::Reset { common } => reset(&common),
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn play(
    config: &SessionConfig,
    common: &CommonArgs,
    turns: u32,
    fresh: bool,
    quiet: bool,
) -> Result<()> {
    let mut store = FileStore::open(&common.save_dir)?;
    if fresh {
        clear(config, &mut store)?;
    }

    let mut session = GameSession::new(config, Box::new(store), Box::new(SystemClock))
        .with_stats(Box::new(autoplay::LoggedStats));
    let resumed = session.start();
    info!(resumed, seed = config.seed, "session started");

    let layout = config.layout();
    let mut helpers = autoplay::LoggedHelpers;
    let mut drops = 0;
    let mut idle = 0;
    while drops < turns && idle < MAX_IDLE_FRAMES {
        let chosen = match session.phase() {
            Phase::Playing => autoplay::best_move(&session.board_view()),
            Phase::Evaluating | Phase::Ending(_) => None,
        };
        let Some(chosen) = chosen else {
            idle += 1;
            session.tick(FRAME);
            continue;
        };

        idle = 0;
        drops += 1;
        let merged = autoplay::perform(&mut session, &layout, chosen, &mut helpers);
        if !quiet {
            let status = session.status();
            println!(
                "drop {drops}: {} -> {} ({}) | score {} | moves {} | combo {}",
                chosen.source.display_value(),
                chosen.destination.display_value(),
                if merged { "merged" } else { "rejected" },
                status.score,
                status.moves,
                session.combo()
            );
            print!("{}", autoplay::render(&session.board_view()));
        }
        session.tick(FRAME);
    }
    if idle >= MAX_IDLE_FRAMES {
        warn!("no playable drop appeared, stopping");
    }

    session.on_platform_hidden();
    let status = session.status();
    println!(
        "level {} board {} | score {} (best {}) | wild meter {:.2}",
        status.level,
        status.board_number,
        status.score,
        status.best_score,
        session.wild_meter()
    );
    Ok(())
}

fn clear(config: &SessionConfig, store: &mut FileStore) -> Result<()> {
    PersistenceManager::new(config.persistence())
        .clear(store)
        .context("clearing stored session")
}

fn inspect(common: &CommonArgs) -> Result<()> {
    let config = load_config(common.config.as_deref())?;
    let store = FileStore::open(&common.save_dir)?;
    let manager = PersistenceManager::new(config.persistence());
    match manager.peek(&store).context("reading stored session")? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("no stored session in {}", common.save_dir.display()),
    }
    Ok(())
}

fn reset(common: &CommonArgs) -> Result<()> {
    let config = load_config(common.config.as_deref())?;
    let mut store = FileStore::open(&common.save_dir)?;
    clear(&config, &mut store)?;
    println!("stored session removed");
    Ok(())
}
