//! mazed - headless maze simulation runner
//!
//! Builds or loads a maze, validates it, then runs every actor until the
//! first one reaches a goal, the timeout expires or Ctrl-C is pressed.
//! Config lookup order:
//! - `--config <file>`
//! - `<user config dir>/mazewalk/config.json` if it exists
//! - built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use mazewalk::generate;
use mazewalk::{FieldGrid, GridError, MazeEditor, Scheduler, SimConfig, SimEvent};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::time;
use tracing::{debug, error, info, warn};

mod options;
mod paths;

use options::{usage, Options, OptionsError};
use paths::AppPaths;

/// Actor kinds placed on generated mazes, one per variant.
const GENERATED_KINDS: [u8; 6] = [2, 3, 4, 5, 6, 7];

// ═══════════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Grid(#[from] GridError),
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(options: &Options) -> Result<SimConfig, LoadError> {
    let path = match &options.config {
        Some(path) => Some(path.clone()),
        None => AppPaths::new()
            .map(|p| p.config_file())
            .filter(|p| p.exists()),
    };
    let mut config = match path {
        Some(path) => {
            info!("Config file: {:?}", path);
            let text = read(&path)?;
            serde_json::from_str(&text).map_err(|source| LoadError::Parse { path, source })?
        }
        None => SimConfig::default(),
    };
    config.seed = config.seed.or(Some(options.seed));
    Ok(config)
}

fn load_grid(options: &Options) -> Result<FieldGrid, LoadError> {
    if let Some(path) = &options.grid {
        let text = read(path)?;
        let values: Vec<Vec<i32>> = serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.clone(),
            source,
        })?;
        return Ok(FieldGrid::from_values(&values)?);
    }

    let mut grid = generate::carve(options.rows, options.cols, options.seed);
    generate::braid(&mut grid, options.braid, options.seed);
    generate::place_starts(&mut grid, &GENERATED_KINDS, options.seed);
    Ok(grid)
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

fn log_positions(scheduler: &Scheduler) {
    for s in scheduler.snapshots() {
        info!(
            actor = s.id,
            variant = s.variant.name(),
            row = s.row,
            column = s.column,
            direction = %s.direction.as_char(),
            speed = s.speed,
            "position"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(OptionsError::Help) => {
            usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}\n", e);
            usage();
            std::process::exit(2);
        }
    };

    let config = load_config(&options)?;
    let editor = MazeEditor::new(load_grid(&options)?)?;
    info!(
        rows = editor.grid().rows(),
        columns = editor.grid().columns(),
        "maze ready\n{}",
        editor.field()
    );

    let mut scheduler = Scheduler::new(config);
    let mut events = scheduler.subscribe();
    let actors = scheduler.start(editor.into_grid())?;
    if actors == 0 {
        warn!("No actor starts on the grid, nothing to simulate");
        scheduler.stop().await?;
        return Ok(());
    }

    let deadline = time::sleep(Duration::from_secs(options.timeout_secs));
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut report = time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SimEvent::GoalReached { id, kind, elapsed }) => {
                    info!(actor = id, kind, ?elapsed, "game over");
                    break;
                }
                Ok(SimEvent::Moved(s)) => {
                    debug!(actor = s.id, row = s.row, column = s.column, "moved");
                }
                Ok(SimEvent::RouteChanged { id }) => {
                    debug!(actor = id, route = ?scheduler.route(id), "route changed");
                }
                Ok(other) => info!(event = ?other, "event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = report.tick() => log_positions(&scheduler),
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!("Ctrl-C handler failed: {}", e);
                }
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                warn!(timeout_secs = options.timeout_secs, "No actor reached a goal before the timeout");
                break;
            }
        }
    }

    log_positions(&scheduler);
    scheduler.stop().await?;
    Ok(())
}
