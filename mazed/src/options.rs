//! Command-line options.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("help requested")]
    Help,
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: String, value: String },
    #[error("unknown argument {0:?}")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub rows: usize,
    pub cols: usize,
    pub seed: u64,
    /// Extra walls knocked out of the generated maze.
    pub braid: usize,
    pub grid: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rows: 15,
            cols: 21,
            seed: 1,
            braid: 10,
            grid: None,
            config: None,
            timeout_secs: 120,
        }
    }
}

pub fn usage() {
    eprintln!("mazed: run a maze simulation headless until the first actor reaches a goal\n");
    eprintln!("Usage: mazed [options]\n");
    eprintln!("Options:");
    eprintln!("  --rows <n>            Generated maze height (default 15)");
    eprintln!("  --cols <n>            Generated maze width (default 21)");
    eprintln!("  --seed <n>            Seed for maze generation and actors (default 1)");
    eprintln!("  --braid <n>           Walls removed to add loops (default 10)");
    eprintln!("  --grid <file.json>    Load a grid of cell values instead of generating one");
    eprintln!("  --config <file.json>  Simulation config (default: user config dir)");
    eprintln!("  --timeout-secs <n>    Give up after this many seconds (default 120)");
}

impl Options {
    pub fn parse<I>(args: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            match flag.as_str() {
                "-h" | "--help" => return Err(OptionsError::Help),
                "--rows" => options.rows = number(&flag, args.next())?,
                "--cols" => options.cols = number(&flag, args.next())?,
                "--seed" => options.seed = number(&flag, args.next())?,
                "--braid" => options.braid = number(&flag, args.next())?,
                "--timeout-secs" => options.timeout_secs = number(&flag, args.next())?,
                "--grid" => options.grid = Some(value(&flag, args.next())?.into()),
                "--config" => options.config = Some(value(&flag, args.next())?.into()),
                _ => return Err(OptionsError::Unknown(flag)),
            }
        }
        options.rows = options.rows.clamp(3, 501);
        options.cols = options.cols.clamp(3, 501);
        options.timeout_secs = options.timeout_secs.max(1);
        Ok(options)
    }
}

fn value(flag: &str, next: Option<String>) -> Result<String, OptionsError> {
    next.ok_or_else(|| OptionsError::MissingValue(flag.to_string()))
}

fn number<T: std::str::FromStr>(flag: &str, next: Option<String>) -> Result<T, OptionsError> {
    let raw = value(flag, next)?;
    raw.parse().map_err(|_| OptionsError::InvalidValue {
        flag: flag.to_string(),
        value: raw,
    })
}
