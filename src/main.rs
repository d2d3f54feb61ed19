//! Puyotui: Puyo-style falling-block matching puzzle in the terminal.

mod app;
mod board;
mod game;
mod gravity;
mod group;
mod highscores;
mod input;
mod matcher;
mod special;
mod theme;
mod ui;

use anyhow::{Context, Result, bail};
use app::App;
use clap::{Parser, ValueEnum};
use game::Rules;
use special::SpecialMode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Smallest playfield that still fits a horizontal group.
const MIN_SIDE: usize = 3;
/// Largest playfield side; keeps the drawn board within terminal coordinates.
const MAX_SIDE: usize = 200;

/// Options derived from CLI that affect game behaviour (rules, pacing, special events).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub rules: Rules,
    pub seed: u64,
    pub special: SpecialChoice,
    pub special_delay: Duration,
    pub special_warning: Duration,
    pub ojama_count: usize,
    /// Time between gravity steps.
    pub tick_interval: Duration,
    pub pass_delay: Duration,
    pub animation: bool,
    pub best_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = GameConfig::from_args(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    info!(seed = config.seed, rows = config.rules.rows, cols = config.rules.cols, "starting");

    let mut app = App::new(config, theme)?;
    app.run()?;
    Ok(())
}

/// Send tracing output to a file; without one, stay silent so the terminal UI is untouched.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let (rows, cols) = (args.height as usize, args.width as usize);
        if rows < MIN_SIDE || cols < MIN_SIDE {
            bail!("playfield must be at least {MIN_SIDE}x{MIN_SIDE} (got {cols}x{rows})");
        }
        if rows > MAX_SIDE || cols > MAX_SIDE {
            bail!("playfield must be at most {MAX_SIDE}x{MAX_SIDE} (got {cols}x{rows})");
        }
        if args.match_size < 2 {
            bail!("--match-size must be at least 2");
        }
        if !args.tick_rate.is_finite() || args.tick_rate <= 0.0 {
            bail!("--tick-rate must be positive");
        }
        let tick_interval = Duration::try_from_secs_f64(1.0 / args.tick_rate)
            .with_context(|| format!("--tick-rate {} is too small", args.tick_rate))?;
        Ok(Self {
            rules: Rules {
                rows,
                cols,
                match_threshold: args.match_size,
                cell_reward: args.reward,
            },
            seed: args.seed.unwrap_or_else(rand::random),
            special: args.mode,
            special_delay: Duration::from_millis(args.special_delay_ms),
            special_warning: Duration::from_millis(800),
            ojama_count: args.ojama_count,
            tick_interval,
            pass_delay: Duration::from_millis(args.pass_delay_ms),
            animation: !args.no_animation,
            best_path: args.best_file.clone().unwrap_or_else(highscores::config_path),
        })
    }
}

/// Puyo-style matching puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "puyotui",
    version,
    about = "Puyo-style falling-block puzzle in the terminal. Connect four of a colour to clear them.",
    long_about = "Puyotui is a terminal puzzle game in the style of Puyo Puyo.\n\n\
        Groups of three coloured puyos fall into the well. Four or more of one colour \
        touching side by side vanish; everything above falls and may set off a chain. \
        Grey ojama never clear. The game ends when the spawn point is buried.\n\n\
        CONTROLS:\n  Left/Right h/l  Move     Up/k/x   Rotate     Down/j  Step down\n  \
        Enter/Space     Drop     P        Pause      R       Restart (game over)\n  Q / Esc         Quit"
)]
pub struct Args {
    /// Playfield width in columns.
    #[arg(long, default_value = "6", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS")]
    pub height: u16,

    /// Minimum connected cells of one colour that clear.
    #[arg(long, default_value = "4", value_name = "N")]
    pub match_size: usize,

    /// Points per cleared cell.
    #[arg(long, default_value = "10", value_name = "POINTS")]
    pub reward: u32,

    /// Seed for colour draws (random if not set).
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Special event: auto (1% loss, 5% ojama flood), normal, ojama, or loss.
    #[arg(short, long, default_value = "auto")]
    pub mode: SpecialChoice,

    /// Play time before the special event starts, in ms.
    #[arg(long, default_value = "7000", value_name = "MS")]
    pub special_delay_ms: u64,

    /// Ojama pieces dropped by the flood event.
    #[arg(long, default_value = "30", value_name = "N")]
    pub ojama_count: usize,

    /// Gravity steps per second.
    #[arg(long, default_value = "1.5", value_name = "RATE")]
    pub tick_rate: f64,

    /// Pause between chain passes in ms so clears are visible.
    #[arg(long, default_value = "300", value_name = "MS")]
    pub pass_delay_ms: u64,

    /// Disable the clear fade (passes resolve without pausing).
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Best score file (defaults to the XDG config dir).
    #[arg(long, value_name = "FILE")]
    pub best_file: Option<PathBuf>,

    /// Write tracing logs here (filter with RUST_LOG).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

/// Special event selection: drawn at random or forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SpecialChoice {
    #[default]
    Auto,
    Normal,
    #[value(alias = "flood")]
    Ojama,
    Loss,
}

impl SpecialChoice {
    /// Resolve to a concrete mode, rolling when `Auto`.
    pub fn resolve<R: rand::Rng>(self, rng: &mut R) -> SpecialMode {
        match self {
            Self::Auto => SpecialMode::draw(rng),
            Self::Normal => SpecialMode::Normal,
            Self::Ojama => SpecialMode::Flood,
            Self::Loss => SpecialMode::Loss,
        }
    }
}
