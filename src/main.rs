//! BitCrunch: falling-block merge puzzle in the terminal.

mod app;
mod board;
mod catalog;
mod game;
mod highscores;
mod input;
mod resolve;
mod score;
mod session;
mod spawner;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use catalog::Special;
use clap::{Parser, ValueEnum};
use highscores::HighScoreStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Board size limits; larger boards cannot be laid out in a terminal.
const MAX_COLS: usize = 32;
const MAX_ROWS: usize = 64;

/// Options handed to the simulation core. Built once from [`Args`]; no globals.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub cols: usize,
    pub rows: usize,
    /// Scheduler ticks per second.
    pub tick_rate: f64,
    /// Sub-cell units the falling block descends per tick.
    pub fall_speed: u32,
    pub special_chance: u32,
    pub allow_specials: bool,
    pub disabled: Vec<Special>,
    pub settle_delay_ms: u64,
    pub countdown_ms: u64,
    /// `None` means unlimited.
    pub blaster_shots: Option<u32>,
    pub landing_points: bool,
    pub seed: Option<u64>,
    pub dev_keys: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cols: 4,
            rows: 12,
            tick_rate: 60.0,
            fall_speed: 2,
            special_chance: spawner::SPECIAL_CHANCE,
            allow_specials: true,
            disabled: Vec::new(),
            settle_delay_ms: 200,
            countdown_ms: 1000,
            blaster_shots: None,
            landing_points: false,
            seed: None,
            dev_keys: false,
        }
    }
}

impl GameConfig {
    fn from_args(args: &Args) -> Self {
        Self {
            cols: args.cols.clamp(1, MAX_COLS),
            rows: args.rows.clamp(2, MAX_ROWS),
            tick_rate: args.tick_rate.max(1.0),
            fall_speed: args.fall_speed,
            special_chance: args.special_chance,
            allow_specials: !args.no_specials,
            disabled: args.disable.clone(),
            settle_delay_ms: args.settle_delay_ms,
            countdown_ms: args.countdown_ms,
            blaster_shots: args.blaster_shots,
            landing_points: args.landing_points,
            seed: args.seed,
            dev_keys: args.dev_keys,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_tracing(path)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "theme not loaded, using default");
        theme::Theme::default()
    });
    let config = GameConfig::from_args(&args);
    let store = HighScoreStore::default_location();
    let mut app = App::new(args, config, theme, store);
    app.run()?;
    Ok(())
}

/// Log to a file; the terminal itself belongs to the game.
fn init_tracing(path: &std::path::Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Falling-block merge puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "bitcrunch",
    version,
    about = "Falling-block merge puzzle in the terminal. Stack equal numbers to double them.",
    long_about = "BitCrunch drops numbered blocks (1 to 256) into a narrow well.\n\n\
        A block landing on an equal number merges into double its value and scores it; \
        merges chain down the column. Two 256s vanish for 512 points. Special blocks \
        (Wild, Bug, Swap, Bomb, Magnet, Zap, Nuke, Blaster) shake things up. The game ends \
        when a new block cannot enter the top row.\n\n\
        CONTROLS:\n  Left/Right  h/l  a/d   Move\n  Down/j/s/Space         Drop (fires a Blaster)\n  \
        Enter       Start      P   Pause/resume\n  R           Restart after game over    Q / Esc  Quit\n\n\
        With --dev-keys: 1-9 pick numbers 1..256, F1-F8 pick specials for the falling block."
)]
pub struct Args {
    /// Board width in columns.
    #[arg(long, default_value = "4", value_name = "COLS")]
    pub cols: usize,

    /// Board height in rows.
    #[arg(long, default_value = "12", value_name = "ROWS")]
    pub rows: usize,

    /// Simulation ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Fall speed in sub-cell units per tick (a cell is 60 units).
    #[arg(long, default_value = "2", value_name = "UNITS")]
    pub fall_speed: u32,

    /// Percent chance that a spawn is a special block.
    #[arg(long, default_value = "10", value_name = "PERCENT")]
    pub special_chance: u32,

    /// Numbers only: never spawn special blocks.
    #[arg(long)]
    pub no_specials: bool,

    /// Disable one special kind (repeatable).
    #[arg(long, value_name = "KIND")]
    pub disable: Vec<Special>,

    /// Pause after a landing before the next block spawns.
    #[arg(long, default_value = "200", value_name = "MS")]
    pub settle_delay_ms: u64,

    /// Duration of each countdown step.
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub countdown_ms: u64,

    /// Blaster shots per game. Unlimited when not set.
    #[arg(long, value_name = "N")]
    pub blaster_shots: Option<u32>,

    /// Also score a numeric block's own value when it lands.
    #[arg(long)]
    pub landing_points: bool,

    /// RNG seed for a reproducible game.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Enable debug keys that change the falling block's kind.
    #[arg(long)]
    pub dev_keys: bool,

    /// Hide the landing preview.
    #[arg(long)]
    pub no_ghost: bool,

    /// Hide floating score labels.
    #[arg(long)]
    pub no_popups: bool,

    /// Disable the removal fade.
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Write logs here (RUST_LOG filters, default info).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_layout() {
        let args = Args::parse_from(["bitcrunch"]);
        let config = GameConfig::from_args(&args);
        let default = GameConfig::default();
        assert_eq!(config.cols, default.cols);
        assert_eq!(config.rows, default.rows);
        assert_eq!(config.fall_speed, default.fall_speed);
        assert_eq!(config.settle_delay_ms, 200);
        assert!(config.allow_specials);
        assert!(config.blaster_shots.is_none());
    }

    #[test]
    fn disable_flags_collect_kinds() {
        let args = Args::parse_from([
            "bitcrunch",
            "--disable",
            "nuke",
            "--disable",
            "blaster",
            "--cols",
            "0",
            "--seed",
            "9",
        ]);
        let config = GameConfig::from_args(&args);
        assert_eq!(config.disabled, vec![Special::Nuke, Special::Blaster]);
        assert_eq!(config.cols, 1);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn board_size_is_capped() {
        let args = Args::parse_from(["bitcrunch", "--cols", "100000", "--rows", "70000"]);
        let config = GameConfig::from_args(&args);
        assert_eq!((config.cols, config.rows), (MAX_COLS, MAX_ROWS));
    }

    #[test]
    fn palette_aliases() {
        let args = Args::parse_from(["bitcrunch", "--palette", "contrast"]);
        assert_eq!(args.palette, Palette::HighContrast);
    }
}
