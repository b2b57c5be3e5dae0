//! Clap derive structures for the `htp1` CLI.
//!
//! Shared with build.rs for man-page generation, so this file may only
//! depend on clap and clap_complete.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// htp1 -- control a Monoprice HTP-1 from the command line
#[derive(Debug, Parser)]
#[command(
    name = "htp1",
    version,
    about = "Control a Monoprice HTP-1 AV processor from the command line",
    long_about = "Talks to the receiver's WebSocket controller endpoint.\n\n\
        Every command connects, waits for the receiver to report its state,\n\
        does its work and disconnects. `watch` stays connected and streams\n\
        state changes until interrupted.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile from the config file
    #[arg(long, short = 'd', env = "HTP1_DEVICE", global = true)]
    pub device: Option<String>,

    /// Receiver IP address or hostname (overrides the profile)
    #[arg(long, short = 'H', env = "HTP1_HOST", global = true)]
    pub host: Option<String>,

    /// Controller port
    #[arg(long, env = "HTP1_PORT", global = true)]
    pub port: Option<u16>,

    /// Connect timeout in seconds
    #[arg(long, env = "HTP1_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HTP1_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// key=value lines (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the receiver is reachable and reports its state
    Probe,

    /// Show the receiver's current state
    #[command(alias = "st")]
    State(StateArgs),

    /// Stream state changes until interrupted
    Watch(WatchArgs),

    /// Power control
    Power(PowerArgs),

    /// Volume control
    #[command(alias = "vol")]
    Volume(VolumeArgs),

    /// Mute control
    Mute(MuteArgs),

    /// Select an input by its display label
    Source(SourceArgs),

    /// Select an upmix mode by its display name
    SoundMode(SoundModeArgs),

    /// Send an on-screen menu navigation key
    Menu(MenuArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── State ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Print a single key (e.g. volume, source_list)
    pub key: Option<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Exit after this many notifications
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Actions ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PowerArgs {
    #[command(subcommand)]
    pub command: PowerCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum PowerCommand {
    /// Turn the receiver on
    On,
    /// Put the receiver in standby
    Off,
    /// Flip the current power state
    Toggle,
}

#[derive(Debug, Args)]
pub struct VolumeArgs {
    #[command(subcommand)]
    pub command: VolumeCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum VolumeCommand {
    /// Set an absolute level between 0.0 and 1.0
    Set {
        #[arg(value_parser = parse_level, allow_negative_numbers = true)]
        level: f64,
    },
    /// One step louder
    Up,
    /// One step quieter
    Down,
}

#[derive(Debug, Args)]
pub struct MuteArgs {
    #[command(subcommand)]
    pub command: MuteCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum MuteCommand {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Input label as shown by `htp1 state source_list`
    pub label: String,
}

#[derive(Debug, Args)]
pub struct SoundModeArgs {
    /// Mode name as shown by `htp1 state sound_mode_list`
    pub name: String,
}

#[derive(Debug, Args)]
pub struct MenuArgs {
    pub key: MenuKey,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MenuKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Back,
    Home,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration (file + environment)
    Show,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

fn parse_level(raw: &str) -> Result<f64, String> {
    let level: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&level) {
        Ok(level)
    } else {
        Err(format!("level must be between 0.0 and 1.0, got {level}"))
    }
}
