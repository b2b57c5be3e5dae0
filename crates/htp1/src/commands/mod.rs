//! Command dispatch: bridges CLI args -> device actions -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod state;

use htp1_core::DeviceConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a receiver-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: DeviceConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Probe => state::probe(config, global).await,
        Command::State(args) => state::show(config, args, global).await,
        Command::Watch(args) => state::watch(config, args, global).await,
        Command::Power(args) => control::power(config, args.command, global).await,
        Command::Volume(args) => control::volume(config, args.command, global).await,
        Command::Mute(args) => control::mute(config, args.command, global).await,
        Command::Source(args) => control::source(config, args.label, global).await,
        Command::SoundMode(args) => control::sound_mode(config, args.name, global).await,
        Command::Menu(args) => control::menu(config, args.key, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
