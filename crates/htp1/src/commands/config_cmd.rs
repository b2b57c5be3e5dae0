//! Config command handlers. Read-only: the file is edited by hand.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&htp1_config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = htp1_config::load_config()?;
            output::print_output(htp1_config::render(&cfg)?.trim_end(), global.quiet);
            Ok(())
        }
    }
}
