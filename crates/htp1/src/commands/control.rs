//! Action command handlers.
//!
//! Each one opens a session, queues a single action once the receiver has
//! reported its state, and disconnects. Disconnect flushes the queue, so
//! returning success means the request reached the socket.

use htp1_core::{Action, Device, DeviceConfig, MenuCommand};

use crate::cli::{GlobalOpts, MenuKey, MuteCommand, PowerCommand, VolumeCommand};
use crate::error::CliError;

pub async fn power(
    config: DeviceConfig,
    cmd: PowerCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (action, note) = match cmd {
        PowerCommand::On => (Action::TurnOn, "Power on requested"),
        PowerCommand::Off => (Action::TurnOff, "Standby requested"),
        PowerCommand::Toggle => (Action::PowerToggle, "Power toggle requested"),
    };
    send(config, action, note, global).await
}

pub async fn volume(
    config: DeviceConfig,
    cmd: VolumeCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        VolumeCommand::Set { level } => {
            send(config, Action::SetVolume(level), "Volume change requested", global).await
        }
        VolumeCommand::Up => send(config, Action::VolumeUp, "Volume up requested", global).await,
        VolumeCommand::Down => {
            send(config, Action::VolumeDown, "Volume down requested", global).await
        }
    }
}

pub async fn mute(
    config: DeviceConfig,
    cmd: MuteCommand,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (action, note) = match cmd {
        MuteCommand::On => (Action::Mute(true), "Mute requested"),
        MuteCommand::Off => (Action::Mute(false), "Unmute requested"),
        MuteCommand::Toggle => (Action::MuteToggle, "Mute toggle requested"),
    };
    send(config, action, note, global).await
}

pub async fn source(
    config: DeviceConfig,
    label: String,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    send(config, Action::SelectSource(label), "Input change requested", global).await
}

pub async fn sound_mode(
    config: DeviceConfig,
    name: String,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    send(config, Action::SelectSoundMode(name), "Sound mode change requested", global).await
}

pub async fn menu(config: DeviceConfig, key: MenuKey, global: &GlobalOpts) -> Result<(), CliError> {
    send(config, Action::Menu(menu_command(key)), "Menu key sent", global).await
}

fn menu_command(key: MenuKey) -> MenuCommand {
    match key {
        MenuKey::Up => MenuCommand::Up,
        MenuKey::Down => MenuCommand::Down,
        MenuKey::Left => MenuCommand::Left,
        MenuKey::Right => MenuCommand::Right,
        MenuKey::Enter => MenuCommand::Enter,
        MenuKey::Back => MenuCommand::Back,
        MenuKey::Home => MenuCommand::Home,
    }
}

async fn send(
    config: DeviceConfig,
    action: Action,
    note: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    tracing::debug!(action = action.name(), "sending action");
    Device::oneshot(config, |device| async move { device.execute(&action) }).await?;
    if !global.quiet {
        eprintln!("{note}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn every_menu_key_maps_to_the_same_wire_name() {
        for key in MenuKey::value_variants() {
            let name = key.to_possible_value().map(|v| v.get_name().to_owned());
            assert_eq!(name, Some(menu_command(*key).to_string()));
        }
    }
}
