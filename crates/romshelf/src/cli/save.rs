use super::{open_controller, RomSelector};
use clap::Subcommand;
use romshelf::{config::GlobalConfig, storage::SaveStateId};
use std::{error::Error, fs, path::PathBuf};

#[derive(Clone, Debug, Subcommand)]
pub enum SaveAction {
    List {
        rom: RomSelector,
    },
    Remove {
        #[clap(required=true, num_args=1..)]
        ids: Vec<SaveStateId>,
    },
    /// Write the state stored in a slot out to a file
    Export {
        rom: RomSelector,
        slot: u8,
        output: PathBuf,
    },
    /// Store a state file into a slot, replacing what was there
    Import {
        rom: RomSelector,
        slot: u8,
        path: PathBuf,
        #[clap(short, long)]
        screenshot: Option<PathBuf>,
    },
}

pub fn save_list(config: &GlobalConfig, rom: RomSelector) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);
    let storage = controller.storage();
    let rom_id = rom.resolve(storage)?;

    for save_state in storage.list_save_states(rom_id)? {
        println!(
            "{:>5}  slot {:>3}  {:>10} bytes  {}{}",
            save_state.id,
            save_state.slot,
            save_state.payload.len(),
            save_state.saved_at.format("%Y-%m-%d %H:%M:%S"),
            if save_state.screenshot.is_some() {
                "  (screenshot)"
            } else {
                ""
            }
        );
    }

    Ok(())
}

pub fn save_remove(config: &GlobalConfig, ids: Vec<SaveStateId>) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);

    for id in ids {
        if controller.storage().delete_save_state(id)? {
            tracing::info!("Deleted save state {}", id);
        } else {
            tracing::warn!("There is no save state {}", id);
        }
    }

    Ok(())
}

pub fn save_export(
    config: &GlobalConfig,
    rom: RomSelector,
    slot: u8,
    output: PathBuf,
) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);
    let storage = controller.storage();
    let rom_id = rom.resolve(storage)?;

    let Some(save_state) = storage.get_save_state(rom_id, slot)? else {
        return Err(format!("ROM {} has nothing saved in slot {}", rom_id, slot).into());
    };

    fs::write(&output, &save_state.payload)?;
    tracing::info!(
        "Exported slot {} of ROM {} to {}",
        slot,
        rom_id,
        output.display()
    );

    Ok(())
}

pub fn save_import(
    config: &GlobalConfig,
    rom: RomSelector,
    slot: u8,
    path: PathBuf,
    screenshot: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);
    let storage = controller.storage();
    let rom_id = rom.resolve(storage)?;

    if storage.get_rom(rom_id)?.is_none() {
        return Err(format!("ROM {} is not in the library", rom_id).into());
    }

    let payload = fs::read(&path)?;
    let screenshot = screenshot.map(fs::read).transpose()?;
    let save_state = storage.upsert_save_state(rom_id, slot, payload, screenshot)?;

    tracing::info!(
        "Stored {} as save state {} in slot {} of ROM {}",
        path.display(),
        save_state.id,
        slot,
        rom_id
    );

    Ok(())
}
