use super::{open_controller, RomSelector};
use clap::Subcommand;
use romshelf::{
    catalog::SystemFilter,
    config::GlobalConfig,
    ingest::gather,
    session::{display_name, icon},
    system::System,
};
use std::{error::Error, path::PathBuf};

#[derive(Clone, Debug, Subcommand)]
pub enum RomAction {
    /// Add files, directories or zip archives to the library
    Import {
        #[clap(required=true, num_args=1..)]
        paths: Vec<PathBuf>,
        /// Skip extension detection and file everything under this system
        #[clap(short, long)]
        system: Option<System>,
        /// Only look at the top level of directories
        #[clap(long)]
        shallow: bool,
    },
    List {
        #[clap(short, long, default_value = "all")]
        system: SystemFilter,
        #[clap(short = 'q', long, default_value = "")]
        search: String,
    },
    Info {
        rom: RomSelector,
    },
    Remove {
        #[clap(required=true, num_args=1..)]
        roms: Vec<RomSelector>,
    },
    Rename {
        rom: RomSelector,
        name: String,
    },
    /// Hand a ROM to the configured emulator and wait for it to quit
    Play {
        rom: RomSelector,
    },
}

pub fn rom_import(
    config: &GlobalConfig,
    paths: Vec<PathBuf>,
    system: Option<System>,
    shallow: bool,
) -> Result<(), Box<dyn Error>> {
    let mut controller = open_controller(config);
    let gathered = gather(&paths, config.recursive_import && !shallow);

    let report = controller.import(gathered.files, system)?;

    for rom in &report.added {
        println!(
            "{} {:>5}  {}  [{}]",
            icon(&rom.system),
            rom.id,
            rom.name,
            display_name(&rom.system)
        );
    }

    let failures: Vec<_> = gathered
        .failures
        .iter()
        .chain(report.failures.iter())
        .collect();

    for failure in &failures {
        eprintln!("Skipped {}: {}", failure.filename, failure.reason);
    }

    tracing::info!(
        "Imported {} ROMs, skipped {}, library now holds {}",
        report.added.len(),
        failures.len(),
        controller.catalog().records().len()
    );

    Ok(())
}

pub fn rom_list(
    config: &GlobalConfig,
    system: SystemFilter,
    search: String,
) -> Result<(), Box<dyn Error>> {
    let mut controller = open_controller(config);
    controller.load()?;
    controller.set_filter(system);
    controller.set_search(search);

    for rom in controller.visible() {
        let last_played = rom
            .last_played
            .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());

        println!(
            "{} {:>5}  {:<40} {:<30} {}",
            icon(&rom.system),
            rom.id,
            rom.name,
            display_name(&rom.system),
            last_played
        );
    }

    Ok(())
}

pub fn rom_info(config: &GlobalConfig, rom: RomSelector) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);
    let storage = controller.storage();
    let id = rom.resolve(storage)?;

    let Some(rom) = storage.get_rom(id)? else {
        return Err(format!("ROM {} is not in the library", id).into());
    };

    println!("Id:          {}", rom.id);
    println!("Name:        {}", rom.name);
    println!("File:        {}", rom.filename);
    println!(
        "System:      {} {}",
        icon(&rom.system),
        display_name(&rom.system)
    );
    println!("Size:        {} bytes", rom.payload.len());
    println!("SHA-1:       {}", rom.fingerprint);
    println!("Added:       {}", rom.created_at.to_rfc3339());
    if let Some(last_played) = rom.last_played {
        println!("Last played: {}", last_played.to_rfc3339());
    }
    if let Some(cover_art) = &rom.cover_art {
        println!("Cover art:   {}", cover_art);
    }

    for save_state in storage.list_save_states(rom.id)? {
        println!(
            "Slot {:>3}:    {} bytes, saved {}",
            save_state.slot,
            save_state.payload.len(),
            save_state.saved_at.to_rfc3339()
        );
    }

    Ok(())
}

pub fn rom_remove(config: &GlobalConfig, roms: Vec<RomSelector>) -> Result<(), Box<dyn Error>> {
    let mut controller = open_controller(config);

    for rom in roms {
        let id = rom.resolve(controller.storage())?;
        controller.remove(id)?;
    }

    Ok(())
}

pub fn rom_rename(
    config: &GlobalConfig,
    rom: RomSelector,
    name: String,
) -> Result<(), Box<dyn Error>> {
    let controller = open_controller(config);
    let id = rom.resolve(controller.storage())?;

    match controller.storage().rename_rom(id, &name)? {
        Some(rom) => {
            tracing::info!("ROM {} is now called \"{}\"", rom.id, rom.name);
            Ok(())
        }
        None => Err(format!("ROM {} is not in the library", id).into()),
    }
}

pub fn rom_play(config: &GlobalConfig, rom: RomSelector) -> Result<(), Box<dyn Error>> {
    let mut controller = open_controller(config);
    let id = rom.resolve(controller.storage())?;

    controller.play(id)?;

    if let Some(status) = controller.engine_mut().wait_for_exit()? {
        tracing::info!("Emulator exited with {}", status);
    }

    controller.stop();

    Ok(())
}
