use clap::{Parser, Subcommand};
use itertools::Itertools;
use romshelf::{
    config::GlobalConfig,
    engine::ProgramEngine,
    session::SessionController,
    storage::{RomId, StorageManager},
    system::System,
};
use rom::{rom_import, rom_info, rom_list, rom_play, rom_remove, rom_rename, RomAction};
use save::{save_export, save_import, save_list, save_remove, SaveAction};
use std::{error::Error, num::ParseIntError, path::Path, str::FromStr};
use strum::IntoEnumIterator;

pub mod rom;
pub mod save;

#[derive(Debug, Parser)]
pub struct Cli {
    /// Configuration file to use instead of the default one
    #[clap(long, global = true)]
    pub config: Option<std::path::PathBuf>,
    #[clap(subcommand)]
    pub action: CliAction,
}

#[derive(Clone, Debug, Subcommand)]
pub enum CliAction {
    #[command(about = Some("Commands relating to the ROM library"))]
    Rom {
        #[clap(subcommand)]
        action: RomAction,
    },
    #[command(about = Some("Commands relating to save states"))]
    Save {
        #[clap(subcommand)]
        action: SaveAction,
    },
    #[command(about = Some("Commands relating to the configuration file"))]
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
    #[command(about = Some("List the supported systems"))]
    Systems,
    #[command(about = Some("Show how much is stored in the library"))]
    Stats,
}

#[derive(Clone, Debug, Subcommand)]
pub enum ConfigAction {
    /// Write the default configuration
    Init {
        #[clap(short, long)]
        force: bool,
    },
    Show,
}

/// A ROM named on the command line
///
/// `#7` or `id:7` always means an id and `name:1942` always means a name. A bare
/// number is tried as an id first and as a name when no ROM has that id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomSelector {
    Id(RomId),
    Name(String),
    IdOrName(RomId, String),
}

impl FromStr for RomSelector {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix('#').or_else(|| s.strip_prefix("id:")) {
            return Ok(RomSelector::Id(RomId::from_str(id)?));
        }

        if let Some(name) = s.strip_prefix("name:") {
            return Ok(RomSelector::Name(name.to_string()));
        }

        match RomId::from_str(s) {
            Ok(id) => Ok(RomSelector::IdOrName(id, s.to_string())),
            Err(_) => Ok(RomSelector::Name(s.to_string())),
        }
    }
}

impl RomSelector {
    pub fn resolve(&self, storage: &StorageManager) -> Result<RomId, Box<dyn Error>> {
        match self {
            RomSelector::Id(id) => Ok(*id),
            RomSelector::Name(name) => resolve_name(storage, name),
            RomSelector::IdOrName(id, name) => {
                if storage.get_rom(*id)?.is_some() {
                    Ok(*id)
                } else {
                    resolve_name(storage, name)
                }
            }
        }
    }
}

fn resolve_name(storage: &StorageManager, name: &str) -> Result<RomId, Box<dyn Error>> {
    let roms = storage.find_roms_by_name(name)?;

    match roms.as_slice() {
        [rom] => Ok(rom.id),
        [] => Err(format!("No ROM is named \"{}\"", name).into()),
        _ => Err(format!(
            "{} ROMs are named \"{}\", pick one by id: {}",
            roms.len(),
            name,
            roms.iter().map(|rom| format!("#{}", rom.id)).join(", ")
        )
        .into()),
    }
}

pub fn open_controller(config: &GlobalConfig) -> SessionController<ProgramEngine> {
    let storage = StorageManager::new(Some(&config.database_file));
    let engine = ProgramEngine::new(config.engine.clone(), &config.session_directory);

    SessionController::new(storage, engine, &config.mount_point)
}

pub fn handle_cli(
    cli_action: CliAction,
    config: &GlobalConfig,
    config_location: &Path,
) -> Result<(), Box<dyn Error>> {
    match cli_action {
        CliAction::Rom { action } => match action {
            RomAction::Import {
                paths,
                system,
                shallow,
            } => {
                rom_import(config, paths, system, shallow)?;
            }
            RomAction::List { system, search } => {
                rom_list(config, system, search)?;
            }
            RomAction::Info { rom } => {
                rom_info(config, rom)?;
            }
            RomAction::Remove { roms } => {
                rom_remove(config, roms)?;
            }
            RomAction::Rename { rom, name } => {
                rom_rename(config, rom, name)?;
            }
            RomAction::Play { rom } => {
                rom_play(config, rom)?;
            }
        },
        CliAction::Save { action } => match action {
            SaveAction::List { rom } => {
                save_list(config, rom)?;
            }
            SaveAction::Remove { ids } => {
                save_remove(config, ids)?;
            }
            SaveAction::Export { rom, slot, output } => {
                save_export(config, rom, slot, output)?;
            }
            SaveAction::Import {
                rom,
                slot,
                path,
                screenshot,
            } => {
                save_import(config, rom, slot, path, screenshot)?;
            }
        },
        CliAction::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_location.exists() && !force {
                    return Err(format!(
                        "{} already exists, pass --force to overwrite it",
                        config_location.display()
                    )
                    .into());
                }

                GlobalConfig::default().save(config_location)?;
                tracing::info!("Wrote default configuration to {}", config_location.display());
            }
            ConfigAction::Show => {
                println!("# {}", config_location.display());
                println!(
                    "{}",
                    ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::default())?
                );
            }
        },
        CliAction::Systems => {
            for system in System::iter() {
                let info = system.info();

                println!(
                    "{} {:<11} {:<30} core {:<11} .{}",
                    info.icon,
                    system.tag(),
                    info.display_name,
                    info.core,
                    info.extensions.iter().join(" .")
                );
            }
        }
        CliAction::Stats => {
            let storage = StorageManager::new(Some(&config.database_file));
            let stats = storage.stats()?;

            println!("ROMs:        {}", stats.roms);
            println!("Save states: {}", stats.save_states);
            println!("Stored:      {} bytes", stats.payload_bytes);
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn library() -> StorageManager {
        let storage = StorageManager::in_memory();
        // Gets id 1
        storage.add_rom(vec![1], "Tetris.gb", None).unwrap();
        // Gets id 2
        storage.add_rom(vec![2], "1942.nes", None).unwrap();
        storage
    }

    #[test]
    fn selectors_parse() {
        assert_eq!(
            "#7".parse::<RomSelector>().unwrap(),
            RomSelector::Id(RomId::new(7))
        );
        assert_eq!(
            "id:7".parse::<RomSelector>().unwrap(),
            RomSelector::Id(RomId::new(7))
        );
        assert_eq!(
            "name:1942".parse::<RomSelector>().unwrap(),
            RomSelector::Name("1942".to_string())
        );
        assert_eq!(
            "1942".parse::<RomSelector>().unwrap(),
            RomSelector::IdOrName(RomId::new(1942), "1942".to_string())
        );
        assert_eq!(
            "Tetris".parse::<RomSelector>().unwrap(),
            RomSelector::Name("Tetris".to_string())
        );
        assert!("#seven".parse::<RomSelector>().is_err());
    }

    #[test]
    fn numeric_names_are_reachable() {
        let storage = library();
        let by_name = |s: &str| s.parse::<RomSelector>().unwrap().resolve(&storage).unwrap();

        assert_eq!(by_name("1942"), RomId::new(2));
        assert_eq!(by_name("name:1942"), RomId::new(2));
        assert_eq!(by_name("1"), RomId::new(1));
        assert_eq!(by_name("Tetris"), RomId::new(1));
    }

    #[test]
    fn unknown_names_are_errors() {
        let storage = library();

        assert!(RomSelector::Name("Zelda".to_string())
            .resolve(&storage)
            .is_err());
        assert!("99".parse::<RomSelector>().unwrap().resolve(&storage).is_err());
    }
}
