use itertools::Itertools;
use std::path::Path;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Icon shown for tags that are not in the system table
pub const GENERIC_ICON: &str = "🎮";

/// Every system the library knows how to hand off to the engine
///
/// Declaration order matters: extension detection walks this list top to bottom
/// and the first system claiming an extension wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum System {
    #[strum(serialize = "nes")]
    Nes,
    #[strum(serialize = "snes")]
    Snes,
    #[strum(serialize = "gb")]
    GameBoy,
    #[strum(serialize = "gbc")]
    GameBoyColor,
    #[strum(serialize = "gba")]
    GameBoyAdvance,
    #[strum(serialize = "n64")]
    Nintendo64,
    #[strum(serialize = "nds")]
    NintendoDs,
    #[strum(serialize = "psx")]
    Playstation,
    #[strum(serialize = "segaMD")]
    MegaDrive,
    #[strum(serialize = "segaMS")]
    MasterSystem,
    #[strum(serialize = "segaGG")]
    GameGear,
    #[strum(serialize = "segaCD")]
    SegaCd,
    #[strum(serialize = "segaSaturn")]
    Saturn,
    #[strum(serialize = "atari2600")]
    Atari2600,
    #[strum(serialize = "atari7800")]
    Atari7800,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SystemInfo {
    pub display_name: &'static str,
    /// Lowercase, without the leading dot
    pub extensions: &'static [&'static str],
    /// Backend the engine should boot for this system
    pub core: &'static str,
    pub icon: &'static str,
}

impl System {
    pub fn tag(self) -> &'static str {
        self.into()
    }

    pub fn info(self) -> &'static SystemInfo {
        match self {
            System::Nes => &SystemInfo {
                display_name: "Nintendo Entertainment System",
                extensions: &["nes", "fds", "unf", "unif"],
                core: "nes",
                icon: "🕹️",
            },
            System::Snes => &SystemInfo {
                display_name: "Super Nintendo",
                extensions: &["smc", "sfc", "fig", "swc"],
                core: "snes",
                icon: "🎮",
            },
            System::GameBoy => &SystemInfo {
                display_name: "Game Boy",
                extensions: &["gb"],
                core: "gb",
                icon: "🟩",
            },
            System::GameBoyColor => &SystemInfo {
                display_name: "Game Boy Color",
                extensions: &["gbc"],
                core: "gb",
                icon: "🌈",
            },
            System::GameBoyAdvance => &SystemInfo {
                display_name: "Game Boy Advance",
                extensions: &["gba"],
                core: "gba",
                icon: "🟪",
            },
            System::Nintendo64 => &SystemInfo {
                display_name: "Nintendo 64",
                extensions: &["n64", "z64", "v64"],
                core: "n64",
                icon: "🔷",
            },
            System::NintendoDs => &SystemInfo {
                display_name: "Nintendo DS",
                extensions: &["nds"],
                core: "nds",
                icon: "📱",
            },
            System::Playstation => &SystemInfo {
                display_name: "PlayStation",
                extensions: &["bin", "cue", "iso", "pbp", "chd"],
                core: "psx",
                icon: "💿",
            },
            System::MegaDrive => &SystemInfo {
                display_name: "Sega Genesis / Mega Drive",
                extensions: &["md", "gen", "smd"],
                core: "segaMD",
                icon: "🦔",
            },
            System::MasterSystem => &SystemInfo {
                display_name: "Sega Master System",
                extensions: &["sms"],
                core: "segaMS",
                icon: "🔴",
            },
            System::GameGear => &SystemInfo {
                display_name: "Sega Game Gear",
                extensions: &["gg"],
                core: "segaGG",
                icon: "🔦",
            },
            System::SegaCd => &SystemInfo {
                display_name: "Sega CD",
                extensions: &["bin", "cue", "iso", "chd"],
                core: "segaCD",
                icon: "📀",
            },
            System::Saturn => &SystemInfo {
                display_name: "Sega Saturn",
                extensions: &["bin", "cue", "iso", "chd"],
                core: "segaSaturn",
                icon: "🪐",
            },
            System::Atari2600 => &SystemInfo {
                display_name: "Atari 2600",
                extensions: &["a26"],
                core: "atari2600",
                icon: "👾",
            },
            System::Atari7800 => &SystemInfo {
                display_name: "Atari 7800",
                extensions: &["a78"],
                core: "atari7800",
                icon: "🛸",
            },
        }
    }
}

/// Guesses the system from the file extension
///
/// Extensions shared between systems (`.bin`, `.cue`, `.iso`, `.chd`) resolve to
/// whichever system is declared first, which is the PlayStation.
pub fn detect_system(filename: &str) -> Option<System> {
    let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();

    System::iter().find(|system| system.info().extensions.contains(&extension.as_str()))
}

/// Union of every extension in the table, for file pickers and directory scans
pub fn accepted_extensions() -> Vec<&'static str> {
    System::iter()
        .flat_map(|system| system.info().extensions.iter().copied())
        .sorted()
        .dedup()
        .collect()
}

pub fn is_accepted_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            accepted_extensions().contains(&extension.to_lowercase().as_str())
        })
}

/// Falls back to the raw tag when it is not in the table
pub fn display_name(tag: &str) -> &str {
    match tag.parse::<System>() {
        Ok(system) => system.info().display_name,
        Err(_) => tag,
    }
}

pub fn icon(tag: &str) -> &'static str {
    tag.parse::<System>()
        .map_or(GENERIC_ICON, |system| system.info().icon)
}

/// File name without its final extension
pub fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(index) if index > 0 && !filename[index + 1..].contains(['/', '\\']) => {
            &filename[..index]
        }
        _ => filename,
    }
}
