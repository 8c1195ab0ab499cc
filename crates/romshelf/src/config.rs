use indexmap::IndexMap;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use std::{
    fs::{create_dir_all, File},
    path::{Path, PathBuf},
    sync::LazyLock,
};

pub static STORAGE_DIRECTORY: LazyLock<PathBuf> = LazyLock::new(|| {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("romshelf")
});

pub static CONFIG_LOCATION: LazyLock<PathBuf> =
    LazyLock::new(|| STORAGE_DIRECTORY.join("config.ron"));

#[serde_inline_default]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde_inline_default(STORAGE_DIRECTORY.join("database"))]
    pub database_file: PathBuf,
    /// Scratch space for ROMs handed to an external emulator
    #[serde_inline_default(STORAGE_DIRECTORY.join("session"))]
    pub session_directory: PathBuf,
    #[serde_inline_default("game".to_string())]
    pub mount_point: String,
    #[serde(default)]
    pub engine: EngineProgramConfig,
    #[serde_inline_default(true)]
    pub recursive_import: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            database_file: STORAGE_DIRECTORY.join("database"),
            session_directory: STORAGE_DIRECTORY.join("session"),
            mount_point: "game".to_string(),
            engine: EngineProgramConfig::default(),
            recursive_import: true,
        }
    }
}

/// External emulator invocation
///
/// Arguments may contain `{core}`, `{rom}`, `{name}` and `{mount}`.
#[serde_inline_default]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineProgramConfig {
    #[serde(default)]
    pub program: Option<String>,
    #[serde_inline_default(vec!["{rom}".to_string()])]
    pub arguments: Vec<String>,
    /// Maps core identifiers to whatever the program calls them
    #[serde(default)]
    pub cores: IndexMap<String, String>,
}

impl Default for EngineProgramConfig {
    fn default() -> Self {
        Self {
            program: None,
            arguments: vec!["{rom}".to_string()],
            cores: IndexMap::new(),
        }
    }
}

impl GlobalConfig {
    pub fn save(&self, location: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let location = location.as_ref();

        if let Some(parent) = location.parent() {
            create_dir_all(parent)?;
        }

        let config_file = File::create(location)?;
        ron::ser::to_writer_pretty(config_file, self, PrettyConfig::default())?;

        Ok(())
    }

    pub fn load(location: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_file = File::open(location)?;
        let config = ron::de::from_reader(config_file)?;

        Ok(config)
    }

    /// Falls back to defaults when the file is missing or broken
    pub fn load_or_default(location: impl AsRef<Path>) -> Self {
        let location = location.as_ref();

        match Self::load(location) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    "Using default configuration, could not load {}: {}",
                    location.display(),
                    err
                );
                Self::default()
            }
        }
    }
}
