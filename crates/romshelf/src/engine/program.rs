use super::{EmulationEngine, EngineConfig, EngineError};
use crate::config::EngineProgramConfig;
use std::{
    fs,
    io,
    path::PathBuf,
    process::{Child, Command, ExitStatus},
};

/// Runs games by launching an external emulator program
///
/// The ROM is written out under the session directory because external programs
/// want a path, and that file is what [EmulationEngine::clear_surface] removes.
#[derive(Debug)]
pub struct ProgramEngine {
    program: EngineProgramConfig,
    session_directory: PathBuf,
    child: Option<Child>,
    rom_file: Option<PathBuf>,
    config: Option<EngineConfig>,
}

impl ProgramEngine {
    pub fn new(program: EngineProgramConfig, session_directory: impl Into<PathBuf>) -> Self {
        Self {
            program,
            session_directory: session_directory.into(),
            child: None,
            rom_file: None,
            config: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Blocks until the emulator program quits on its own
    pub fn wait_for_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.wait()?;
                self.child = None;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    fn arguments(&self, config: &EngineConfig, rom_file: &str) -> Vec<String> {
        let core = self
            .program
            .cores
            .get(config.core)
            .map_or(config.core, String::as_str);

        self.program
            .arguments
            .iter()
            .map(|argument| {
                argument
                    .replace("{core}", core)
                    .replace("{rom}", rom_file)
                    .replace("{name}", &config.game_name)
                    .replace("{mount}", &config.mount_point)
            })
            .collect()
    }
}

impl EmulationEngine for ProgramEngine {
    fn launch(&mut self, config: EngineConfig) -> Result<(), EngineError> {
        let program = self.program.program.clone().ok_or(EngineError::NotConfigured)?;

        fs::create_dir_all(&self.session_directory)?;
        let rom_file = self
            .session_directory
            .join(format!("{}-{}", config.rom_id, config.filename));
        let bytes = config.rom.bytes().ok_or(EngineError::Released)?;
        fs::write(&rom_file, &bytes)?;
        drop(bytes);
        self.rom_file = Some(rom_file.clone());

        let arguments = self.arguments(&config, &rom_file.to_string_lossy());
        tracing::info!(
            "Launching {} {:?} for \"{}\" on core {}",
            program,
            arguments,
            config.game_name,
            config.core
        );

        if !config.start_on_load {
            tracing::debug!("Engine asked not to autostart, the program decides for itself");
        }

        let child = Command::new(&program)
            .args(&arguments)
            .spawn()
            .map_err(|source| EngineError::Spawn { program, source })?;

        self.child = Some(child);
        self.config = Some(config);

        Ok(())
    }

    fn supports_exit(&self) -> bool {
        true
    }

    fn pause(&mut self) {
        // External programs have no portable pause, exit follows right after anyway
        tracing::trace!("Pause requested for external emulator");
    }

    fn exit(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                // Already gone on its own
                tracing::debug!("Emulator program was not running: {}", err);
            }

            if let Err(err) = child.wait() {
                tracing::warn!("Failed to reap emulator program: {}", err);
            }
        }

        self.config = None;
    }

    fn clear_surface(&mut self) {
        if let Some(rom_file) = self.rom_file.take() {
            if let Err(err) = fs::remove_file(&rom_file) {
                tracing::warn!("Could not remove {}: {}", rom_file.display(), err);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{engine::RomBlob, storage::RomId};
    use indexmap::IndexMap;

    fn config(blob: &RomBlob) -> EngineConfig {
        EngineConfig {
            mount_point: "game".to_string(),
            core: "gba",
            rom: blob.handle(),
            rom_id: RomId::new(7),
            game_name: "Advance Wars".to_string(),
            filename: "Advance Wars.gba".to_string(),
            start_on_load: true,
        }
    }

    #[test]
    fn placeholders_are_substituted() {
        let engine = ProgramEngine::new(
            EngineProgramConfig {
                program: Some("emulator".to_string()),
                arguments: vec![
                    "--core={core}".to_string(),
                    "{rom}".to_string(),
                    "--title".to_string(),
                    "{name}".to_string(),
                ],
                cores: IndexMap::from([("gba".to_string(), "mgba".to_string())]),
            },
            "/tmp/session",
        );

        assert_eq!(
            engine.arguments(&config(&RomBlob::new(vec![0xAA; 32])), "/tmp/session/7-Advance Wars.gba"),
            [
                "--core=mgba",
                "/tmp/session/7-Advance Wars.gba",
                "--title",
                "Advance Wars"
            ]
        );
    }

    #[test]
    fn unconfigured_program_refuses_to_launch() {
        let directory = tempfile::tempdir().unwrap();
        let mut engine = ProgramEngine::new(EngineProgramConfig::default(), directory.path());
        let blob = RomBlob::new(vec![0xAA; 32]);

        assert!(matches!(
            engine.launch(config(&blob)),
            Err(EngineError::NotConfigured)
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn missing_program_cleans_up_after_itself() {
        let directory = tempfile::tempdir().unwrap();
        let mut engine = ProgramEngine::new(
            EngineProgramConfig {
                program: Some("romshelf-test-program-that-does-not-exist".to_string()),
                ..Default::default()
            },
            directory.path(),
        );
        let blob = RomBlob::new(vec![0xAA; 32]);
        let handle = blob.handle();

        assert!(matches!(
            engine.launch(config(&blob)),
            Err(EngineError::Spawn { .. })
        ));
        assert_eq!(handle.holders(), 1);

        let rom_file = directory.path().join("7-Advance Wars.gba");
        assert!(rom_file.is_file());

        engine.clear_surface();
        assert!(!rom_file.exists());
    }

    #[test]
    fn released_roms_are_not_written() {
        let directory = tempfile::tempdir().unwrap();
        let mut engine = ProgramEngine::new(
            EngineProgramConfig {
                program: Some("emulator".to_string()),
                ..Default::default()
            },
            directory.path(),
        );
        let blob = RomBlob::new(vec![0xAA; 32]);
        let config = config(&blob);
        drop(blob);

        assert!(matches!(engine.launch(config), Err(EngineError::Released)));
        assert!(!directory.path().join("7-Advance Wars.gba").exists());
    }
}
