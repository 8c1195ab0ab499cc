//! The single active play session and the library view around it

use crate::{
    catalog::{CatalogView, SystemFilter},
    engine::{EmulationEngine, EngineConfig, EngineError, EngineEvent, RomBlob},
    ingest::{ingest, IngestFile, IngestReport},
    storage::{RomId, RomRecord, StorageError, StorageManager},
    system::System,
};
use thiserror::Error;

pub use crate::system::{display_name, icon};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Handing the game to the engine
    Starting,
    /// Handed off, the engine is assumed to be running
    Playing,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No engine core for the system \"{tag}\"")]
    UnsupportedSystem { tag: String },
    #[error("ROM {0} is not in the library")]
    NotFound(RomId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRom {
    pub id: RomId,
    pub name: String,
    pub system: System,
}

pub struct SessionController<E: EmulationEngine> {
    storage: StorageManager,
    engine: E,
    mount_point: String,
    catalog: CatalogView,
    state: SessionState,
    current: Option<ActiveRom>,
    blob: Option<RomBlob>,
}

impl<E: EmulationEngine> SessionController<E> {
    pub fn new(storage: StorageManager, engine: E, mount_point: impl Into<String>) -> Self {
        Self {
            storage,
            engine,
            mount_point: mount_point.into(),
            catalog: CatalogView::default(),
            state: SessionState::Idle,
            current: None,
            blob: None,
        }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current(&self) -> Option<&ActiveRom> {
        self.current.as_ref()
    }

    pub fn catalog(&self) -> &CatalogView {
        &self.catalog
    }

    pub fn visible(&self) -> impl Iterator<Item = &RomRecord> {
        self.catalog.visible()
    }

    /// Rereads the library, keeping the current filter and search
    pub fn load(&mut self) -> Result<(), SessionError> {
        let roms = self.storage.list_roms()?;
        tracing::debug!("Loaded {} ROMs into the catalog", roms.len());
        self.catalog.replace_records(roms);

        Ok(())
    }

    pub fn set_filter(&mut self, filter: SystemFilter) {
        self.catalog.set_filter(filter);
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.catalog.set_search(search);
    }

    /// Adds a batch of files and reloads the catalog once afterwards
    pub fn import(
        &mut self,
        files: impl IntoIterator<Item = IngestFile>,
        explicit_system: Option<System>,
    ) -> Result<IngestReport, SessionError> {
        let report = ingest(&self.storage, files, explicit_system);

        if !report.is_clean() {
            tracing::warn!(
                "{} files could not be added: {}",
                report.failures.len(),
                report
                    .failures
                    .iter()
                    .map(|failure| format!("{} ({})", failure.filename, failure.reason))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        self.load()?;

        Ok(report)
    }

    /// Deletes a ROM and its saves, ending its session first if it is running
    pub fn remove(&mut self, id: RomId) -> Result<(), SessionError> {
        if self.current.as_ref().is_some_and(|current| current.id == id) {
            self.stop();
        }

        self.storage.delete_rom(id)?;
        self.catalog.remove(id);

        Ok(())
    }

    /// Starts playing a ROM, replacing whatever session was running
    ///
    /// A ROM whose system has no engine core is refused before anything is touched,
    /// the controller stays idle and the engine never hears about it.
    pub fn play(&mut self, id: RomId) -> Result<(), SessionError> {
        self.stop();

        let record = self
            .storage
            .get_rom(id)?
            .ok_or(SessionError::NotFound(id))?;

        let Some(system) = record.system() else {
            tracing::error!(
                "ROM {} has the system \"{}\" which no engine core handles",
                id,
                record.system
            );
            return Err(SessionError::UnsupportedSystem { tag: record.system });
        };

        self.state = SessionState::Starting;
        self.current = Some(ActiveRom {
            id,
            name: record.name.clone(),
            system,
        });

        if let Err(err) = self.start(record, system) {
            self.stop();
            return Err(err);
        }

        self.state = SessionState::Playing;

        Ok(())
    }

    fn start(&mut self, record: RomRecord, system: System) -> Result<(), SessionError> {
        if let Some(played_at) = self.storage.touch_last_played(record.id)? {
            self.catalog.record_played(record.id, played_at);
        }

        let blob = RomBlob::new(record.payload);
        let rom = blob.handle();
        self.blob = Some(blob);

        let config = EngineConfig {
            mount_point: self.mount_point.clone(),
            core: system.info().core,
            rom,
            rom_id: record.id,
            game_name: record.name,
            filename: record.filename,
            start_on_load: true,
        };

        tracing::info!(
            "Starting \"{}\" on the {} core",
            config.game_name,
            config.core
        );

        self.engine.launch(config)?;

        Ok(())
    }

    /// Ends the session, safe to call in any state and any number of times
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle && self.current.is_none() && self.blob.is_none() {
            return;
        }

        if self.engine.supports_exit() {
            self.engine.pause();
            self.engine.exit();
        }

        self.blob = None;
        self.engine.clear_surface();

        if let Some(current) = self.current.take() {
            tracing::info!("Stopped \"{}\"", current.name);
        }

        self.state = SessionState::Idle;
    }

    /// Reacts to the engine's lifecycle hooks
    ///
    /// Returns the stored state when the engine asks to restore one.
    pub fn handle_engine_event(
        &mut self,
        event: EngineEvent,
    ) -> Result<Option<Vec<u8>>, SessionError> {
        let Some(current) = self.current.as_ref() else {
            tracing::warn!("Ignoring engine event with no active session: {:?}", event);
            return Ok(None);
        };

        match event {
            EngineEvent::GameStarted => {
                tracing::info!("Engine reports \"{}\" has started", current.name);
                Ok(None)
            }
            EngineEvent::StateSaved {
                slot,
                state,
                screenshot,
            } => {
                self.storage
                    .upsert_save_state(current.id, slot, state, screenshot)?;
                tracing::info!("Saved state for \"{}\" in slot {}", current.name, slot);
                Ok(None)
            }
            EngineEvent::StateLoadRequested { slot } => {
                let save_state = self.storage.get_save_state(current.id, slot)?;

                if save_state.is_none() {
                    tracing::warn!("No save state for \"{}\" in slot {}", current.name, slot);
                }

                Ok(save_state.map(|save_state| save_state.payload))
            }
        }
    }
}

impl<E: EmulationEngine> Drop for SessionController<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Launch { core: &'static str, game_name: String },
        Pause,
        Exit,
        ClearSurface,
    }

    /// Records calls and holds on to the config like a real engine would
    #[derive(Default)]
    struct StubEngine {
        calls: Rc<RefCell<Vec<Call>>>,
        config: Option<EngineConfig>,
        exit_supported: bool,
        fail_launch: bool,
    }

    impl EmulationEngine for StubEngine {
        fn launch(&mut self, config: EngineConfig) -> Result<(), EngineError> {
            self.calls.borrow_mut().push(Call::Launch {
                core: config.core,
                game_name: config.game_name.clone(),
            });

            if self.fail_launch {
                return Err(EngineError::NotConfigured);
            }

            self.config = Some(config);
            Ok(())
        }

        fn supports_exit(&self) -> bool {
            self.exit_supported
        }

        fn pause(&mut self) {
            self.calls.borrow_mut().push(Call::Pause);
        }

        fn exit(&mut self) {
            self.calls.borrow_mut().push(Call::Exit);
            self.config = None;
        }

        fn clear_surface(&mut self) {
            self.calls.borrow_mut().push(Call::ClearSurface);
        }
    }

    fn controller(engine: StubEngine) -> SessionController<StubEngine> {
        let storage = StorageManager::in_memory();
        let mut controller = SessionController::new(storage, engine, "game");
        controller.load().unwrap();
        controller
    }

    fn exiting_engine() -> (StubEngine, Rc<RefCell<Vec<Call>>>) {
        let engine = StubEngine {
            exit_supported: true,
            ..Default::default()
        };
        let calls = engine.calls.clone();
        (engine, calls)
    }

    fn add(controller: &mut SessionController<StubEngine>, filename: &str) -> RomId {
        let report = controller
            .import([IngestFile::new(filename, vec![0x4E, 0x45, 0x53])], None)
            .unwrap();
        report.added[0].id
    }

    #[test]
    fn stop_without_a_session_is_a_no_op() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);

        controller.stop();
        controller.stop();

        assert_eq!(controller.state(), SessionState::Idle);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn play_hands_off_and_stop_releases() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);
        let id = add(&mut controller, "Mega Man 2.nes");

        controller.play(id).unwrap();

        assert_eq!(controller.state(), SessionState::Playing);
        assert_eq!(controller.current().unwrap().name, "Mega Man 2");
        let rom = controller.engine().config.as_ref().unwrap().rom.clone();
        assert_eq!(*rom.bytes().unwrap(), [0x4E, 0x45, 0x53]);
        // Only the controller owns the payload
        assert_eq!(rom.holders(), 1);

        let played = controller.storage().get_rom(id).unwrap().unwrap();
        assert!(played.last_played.is_some());
        assert_eq!(controller.catalog().get(id).unwrap().last_played, played.last_played);

        controller.stop();

        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.current().is_none());
        assert!(rom.is_released());
        assert_eq!(
            *calls.borrow(),
            [
                Call::Launch {
                    core: "nes",
                    game_name: "Mega Man 2".to_string()
                },
                Call::Pause,
                Call::Exit,
                Call::ClearSurface,
            ]
        );
    }

    #[test]
    fn engines_without_exit_are_only_cleared() {
        let engine = StubEngine::default();
        let calls = engine.calls.clone();
        let mut controller = controller(engine);
        let id = add(&mut controller, "Pokemon Red.gb");

        controller.play(id).unwrap();
        let rom = controller.engine().config.as_ref().unwrap().rom.clone();
        controller.stop();

        assert_eq!(
            *calls.borrow(),
            [
                Call::Launch {
                    core: "gb",
                    game_name: "Pokemon Red".to_string()
                },
                Call::ClearSurface,
            ]
        );
        // The engine still holds its config but the payload is gone
        assert!(controller.engine().config.is_some());
        assert!(rom.is_released());
        assert!(rom.bytes().is_none());
    }

    #[test]
    fn unsupported_systems_never_reach_the_engine() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);

        // A record written by something that knows more systems than we do
        let stray = add(&mut controller, "Tempest.a78");
        retag(controller.storage(), stray, "jaguar");
        controller.load().unwrap();

        let result = controller.play(stray);

        assert!(matches!(
            result,
            Err(SessionError::UnsupportedSystem { tag }) if tag == "jaguar"
        ));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.current().is_none());
        assert!(calls.borrow().is_empty());

        let untouched = controller.storage().get_rom(stray).unwrap().unwrap();
        assert_eq!(untouched.last_played, None);
    }

    fn retag(storage: &StorageManager, id: RomId, tag: &str) {
        // Only the test needs to write a tag outside the table
        let database = storage.database().unwrap();
        let transaction = database.rw_transaction().unwrap();
        let rom = transaction.get().primary::<RomRecord>(id).unwrap().unwrap();
        let updated = RomRecord {
            system: tag.to_string(),
            ..rom.clone()
        };
        transaction.update(rom, updated).unwrap();
        transaction.commit().unwrap();
    }

    #[test]
    fn missing_roms_are_reported() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);

        assert!(matches!(
            controller.play(RomId::new(404)),
            Err(SessionError::NotFound(id)) if id == RomId::new(404)
        ));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn failed_launch_returns_to_idle() {
        let engine = StubEngine {
            exit_supported: true,
            fail_launch: true,
            ..Default::default()
        };
        let mut controller = controller(engine);
        let id = add(&mut controller, "Chrono Trigger.sfc");

        assert!(matches!(
            controller.play(id),
            Err(SessionError::Engine(EngineError::NotConfigured))
        ));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.current().is_none());
        assert!(controller.blob.is_none());
    }

    #[test]
    fn playing_again_replaces_the_session() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);
        let first = add(&mut controller, "Golden Axe.md");
        let second = add(&mut controller, "Wonder Boy.sms");

        controller.play(first).unwrap();
        controller.play(second).unwrap();

        assert_eq!(controller.current().unwrap().system, System::MasterSystem);
        let launches = calls
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Launch { .. }))
            .count();
        let exits = calls
            .borrow()
            .iter()
            .filter(|call| **call == Call::Exit)
            .count();
        assert_eq!((launches, exits), (2, 1));

        let order: Vec<_> = controller.visible().map(|rom| rom.name.as_str()).collect();
        assert_eq!(order, ["Wonder Boy", "Golden Axe"]);
    }

    #[test]
    fn dropping_the_controller_stops_the_session() {
        let (engine, calls) = exiting_engine();
        let mut controller = controller(engine);
        let id = add(&mut controller, "Sonic.gg");
        controller.play(id).unwrap();

        let rom = controller.engine().config.as_ref().unwrap().rom.clone();
        drop(controller);

        assert!(rom.is_released());
        assert_eq!(calls.borrow().last(), Some(&Call::ClearSurface));
    }

    #[test]
    fn save_state_events_round_trip_through_storage() {
        let (engine, _) = exiting_engine();
        let mut controller = controller(engine);
        let id = add(&mut controller, "Metroid Fusion.gba");

        let ignored = controller
            .handle_engine_event(EngineEvent::StateSaved {
                slot: 1,
                state: vec![1],
                screenshot: None,
            })
            .unwrap();
        assert_eq!(ignored, None);
        assert!(controller.storage().list_save_states(id).unwrap().is_empty());

        controller.play(id).unwrap();
        controller
            .handle_engine_event(EngineEvent::GameStarted)
            .unwrap();
        for state in [vec![1, 1], vec![2, 2]] {
            controller
                .handle_engine_event(EngineEvent::StateSaved {
                    slot: 1,
                    state,
                    screenshot: Some(vec![9]),
                })
                .unwrap();
        }

        assert_eq!(controller.storage().list_save_states(id).unwrap().len(), 1);
        assert_eq!(
            controller
                .handle_engine_event(EngineEvent::StateLoadRequested { slot: 1 })
                .unwrap(),
            Some(vec![2, 2])
        );
        assert_eq!(
            controller
                .handle_engine_event(EngineEvent::StateLoadRequested { slot: 3 })
                .unwrap(),
            None
        );
    }

    #[test]
    fn removing_the_playing_rom_ends_the_session() {
        let (engine, _) = exiting_engine();
        let mut controller = controller(engine);
        let id = add(&mut controller, "F-Zero.sfc");
        controller.play(id).unwrap();
        controller
            .handle_engine_event(EngineEvent::StateSaved {
                slot: 0,
                state: vec![3],
                screenshot: None,
            })
            .unwrap();

        controller.remove(id).unwrap();

        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.catalog().records().len(), 0);
        assert!(controller.storage().list_save_states(id).unwrap().is_empty());
    }

    #[test]
    fn import_reports_failures_and_filters_apply() {
        let (engine, _) = exiting_engine();
        let mut controller = controller(engine);

        let report = controller
            .import(
                [
                    IngestFile::new("Crash Bandicoot.bin", vec![1]),
                    IngestFile::new("manual.pdf", vec![2]),
                    IngestFile::new("Crystalis.nes", vec![3]),
                ],
                None,
            )
            .unwrap();
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.failures[0].filename, "manual.pdf");

        controller.set_filter("psx".parse().unwrap());
        let visible: Vec<_> = controller.visible().map(|rom| rom.name.as_str()).collect();
        assert_eq!(visible, ["Crash Bandicoot"]);

        controller.set_filter(SystemFilter::All);
        controller.set_search("crys");
        let visible: Vec<_> = controller.visible().map(|rom| rom.name.as_str()).collect();
        assert_eq!(visible, ["Crystalis"]);

        assert_eq!(display_name("psx"), "PlayStation");
        assert_eq!(icon("psx"), "💿");
    }
}
