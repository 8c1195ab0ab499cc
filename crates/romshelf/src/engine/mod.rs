//! The boundary to the emulator that actually runs games
//!
//! The engine is a black box: it gets a ROM and a core identifier and reports back
//! through [EngineEvent]s. Nothing in this crate looks inside it.

use crate::storage::RomId;
use std::{
    fmt::Debug,
    io,
    sync::{Arc, Weak},
};
use thiserror::Error;

mod program;

pub use program::ProgramEngine;

/// A ROM payload loaded for one session
///
/// The session controller owns the only strong reference. Engines get [RomHandle]s,
/// so dropping the blob releases the payload no matter what the engine kept.
pub struct RomBlob(Arc<[u8]>);

impl RomBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn handle(&self) -> RomHandle {
        RomHandle(Arc::downgrade(&self.0))
    }
}

impl Debug for RomBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomBlob").field("len", &self.len()).finish()
    }
}

/// Revocable reference to a [RomBlob] given to the engine
#[derive(Clone)]
pub struct RomHandle(Weak<[u8]>);

impl RomHandle {
    /// The payload, or [None] once the session that loaded it has stopped
    ///
    /// Keep the returned bytes only as long as it takes to read them.
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.0.upgrade()
    }

    pub fn is_released(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// How many strong references to the payload are still alive
    pub fn holders(&self) -> usize {
        self.0.strong_count()
    }
}

impl Debug for RomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomHandle")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Everything the engine needs to boot a game
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where the engine should present itself, interpretation is up to the engine
    pub mount_point: String,
    pub core: &'static str,
    pub rom: RomHandle,
    pub rom_id: RomId,
    pub game_name: String,
    /// Original file name, some engines need the extension
    pub filename: String,
    pub start_on_load: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    GameStarted,
    StateSaved {
        slot: u8,
        state: Vec<u8>,
        screenshot: Option<Vec<u8>>,
    },
    StateLoadRequested {
        slot: u8,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No emulator program is configured")]
    NotConfigured,
    #[error("Could not launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("The ROM was released before the engine read it")]
    Released,
    #[error("Engine I/O failed: {0}")]
    Io(#[from] io::Error),
}

pub trait EmulationEngine {
    /// Hands the game over, returning once the engine has been told to start
    fn launch(&mut self, config: EngineConfig) -> Result<(), EngineError>;

    /// Whether [EmulationEngine::pause] and [EmulationEngine::exit] do anything
    fn supports_exit(&self) -> bool {
        false
    }

    fn pause(&mut self) {}

    /// Stops the game and drops the engine's hold on the [EngineConfig]
    fn exit(&mut self) {}

    /// Removes whatever the engine left behind on its mount point
    fn clear_surface(&mut self) {}
}
