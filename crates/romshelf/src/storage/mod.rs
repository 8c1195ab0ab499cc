//! Durable storage for ROMs and their save states
//!
//! Everything lives in one `native_db` database with two record collections.
//! The database has no composite uniqueness constraints, so the one-save-per-slot
//! rule is kept by scanning a ROM's saves before writing.

use crate::system::{detect_system, System};
use chrono::{DateTime, Utc};
use native_db::transaction::{RTransaction, RwTransaction};
use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
    sync::{LazyLock, OnceLock},
};
use thiserror::Error;

pub mod id;
pub mod record;

pub use id::{RomId, SaveStateId};
pub use record::{RomRecord, SaveStateRecord};
use record::{RomRecordKey, SaveStateRecordKey, Sequence};

static DATABASE_MODELS: LazyLock<native_db::Models> = LazyLock::new(|| {
    let mut models = native_db::Models::new();
    models.define::<RomRecord>().unwrap();
    models.define::<SaveStateRecord>().unwrap();
    models.define::<Sequence>().unwrap();
    models
});

const ROM_SEQUENCE: &str = "roms";
const SAVE_STATE_SEQUENCE: &str = "save_states";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Could not open the library database at {location}: {reason}")]
    InitializationFailed { location: String, reason: String },
    #[error("{filename} does not match any known system")]
    UnrecognizedFormat { filename: String },
    #[error("Database error: {0}")]
    Database(#[from] native_db::db_type::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub roms: usize,
    pub save_states: usize,
    pub payload_bytes: u64,
}

/// Owns the database connection, which is opened on first use
pub struct StorageManager {
    location: Option<PathBuf>,
    database: OnceLock<native_db::Database<'static>>,
}

impl StorageManager {
    /// Persistent storage at `location`, or an in-memory database when `None`
    pub fn new(location: Option<&Path>) -> Self {
        Self {
            location: location.map(Path::to_path_buf),
            database: OnceLock::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// A failed open is not remembered, the next operation tries again
    pub(crate) fn database(&self) -> Result<&native_db::Database<'static>, StorageError> {
        if let Some(database) = self.database.get() {
            return Ok(database);
        }

        let database = self.open()?;
        Ok(self.database.get_or_init(|| database))
    }

    fn open(&self) -> Result<native_db::Database<'static>, StorageError> {
        let location = self
            .location
            .as_deref()
            .map_or_else(|| "memory".to_string(), |path| path.display().to_string());

        let initialization_failed = |reason: String| {
            tracing::error!("Failed to open library database {}: {}", location, reason);

            StorageError::InitializationFailed {
                location: location.clone(),
                reason,
            }
        };

        let database = match &self.location {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    create_dir_all(parent).map_err(|err| initialization_failed(err.to_string()))?;
                }

                native_db::Builder::new().create(&DATABASE_MODELS, path)
            }
            None => native_db::Builder::new().create_in_memory(&DATABASE_MODELS),
        }
        .map_err(|err| initialization_failed(err.to_string()))?;

        tracing::debug!("Opened library database {}", location);

        Ok(database)
    }

    pub fn detect_system(&self, filename: &str) -> Option<System> {
        detect_system(filename)
    }

    pub fn add_rom(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        explicit_system: Option<System>,
    ) -> Result<RomRecord, StorageError> {
        let system = explicit_system
            .or_else(|| detect_system(filename))
            .ok_or_else(|| StorageError::UnrecognizedFormat {
                filename: filename.to_string(),
            })?;

        let transaction = self.database()?.rw_transaction()?;
        let id = RomId::new(next_sequence_value(&transaction, ROM_SEQUENCE)?);
        let record = RomRecord::new(id, filename, system, bytes, Utc::now());
        transaction.insert(record.clone())?;
        transaction.commit()?;

        tracing::info!(
            "Added ROM {} \"{}\" for the system {} with hash {}",
            record.id,
            record.name,
            record.system,
            record.fingerprint
        );

        Ok(record)
    }

    pub fn list_roms(&self) -> Result<Vec<RomRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;
        let roms = transaction
            .scan()
            .primary::<RomRecord>()?
            .all()?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roms)
    }

    pub fn list_roms_by_system(&self, tag: &str) -> Result<Vec<RomRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;
        let tag = tag.to_string();
        let roms = transaction
            .scan()
            .secondary::<RomRecord>(RomRecordKey::system)?
            .range(tag.clone()..=tag)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roms)
    }

    /// Exact match on the display name
    pub fn find_roms_by_name(&self, name: &str) -> Result<Vec<RomRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;
        let name = name.to_string();
        let roms = transaction
            .scan()
            .secondary::<RomRecord>(RomRecordKey::name)?
            .range(name.clone()..=name)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(roms)
    }

    pub fn get_rom(&self, id: RomId) -> Result<Option<RomRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;

        Ok(transaction.get().primary::<RomRecord>(id)?)
    }

    /// Deletes the ROM together with every save state pointing at it
    ///
    /// Both deletions share one transaction, so either all of them land or none do.
    /// Saves left behind for an id with no ROM are swept up as well.
    pub fn delete_rom(&self, id: RomId) -> Result<(), StorageError> {
        let transaction = self.database()?.rw_transaction()?;

        let rom = transaction.get().primary::<RomRecord>(id)?;
        let found = rom.is_some();
        if let Some(rom) = rom {
            transaction.remove(rom)?;
        }

        let save_states = rw_save_states_for(&transaction, id)?;
        let removed_save_states = save_states.len();
        for save_state in save_states {
            transaction.remove(save_state)?;
        }

        transaction.commit()?;

        if found {
            tracing::info!(
                "Deleted ROM {} and {} save states",
                id,
                removed_save_states
            );
        } else {
            tracing::warn!(
                "ROM {} was not in the library, removed {} orphaned save states",
                id,
                removed_save_states
            );
        }

        Ok(())
    }

    /// Stamps the ROM as played now, returning the stamp if the ROM exists
    pub fn touch_last_played(&self, id: RomId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let transaction = self.database()?.rw_transaction()?;

        let Some(rom) = transaction.get().primary::<RomRecord>(id)? else {
            return Ok(None);
        };

        let now = Utc::now();
        let updated = RomRecord {
            last_played: Some(now),
            ..rom.clone()
        };
        transaction.update(rom, updated)?;
        transaction.commit()?;

        Ok(Some(now))
    }

    pub fn rename_rom(&self, id: RomId, name: &str) -> Result<Option<RomRecord>, StorageError> {
        self.modify_rom(id, |rom| rom.name = name.to_string())
    }

    pub fn set_cover_art(
        &self,
        id: RomId,
        cover_art: Option<String>,
    ) -> Result<Option<RomRecord>, StorageError> {
        self.modify_rom(id, |rom| rom.cover_art = cover_art)
    }

    fn modify_rom(
        &self,
        id: RomId,
        modify: impl FnOnce(&mut RomRecord),
    ) -> Result<Option<RomRecord>, StorageError> {
        let transaction = self.database()?.rw_transaction()?;

        let Some(rom) = transaction.get().primary::<RomRecord>(id)? else {
            return Ok(None);
        };

        let mut updated = rom.clone();
        modify(&mut updated);
        // Identity is not up for modification
        updated.id = rom.id;

        transaction.update(rom, updated.clone())?;
        transaction.commit()?;

        Ok(Some(updated))
    }

    /// Writes the save for `(rom_id, slot)`, replacing the existing one in place
    pub fn upsert_save_state(
        &self,
        rom_id: RomId,
        slot: u8,
        payload: Vec<u8>,
        screenshot: Option<Vec<u8>>,
    ) -> Result<SaveStateRecord, StorageError> {
        let transaction = self.database()?.rw_transaction()?;
        let saved_at = Utc::now();

        let existing = rw_save_states_for(&transaction, rom_id)?
            .into_iter()
            .find(|save_state| save_state.slot == slot);

        let record = match existing {
            Some(existing) => {
                let updated = SaveStateRecord {
                    payload,
                    screenshot,
                    saved_at,
                    ..existing.clone()
                };
                transaction.update(existing, updated.clone())?;

                tracing::debug!(
                    "Overwrote save state {} for ROM {} in slot {}",
                    updated.id,
                    rom_id,
                    slot
                );

                updated
            }
            None => {
                let id = SaveStateId::new(next_sequence_value(&transaction, SAVE_STATE_SEQUENCE)?);
                let record = SaveStateRecord {
                    id,
                    rom_id,
                    slot,
                    payload,
                    screenshot,
                    saved_at,
                };
                transaction.insert(record.clone())?;

                tracing::debug!(
                    "Created save state {} for ROM {} in slot {}",
                    id,
                    rom_id,
                    slot
                );

                record
            }
        };

        transaction.commit()?;

        Ok(record)
    }

    /// Sorted by slot
    pub fn list_save_states(&self, rom_id: RomId) -> Result<Vec<SaveStateRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;
        let mut save_states = r_save_states_for(&transaction, rom_id)?;
        save_states.sort_by_key(|save_state| save_state.slot);

        Ok(save_states)
    }

    pub fn get_save_state(
        &self,
        rom_id: RomId,
        slot: u8,
    ) -> Result<Option<SaveStateRecord>, StorageError> {
        let transaction = self.database()?.r_transaction()?;

        Ok(r_save_states_for(&transaction, rom_id)?
            .into_iter()
            .find(|save_state| save_state.slot == slot))
    }

    /// Returns whether there was anything to delete
    pub fn delete_save_state(&self, id: SaveStateId) -> Result<bool, StorageError> {
        let transaction = self.database()?.rw_transaction()?;

        let Some(save_state) = transaction.get().primary::<SaveStateRecord>(id)? else {
            return Ok(false);
        };

        transaction.remove(save_state)?;
        transaction.commit()?;

        Ok(true)
    }

    pub fn stats(&self) -> Result<LibraryStats, StorageError> {
        let transaction = self.database()?.r_transaction()?;
        let mut stats = LibraryStats::default();

        for rom in transaction.scan().primary::<RomRecord>()?.all()? {
            let rom = rom?;
            stats.roms += 1;
            stats.payload_bytes += rom.payload.len() as u64;
        }

        for save_state in transaction.scan().primary::<SaveStateRecord>()?.all()? {
            let save_state = save_state?;
            stats.save_states += 1;
            stats.payload_bytes += save_state.payload.len() as u64;
        }

        Ok(stats)
    }
}

fn next_sequence_value(transaction: &RwTransaction, collection: &str) -> Result<u64, StorageError> {
    let next = transaction
        .get()
        .primary::<Sequence>(collection.to_string())?
        .map_or(1, |sequence| sequence.next);

    transaction.upsert(Sequence {
        collection: collection.to_string(),
        next: next + 1,
    })?;

    Ok(next)
}

fn rw_save_states_for(
    transaction: &RwTransaction,
    rom_id: RomId,
) -> Result<Vec<SaveStateRecord>, StorageError> {
    let save_states = transaction
        .scan()
        .secondary::<SaveStateRecord>(SaveStateRecordKey::rom_id)?
        .range(rom_id..=rom_id)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(save_states)
}

fn r_save_states_for(
    transaction: &RTransaction,
    rom_id: RomId,
) -> Result<Vec<SaveStateRecord>, StorageError> {
    let save_states = transaction
        .scan()
        .secondary::<SaveStateRecord>(SaveStateRecordKey::rom_id)?
        .range(rom_id..=rom_id)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(save_states)
}
