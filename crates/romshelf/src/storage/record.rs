use super::id::{RomId, SaveStateId};
use crate::system::{strip_extension, System};
use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use native_db::native_db;
use native_db::ToKey;
use native_model::native_model;
use native_model::Model;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha1::{Digest, Sha1};

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct RomRecord {
    #[primary_key]
    pub id: RomId,
    /// File name minus its extension, editable afterwards
    #[secondary_key]
    pub name: String,
    pub filename: String,
    /// Kept as the raw tag so records outlive changes to the system table
    #[secondary_key]
    pub system: String,
    #[serde_as(as = "Bytes")]
    pub payload: Vec<u8>,
    /// Lowercase hex sha1 of the payload
    pub fingerprint: String,
    pub cover_art: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_played: Option<DateTime<Utc>>,
}

impl RomRecord {
    pub fn new(
        id: RomId,
        filename: &str,
        system: System,
        payload: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: strip_extension(filename).to_string(),
            filename: filename.to_string(),
            system: system.tag().to_string(),
            fingerprint: HEXLOWER.encode(&Sha1::digest(&payload)),
            payload,
            cover_art: None,
            created_at,
            last_played: None,
        }
    }

    pub fn system(&self) -> Option<System> {
        self.system.parse().ok()
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct SaveStateRecord {
    #[primary_key]
    pub id: SaveStateId,
    /// Not enforced by the database, the cascade in `delete_rom` keeps it honest
    #[secondary_key]
    pub rom_id: RomId,
    pub slot: u8,
    #[serde_as(as = "Bytes")]
    pub payload: Vec<u8>,
    #[serde_as(as = "Option<Bytes>")]
    pub screenshot: Option<Vec<u8>>,
    pub saved_at: DateTime<Utc>,
}

/// Next identifier to hand out for a collection, identifiers are never reused
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[native_model(id = 3, version = 1)]
#[native_db]
pub struct Sequence {
    #[primary_key]
    pub collection: String,
    pub next: u64,
}
