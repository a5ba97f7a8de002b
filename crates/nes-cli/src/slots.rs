//! Numbered save-state slots on disk
//!
//! Each slot is a bincode file named `<rom-stem>_slot_<n>.state` that wraps an
//! encoded machine state with the time it was written and the ROM it came from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bincode::{Decode, Encode};
use chrono::{DateTime, Local, TimeZone, Utc};
use thiserror::Error;

/// Number of slots per ROM
pub const SLOT_COUNT: u8 = 10;

/// Slot error types
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot {0} is out of range (0-9)")]
    InvalidSlot(u8),
    #[error("slot {0} is empty")]
    Empty(u8),
    #[error("slot I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode slot file: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode slot file: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// On-disk slot contents
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SlotFile {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub rom_name: String,
    pub state: Vec<u8>,
}

impl SlotFile {
    /// Local time the slot was written, if the timestamp is representable
    pub fn saved_at(&self) -> Option<DateTime<Local>> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .map(|time| time.with_timezone(&Local))
    }
}

/// Slot directory bound to one ROM
#[derive(Debug, Clone)]
pub struct SlotManager {
    dir: PathBuf,
    rom_name: String,
}

impl SlotManager {
    pub fn new(dir: impl Into<PathBuf>, rom_path: &Path) -> Self {
        let rom_name = rom_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rom".to_string());
        Self {
            dir: dir.into(),
            rom_name,
        }
    }

    pub fn rom_name(&self) -> &str {
        &self.rom_name
    }

    pub fn path(&self, slot: u8) -> Result<PathBuf, SlotError> {
        if slot >= SLOT_COUNT {
            return Err(SlotError::InvalidSlot(slot));
        }
        Ok(self
            .dir
            .join(format!("{}_slot_{}.state", self.rom_name, slot)))
    }

    /// Write `state` into a slot, replacing what was there
    pub fn save(&self, slot: u8, state: Vec<u8>) -> Result<(), SlotError> {
        let path = self.path(slot)?;
        let file = SlotFile {
            timestamp: Utc::now().timestamp_millis(),
            rom_name: self.rom_name.clone(),
            state,
        };
        let bytes = bincode::encode_to_vec(&file, bincode::config::standard())?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, bytes)?;
        log::info!("saved slot {} to {}", slot, path.display());
        Ok(())
    }

    pub fn load(&self, slot: u8) -> Result<SlotFile, SlotError> {
        let path = self.path(slot)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SlotError::Empty(slot))
            }
            Err(err) => return Err(err.into()),
        };
        let (file, _): (SlotFile, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        if file.rom_name != self.rom_name {
            log::warn!(
                "slot {} was written for {}, not {}",
                slot,
                file.rom_name,
                self.rom_name
            );
        }
        Ok(file)
    }

    pub fn delete(&self, slot: u8) -> Result<(), SlotError> {
        match fs::remove_file(self.path(slot)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(SlotError::Empty(slot)),
            Err(err) => Err(err.into()),
        }
    }

    /// Occupied slots in ascending order. Unreadable files are skipped.
    pub fn list(&self) -> Vec<(u8, SlotFile)> {
        (0..SLOT_COUNT)
            .filter_map(|slot| match self.load(slot) {
                Ok(file) => Some((slot, file)),
                Err(SlotError::Empty(_)) => None,
                Err(err) => {
                    log::warn!("skipping slot {}: {}", slot, err);
                    None
                }
            })
            .collect()
    }
}
