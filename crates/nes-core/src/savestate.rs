//! Save states
//!
//! A [`Snapshot`] holds every piece of mutable machine state. It is encoded
//! with bincode's standard configuration; ROM data is not included, so a
//! snapshot can only be restored onto a cartridge of the same shape.

use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use thiserror::Error;

use crate::apu::Apu;
use crate::bus::RAM_SIZE;
use crate::cartridge::CartridgeState;
use crate::controller::ControllerPorts;
use crate::cpu::Cpu;
use crate::ppu::Ppu;

/// Bumped whenever the snapshot layout changes
pub const STATE_VERSION: u32 = 1;

/// Save state error types
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to encode state: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to decode state: {0}")]
    Decode(#[from] DecodeError),
    #[error("state version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("state was captured from a different cartridge")]
    CartridgeMismatch,
    #[error("state is malformed: {0}")]
    Malformed(&'static str),
}

/// Complete machine state
#[derive(Debug, Clone, Encode, Decode)]
pub struct Snapshot {
    pub version: u32,
    pub cpu: Cpu,
    pub ram: [u8; RAM_SIZE],
    pub ppu: Ppu,
    pub apu: Apu,
    pub cartridge: CartridgeState,
    pub controllers: ControllerPorts,
    /// CPU cycles left before the next instruction starts
    pub wait_cycles: u32,
    pub frame_count: u64,
    pub paused: bool,
}

impl Snapshot {
    /// Encode to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Decode from bytes, rejecting other layout versions
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        // The version is the first field; check it before the rest of the layout
        let (version, _): (u32, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        if version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                found: version,
                expected: STATE_VERSION,
            });
        }
        let (snapshot, _): (Self, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn blank_snapshot() -> Snapshot {
        Snapshot {
            version: STATE_VERSION,
            cpu: Cpu::new(),
            ram: [0; RAM_SIZE],
            ppu: Ppu::new(),
            apu: Apu::new(44_100),
            cartridge: Cartridge::empty().capture_state(),
            controllers: ControllerPorts::new(),
            wait_cycles: 0,
            frame_count: 0,
            paused: false,
        }
    }

    #[test]
    fn test_snapshot_bytes_roundtrip() {
        let mut snapshot = blank_snapshot();
        snapshot.ram[0x123] = 0x45;
        snapshot.frame_count = 7;

        let bytes = snapshot.to_bytes().unwrap();
        let decoded = Snapshot::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.ram[0x123], 0x45);
        assert_eq!(decoded.frame_count, 7);
    }

    #[test]
    fn test_version_mismatch() {
        let mut snapshot = blank_snapshot();
        snapshot.version = STATE_VERSION + 1;
        let bytes = snapshot.to_bytes().unwrap();
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(StateError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_bytes() {
        let bytes = blank_snapshot().to_bytes().unwrap();
        assert!(matches!(
            Snapshot::from_bytes(&bytes[..bytes.len() / 2]),
            Err(StateError::Decode(_))
        ));
    }
}
