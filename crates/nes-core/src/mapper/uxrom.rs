//! Mapper 2 (UxROM): switchable 16KB bank at $8000, last bank fixed at $C000.

use bincode::{Decode, Encode};

use super::bank_offset;

const PRG_BANK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Uxrom {
    bank: u8,
}

impl Uxrom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected bank at $8000
    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub(crate) fn write(&mut self, value: u8) {
        self.bank = value;
        log::trace!("UxROM bank select {}", value);
    }

    pub(crate) fn prg_offset(&self, address: u16, prg_len: usize) -> usize {
        let last = (prg_len / PRG_BANK_SIZE).max(1) - 1;
        let bank = if address < 0xC000 { self.bank as usize } else { last };
        bank_offset(bank, PRG_BANK_SIZE, address, prg_len)
    }
}
