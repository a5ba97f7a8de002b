//! Mapper 7 (AxROM): 32KB PRG banks and single-screen mirroring.

use bincode::{Decode, Encode};

use super::{bank_offset, Mirroring};

const PRG_BANK_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Axrom {
    bank: u8,
    high_page: bool,
}

impl Axrom {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write(&mut self, value: u8) {
        self.bank = value & 0x07;
        self.high_page = value & 0x10 != 0;
    }

    pub(crate) fn prg_offset(&self, address: u16, prg_len: usize) -> usize {
        bank_offset(self.bank as usize, PRG_BANK_SIZE, address, prg_len)
    }

    pub fn mirroring(&self) -> Mirroring {
        if self.high_page {
            Mirroring::SingleScreenHigh
        } else {
            Mirroring::SingleScreenLow
        }
    }
}
