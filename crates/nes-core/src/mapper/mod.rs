//! Cartridge mappers
//!
//! Each board is a variant of the closed [`Mapper`] enum, selected from the
//! iNES mapper number at load time. Mappers only translate addresses and hold
//! bank registers; the storage itself lives in [`crate::cartridge::Cartridge`].
//!
//! Supported boards:
//! - 0: NROM
//! - 1: MMC1 (SxROM)
//! - 2: UxROM
//! - 3: CNROM
//! - 4: MMC3 (TxROM)
//! - 7: AxROM

mod axrom;
mod cnrom;
mod mmc1;
mod mmc3;
mod uxrom;

pub use axrom::Axrom;
pub use cnrom::Cnrom;
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use uxrom::Uxrom;

use bincode::{Decode, Encode};

/// Nametable mirroring arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Mirroring {
    /// $2000 = $2400, $2800 = $2C00
    Horizontal,
    /// $2000 = $2800, $2400 = $2C00
    Vertical,
    /// All four tables map to the first physical page
    SingleScreenLow,
    /// All four tables map to the second physical page
    SingleScreenHigh,
    /// Four independent tables
    FourScreen,
}

/// Cartridge board logic
#[derive(Debug, Clone, Encode, Decode)]
pub enum Mapper {
    Nrom,
    Mmc1(Mmc1),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc3(Mmc3),
    Axrom(Axrom),
}

impl Mapper {
    /// Build the mapper for an iNES mapper number, or `None` if unsupported
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Mapper::Nrom),
            1 => Some(Mapper::Mmc1(Mmc1::new())),
            2 => Some(Mapper::Uxrom(Uxrom::new())),
            3 => Some(Mapper::Cnrom(Cnrom::new())),
            4 => Some(Mapper::Mmc3(Mmc3::new())),
            7 => Some(Mapper::Axrom(Axrom::new())),
            _ => None,
        }
    }

    /// iNES mapper number
    pub fn number(&self) -> u8 {
        match self {
            Mapper::Nrom => 0,
            Mapper::Mmc1(_) => 1,
            Mapper::Uxrom(_) => 2,
            Mapper::Cnrom(_) => 3,
            Mapper::Mmc3(_) => 4,
            Mapper::Axrom(_) => 7,
        }
    }

    /// Board name for logs and dumps
    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Nrom => "NROM",
            Mapper::Mmc1(_) => "MMC1",
            Mapper::Uxrom(_) => "UxROM",
            Mapper::Cnrom(_) => "CNROM",
            Mapper::Mmc3(_) => "MMC3",
            Mapper::Axrom(_) => "AxROM",
        }
    }

    /// Translate a CPU address in $8000-$FFFF to an offset into PRG ROM
    pub fn prg_offset(&self, address: u16, prg_len: usize) -> usize {
        match self {
            Mapper::Nrom | Mapper::Cnrom(_) => (address & 0x7FFF) as usize,
            Mapper::Mmc1(m) => m.prg_offset(address, prg_len),
            Mapper::Uxrom(m) => m.prg_offset(address, prg_len),
            Mapper::Mmc3(m) => m.prg_offset(address, prg_len),
            Mapper::Axrom(m) => m.prg_offset(address, prg_len),
        }
    }

    /// Handle a CPU write to $8000-$FFFF
    pub fn write_register(&mut self, address: u16, value: u8) {
        match self {
            Mapper::Nrom => {}
            Mapper::Mmc1(m) => m.write(address, value),
            Mapper::Uxrom(m) => m.write(value),
            Mapper::Cnrom(m) => m.write(value),
            Mapper::Mmc3(m) => m.write(address, value),
            Mapper::Axrom(m) => m.write(value),
        }
    }

    /// Translate a PPU address in $0000-$1FFF to an offset into CHR memory
    pub fn chr_offset(&self, address: u16, chr_len: usize) -> usize {
        match self {
            Mapper::Nrom | Mapper::Uxrom(_) | Mapper::Axrom(_) => (address & 0x1FFF) as usize,
            Mapper::Mmc1(m) => m.chr_offset(address, chr_len),
            Mapper::Cnrom(m) => m.chr_offset(address, chr_len),
            Mapper::Mmc3(m) => m.chr_offset(address, chr_len),
        }
    }

    /// Mirroring forced by the board, if it controls mirroring itself
    pub fn mirroring(&self) -> Option<Mirroring> {
        match self {
            Mapper::Mmc1(m) => Some(m.mirroring()),
            Mapper::Mmc3(m) => Some(m.mirroring()),
            Mapper::Axrom(m) => Some(m.mirroring()),
            _ => None,
        }
    }

    /// Whether $6000-$7FFF reads reach the PRG RAM chip
    pub fn prg_ram_readable(&self) -> bool {
        match self {
            Mapper::Mmc3(m) => m.prg_ram_enabled(),
            _ => true,
        }
    }

    /// Whether $6000-$7FFF writes reach the PRG RAM chip
    pub fn prg_ram_writable(&self) -> bool {
        match self {
            Mapper::Mmc3(m) => m.prg_ram_writable(),
            _ => true,
        }
    }

    /// Clock the scanline counter (MMC3 only)
    pub fn tick_scanline(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.tick_scanline();
        }
    }

    /// Whether the board is asserting the CPU IRQ line
    pub fn irq_pending(&self) -> bool {
        match self {
            Mapper::Mmc3(m) => m.irq_pending(),
            _ => false,
        }
    }

    /// Acknowledge a pending IRQ
    pub fn clear_irq(&mut self) {
        if let Mapper::Mmc3(m) = self {
            m.clear_irq();
        }
    }
}

/// Offset of `address` inside bank `bank` of `bank_size` bytes, with the bank
/// index reduced against the number of banks `len` bytes of storage can hold.
pub(crate) fn bank_offset(bank: usize, bank_size: usize, address: u16, len: usize) -> usize {
    let count = (len / bank_size).max(1);
    (bank % count) * bank_size + (address as usize & (bank_size - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mapper_rejected() {
        assert!(Mapper::from_number(5).is_none());
        assert!(Mapper::from_number(255).is_none());
    }

    #[test]
    fn test_mapper_numbers_round_trip() {
        for number in [0, 1, 2, 3, 4, 7] {
            let mapper = Mapper::from_number(number).unwrap();
            assert_eq!(mapper.number(), number);
        }
    }

    #[test]
    fn test_nrom_mirrors_16k() {
        let mapper = Mapper::Nrom;
        let len = 16 * 1024;
        assert_eq!(mapper.prg_offset(0x8000, len) % len, 0);
        assert_eq!(mapper.prg_offset(0xC000, len) % len, 0);
        assert_eq!(mapper.prg_offset(0xFFFC, len) % len, 0x3FFC);
    }

    #[test]
    fn test_bank_offset_reduces_against_storage() {
        // Two 16K banks; bank 5 wraps to bank 1
        assert_eq!(bank_offset(5, 0x4000, 0x8001, 0x8000), 0x4001);
        // Storage smaller than one bank still yields bank 0
        assert_eq!(bank_offset(3, 0x4000, 0x8001, 0x2000), 0x0001);
    }
}
