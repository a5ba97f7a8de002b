//! Mapper 4 (MMC3)
//!
//! Bank select at $8000 (even), bank data at $8001 (odd). R0/R1 select 2KB CHR
//! banks, R2-R5 1KB CHR banks, R6/R7 8KB PRG banks. Mirroring at $A000 (even),
//! PRG RAM enable and write protect at $A001
//! (odd), enabled and writable at power-on. IRQ latch $C000, reload $C001, disable and
//! acknowledge $E000, enable $E001.
//!
//! The scanline counter is clocked by the PPU once per rendered line rather
//! than by watching CHR address line A12.

use bincode::{Decode, Encode};

use super::{bank_offset, Mirroring};

const PRG_BANK_SIZE: usize = 0x2000;
const CHR_BANK_SIZE: usize = 0x0400;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Mmc3 {
    /// Bits 0-2 register index, bit 6 PRG mode, bit 7 CHR A12 inversion
    bank_select: u8,
    registers: [u8; 8],
    horizontal: bool,
    prg_ram_protect: u8,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
}

impl Mmc3 {
    pub fn new() -> Self {
        Self {
            prg_ram_protect: 0x80,
            ..Self::default()
        }
    }

    /// $A001 bit 7 maps the RAM chip in
    pub fn prg_ram_enabled(&self) -> bool {
        self.prg_ram_protect & 0x80 != 0
    }

    /// Bit 6 write-protects an enabled chip
    pub fn prg_ram_writable(&self) -> bool {
        self.prg_ram_protect & 0xC0 == 0x80
    }

    pub fn irq_counter(&self) -> u8 {
        self.irq_counter
    }

    pub(crate) fn write(&mut self, address: u16, value: u8) {
        let even = address & 1 == 0;
        match (address, even) {
            (0x8000..=0x9FFF, true) => self.bank_select = value,
            (0x8000..=0x9FFF, false) => {
                self.registers[(self.bank_select & 0x07) as usize] = value;
            }
            (0xA000..=0xBFFF, true) => self.horizontal = value & 1 != 0,
            (0xA000..=0xBFFF, false) => self.prg_ram_protect = value,
            (0xC000..=0xDFFF, true) => self.irq_latch = value,
            (0xC000..=0xDFFF, false) => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            (0xE000..=0xFFFF, true) => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            (0xE000..=0xFFFF, false) => self.irq_enabled = true,
            _ => {}
        }
    }

    pub(crate) fn prg_offset(&self, address: u16, prg_len: usize) -> usize {
        let count = (prg_len / PRG_BANK_SIZE).max(1);
        let last = count - 1;
        let second_last = count.saturating_sub(2);
        let r6 = (self.registers[6] & 0x3F) as usize;
        let r7 = (self.registers[7] & 0x3F) as usize;
        let swapped = self.bank_select & 0x40 != 0;

        let bank = match (address >> 13) & 0x03 {
            0 => {
                if swapped {
                    second_last
                } else {
                    r6
                }
            }
            1 => r7,
            2 => {
                if swapped {
                    r6
                } else {
                    second_last
                }
            }
            _ => last,
        };
        bank_offset(bank, PRG_BANK_SIZE, address, prg_len)
    }

    pub(crate) fn chr_offset(&self, address: u16, chr_len: usize) -> usize {
        let mut slot = ((address & 0x1FFF) / CHR_BANK_SIZE as u16) as usize;
        if self.bank_select & 0x80 != 0 {
            slot ^= 4;
        }
        let bank = match slot {
            0 => self.registers[0] & 0xFE,
            1 => self.registers[0] | 0x01,
            2 => self.registers[1] & 0xFE,
            3 => self.registers[1] | 0x01,
            n => self.registers[n - 2],
        };
        bank_offset(bank as usize, CHR_BANK_SIZE, address, chr_len)
    }

    pub fn mirroring(&self) -> Mirroring {
        if self.horizontal {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    pub(crate) fn tick_scanline(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    pub(crate) fn clear_irq(&mut self) {
        self.irq_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(latch: u8) -> Mmc3 {
        let mut mapper = Mmc3::new();
        mapper.write(0xC000, latch);
        mapper.write(0xC001, 0);
        mapper.write(0xE001, 0);
        mapper
    }

    #[test]
    fn test_irq_fires_when_counter_reaches_zero() {
        let mut mapper = armed(3);

        // Reload, then 3 -> 2 -> 1 -> 0
        mapper.tick_scanline();
        assert_eq!(mapper.irq_counter(), 3);
        mapper.tick_scanline();
        mapper.tick_scanline();
        assert!(!mapper.irq_pending());
        mapper.tick_scanline();
        assert!(mapper.irq_pending());
    }

    #[test]
    fn test_irq_stays_pending_until_acknowledged() {
        let mut mapper = armed(1);
        mapper.tick_scanline();
        mapper.tick_scanline();
        assert!(mapper.irq_pending());

        mapper.tick_scanline();
        assert!(mapper.irq_pending());

        mapper.write(0xE000, 0);
        assert!(!mapper.irq_pending());

        // Disabled: counting continues but nothing fires
        for _ in 0..4 {
            mapper.tick_scanline();
        }
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn test_prg_mode_swap() {
        let mut mapper = Mmc3::new();
        let len = 8 * PRG_BANK_SIZE;
        mapper.write(0x8000, 6);
        mapper.write(0x8001, 3);

        assert_eq!(mapper.prg_offset(0x8000, len), 3 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xC000, len), 6 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xE000, len), 7 * PRG_BANK_SIZE);

        mapper.write(0x8000, 0x46);
        assert_eq!(mapper.prg_offset(0x8000, len), 6 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xC000, len), 3 * PRG_BANK_SIZE);
    }

    #[test]
    fn test_chr_inversion() {
        let mut mapper = Mmc3::new();
        let len = 32 * CHR_BANK_SIZE;
        mapper.write(0x8000, 0);
        mapper.write(0x8001, 4);
        mapper.write(0x8000, 2);
        mapper.write(0x8001, 9);

        assert_eq!(mapper.chr_offset(0x0400, len), 5 * CHR_BANK_SIZE);
        assert_eq!(mapper.chr_offset(0x1000, len), 9 * CHR_BANK_SIZE);

        mapper.write(0x8000, 0x80);
        assert_eq!(mapper.chr_offset(0x0000, len), 9 * CHR_BANK_SIZE);
        assert_eq!(mapper.chr_offset(0x1400, len), 5 * CHR_BANK_SIZE);
    }
}
