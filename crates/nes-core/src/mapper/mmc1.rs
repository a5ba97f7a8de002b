//! Mapper 1 (MMC1)
//!
//! Registers are loaded one bit at a time through a 5-bit serial shift
//! register, LSB first. The fifth write commits the assembled value to the
//! register selected by address bits 14-13:
//! - $8000-$9FFF: control (mirroring, PRG mode, CHR mode)
//! - $A000-$BFFF: CHR bank 0
//! - $C000-$DFFF: CHR bank 1
//! - $E000-$FFFF: PRG bank
//!
//! Any write with bit 7 set resets the shift register and forces PRG mode 3.

use bincode::{Decode, Encode};

use super::{bank_offset, Mirroring};

const PRG_BANK_SIZE: usize = 0x4000;
const CHR_BANK_SIZE: usize = 0x1000;
const SHIFT_RESET: u8 = 0x10;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Mmc1 {
    /// Serial load register; the marker bit reaches bit 0 on the fifth write
    shift: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
}

impl Mmc1 {
    pub fn new() -> Self {
        Self {
            shift: SHIFT_RESET,
            control: 0x0C,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        }
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn chr_bank_0(&self) -> u8 {
        self.chr_bank_0
    }

    pub fn chr_bank_1(&self) -> u8 {
        self.chr_bank_1
    }

    pub fn prg_bank(&self) -> u8 {
        self.prg_bank
    }

    pub(crate) fn write(&mut self, address: u16, value: u8) {
        if value & 0x80 != 0 {
            self.shift = SHIFT_RESET;
            self.control |= 0x0C;
            return;
        }

        let complete = self.shift & 1 != 0;
        self.shift = (self.shift >> 1) | ((value & 1) << 4);

        if complete {
            let data = self.shift;
            match (address >> 13) & 0x03 {
                0 => {
                    self.control = data;
                    log::debug!("MMC1 control {:05b}", data);
                }
                1 => self.chr_bank_0 = data,
                2 => self.chr_bank_1 = data,
                _ => self.prg_bank = data,
            }
            self.shift = SHIFT_RESET;
        }
    }

    pub(crate) fn prg_offset(&self, address: u16, prg_len: usize) -> usize {
        let count = (prg_len / PRG_BANK_SIZE).max(1);
        let bank = (self.prg_bank & 0x0F) as usize;
        let upper = address >= 0xC000;

        let selected = match (self.control >> 2) & 0x03 {
            // 32KB mode ignores the low bank bit
            0 | 1 => (bank & !1) | upper as usize,
            2 => {
                if upper {
                    bank
                } else {
                    0
                }
            }
            _ => {
                if upper {
                    count - 1
                } else {
                    bank
                }
            }
        };
        bank_offset(selected, PRG_BANK_SIZE, address, prg_len)
    }

    pub(crate) fn chr_offset(&self, address: u16, chr_len: usize) -> usize {
        let upper = address >= 0x1000;
        let bank = if self.control & 0x10 == 0 {
            ((self.chr_bank_0 & !1) | upper as u8) as usize
        } else if upper {
            self.chr_bank_1 as usize
        } else {
            self.chr_bank_0 as usize
        };
        bank_offset(bank, CHR_BANK_SIZE, address, chr_len)
    }

    pub fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLow,
            1 => Mirroring::SingleScreenHigh,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }
}

impl Default for Mmc1 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial_write(mapper: &mut Mmc1, address: u16, value: u8) {
        for bit in 0..5 {
            mapper.write(address, (value >> bit) & 1);
        }
    }

    #[test]
    fn test_five_writes_assemble_lsb_first() {
        let mut mapper = Mmc1::new();
        serial_write(&mut mapper, 0xA000, 0b10110);
        assert_eq!(mapper.chr_bank_0(), 0b10110);
        assert_eq!(mapper.prg_bank(), 0);
    }

    #[test]
    fn test_fifth_write_address_selects_register() {
        let mut mapper = Mmc1::new();
        for bit in 0..4 {
            mapper.write(0x8000, (0b00011 >> bit) & 1);
        }
        // Final write lands in $E000-$FFFF
        mapper.write(0xE000, 0);
        assert_eq!(mapper.prg_bank(), 0b00011);
        assert_eq!(mapper.control(), 0x0C);
    }

    #[test]
    fn test_reset_write_clears_shift() {
        let mut mapper = Mmc1::new();
        mapper.write(0x8000, 1);
        mapper.write(0x8000, 1);
        mapper.write(0x8000, 0x80);
        serial_write(&mut mapper, 0xC000, 0b00101);
        assert_eq!(mapper.chr_bank_1(), 0b00101);
    }

    #[test]
    fn test_reset_write_restores_fix_last_mode() {
        let mut mapper = Mmc1::new();
        let len = 8 * PRG_BANK_SIZE;
        // PRG mode 0: 32KB switching ignores bit 0 of the bank
        serial_write(&mut mapper, 0x8000, 0b00000);
        serial_write(&mut mapper, 0xE000, 5);
        assert_eq!(mapper.prg_offset(0x8000, len), 4 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xC000, len), 5 * PRG_BANK_SIZE);

        mapper.write(0x8000, 0x80);
        assert_eq!(mapper.control() & 0x0C, 0x0C);
        assert_eq!(mapper.prg_offset(0x8000, len), 5 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xC000, len), 7 * PRG_BANK_SIZE);
    }

    #[test]
    fn test_prg_mode_fix_last() {
        let mut mapper = Mmc1::new();
        serial_write(&mut mapper, 0xE000, 2);
        let len = 8 * PRG_BANK_SIZE;
        assert_eq!(mapper.prg_offset(0x8000, len), 2 * PRG_BANK_SIZE);
        assert_eq!(mapper.prg_offset(0xC000, len), 7 * PRG_BANK_SIZE);
    }

    #[test]
    fn test_mirroring_from_control() {
        let mut mapper = Mmc1::new();
        serial_write(&mut mapper, 0x8000, 0b01110);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
        serial_write(&mut mapper, 0x8000, 0b01111);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
    }
}
