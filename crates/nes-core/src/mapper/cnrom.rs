//! Mapper 3 (CNROM): fixed PRG, switchable 8KB CHR bank.

use bincode::{Decode, Encode};

use super::bank_offset;

const CHR_BANK_SIZE: usize = 0x2000;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Cnrom {
    chr_bank: u8,
}

impl Cnrom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chr_bank(&self) -> u8 {
        self.chr_bank
    }

    pub(crate) fn write(&mut self, value: u8) {
        self.chr_bank = value;
    }

    pub(crate) fn chr_offset(&self, address: u16, chr_len: usize) -> usize {
        bank_offset(self.chr_bank as usize, CHR_BANK_SIZE, address, chr_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chr_bank_select() {
        let mut mapper = Cnrom::new();
        mapper.write(1);
        assert_eq!(mapper.chr_offset(0x0123, 4 * CHR_BANK_SIZE), CHR_BANK_SIZE + 0x123);
        mapper.write(5);
        assert_eq!(mapper.chr_offset(0x0000, 4 * CHR_BANK_SIZE), CHR_BANK_SIZE);
    }
}
