//! Helpers for building iNES images in tests

#![allow(dead_code)]

pub const PRG_BANK: usize = 16 * 1024;
pub const CHR_BANK: usize = 8 * 1024;

/// Image builder with NOP-filled PRG and every vector pointing at $8000
pub struct RomBuilder {
    mapper: u8,
    flags_6: u8,
    prg: Vec<u8>,
    chr: Vec<u8>,
}

impl RomBuilder {
    pub fn new(mapper: u8, prg_banks: usize, chr_banks: usize) -> Self {
        let mut prg = vec![0xEA; prg_banks * PRG_BANK];
        let len = prg.len();
        for vector in [len - 6, len - 4, len - 2] {
            prg[vector] = 0x00;
            prg[vector + 1] = 0x80;
        }
        Self {
            mapper,
            flags_6: 0,
            prg,
            chr: vec![0; chr_banks * CHR_BANK],
        }
    }

    /// Place code at the start of PRG ROM ($8000 on NROM)
    pub fn program(mut self, code: &[u8]) -> Self {
        self.prg[..code.len()].copy_from_slice(code);
        self
    }

    /// Write bytes at an offset into PRG ROM
    pub fn prg_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Write bytes at an offset into CHR ROM
    pub fn chr_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.chr[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Fill each `slice`-byte chunk of CHR ROM with its index
    pub fn tag_chr(mut self, slice: usize) -> Self {
        for (i, chunk) in self.chr.chunks_mut(slice).enumerate() {
            chunk.fill(i as u8);
        }
        self
    }

    /// Tag each PRG bank of `size` bytes with its index in the first byte
    pub fn tag_prg(mut self, size: usize) -> Self {
        for (i, chunk) in self.prg.chunks_mut(size).enumerate() {
            chunk[0] = i as u8;
        }
        self
    }

    pub fn reset_vector(mut self, address: u16) -> Self {
        let len = self.prg.len();
        self.prg[len - 4] = address as u8;
        self.prg[len - 3] = (address >> 8) as u8;
        self
    }

    pub fn nmi_vector(mut self, address: u16) -> Self {
        let len = self.prg.len();
        self.prg[len - 6] = address as u8;
        self.prg[len - 5] = (address >> 8) as u8;
        self
    }

    pub fn irq_vector(mut self, address: u16) -> Self {
        let len = self.prg.len();
        self.prg[len - 2] = address as u8;
        self.prg[len - 1] = (address >> 8) as u8;
        self
    }

    pub fn vertical(mut self) -> Self {
        self.flags_6 |= 0x01;
        self
    }

    pub fn battery(mut self) -> Self {
        self.flags_6 |= 0x02;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut rom = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            (self.prg.len() / PRG_BANK) as u8,
            (self.chr.len() / CHR_BANK) as u8,
            self.flags_6 | (self.mapper << 4),
            self.mapper & 0xF0,
        ];
        rom.resize(16, 0);
        rom.extend_from_slice(&self.prg);
        rom.extend_from_slice(&self.chr);
        rom
    }
}

/// NROM-128 image running `code` from $8000
pub fn nrom(code: &[u8]) -> Vec<u8> {
    RomBuilder::new(0, 1, 1).program(code).build()
}
