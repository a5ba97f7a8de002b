//! Cartridge loading and storage
//!
//! This module parses iNES images and owns the cartridge memories. Address
//! translation is delegated to the board's [`Mapper`].

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::mapper::{Mapper, Mirroring};

/// iNES header size
pub const HEADER_SIZE: usize = 16;
/// Trainer size, present when flags 6 bit 2 is set
pub const TRAINER_SIZE: usize = 512;
/// PRG ROM unit size
pub const PRG_UNIT: usize = 16 * 1024;
/// CHR ROM unit size
pub const CHR_UNIT: usize = 8 * 1024;
/// PRG RAM size at $6000-$7FFF
pub const PRG_RAM_SIZE: usize = 8 * 1024;
/// CHR RAM size when the image has no CHR ROM
pub const CHR_RAM_SIZE: usize = 8 * 1024;

const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];

/// Cartridge error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("ROM image too short for an iNES header ({0} bytes)")]
    TooShort(usize),
    #[error("invalid iNES magic")]
    InvalidMagic,
    #[error("iNES header declares {declared} bytes but image holds {available}")]
    Truncated { declared: usize, available: usize },
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
}

/// iNES header structure
#[derive(Debug, Clone, Default)]
pub struct InesHeader {
    /// PRG ROM size in 16KB units
    pub prg_rom_size: u8,
    /// CHR ROM size in 8KB units
    pub chr_rom_size: u8,
    /// Flags 6
    pub flags_6: u8,
    /// Flags 7
    pub flags_7: u8,
}

impl InesHeader {
    /// Parse an iNES header from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::TooShort(bytes.len()));
        }
        if bytes[0..4] != MAGIC {
            return Err(CartridgeError::InvalidMagic);
        }

        Ok(Self {
            prg_rom_size: bytes[4],
            chr_rom_size: bytes[5],
            flags_6: bytes[6],
            flags_7: bytes[7],
        })
    }

    /// Get the mapper number from flags
    pub fn mapper_number(&self) -> u8 {
        (self.flags_6 >> 4) | (self.flags_7 & 0xF0)
    }

    /// Check if trainer is present
    pub fn has_trainer(&self) -> bool {
        (self.flags_6 & 0x04) != 0
    }

    /// Check if PRG RAM is battery backed
    pub fn has_battery(&self) -> bool {
        (self.flags_6 & 0x02) != 0
    }

    /// Check if the board provides four nametables
    pub fn four_screen(&self) -> bool {
        (self.flags_6 & 0x08) != 0
    }

    /// Solder-pad mirroring
    pub fn mirroring(&self) -> Mirroring {
        if self.four_screen() {
            Mirroring::FourScreen
        } else if (self.flags_6 & 0x01) != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    /// Total image size this header requires
    pub fn image_size(&self) -> usize {
        let trainer = if self.has_trainer() { TRAINER_SIZE } else { 0 };
        HEADER_SIZE
            + trainer
            + self.prg_rom_size as usize * PRG_UNIT
            + self.chr_rom_size as usize * CHR_UNIT
    }
}

/// Mutable cartridge state captured in save states
#[derive(Debug, Clone, Encode, Decode)]
pub struct CartridgeState {
    pub mapper: Mapper,
    pub prg_ram: Vec<u8>,
    pub chr_ram: Option<Vec<u8>>,
}

/// Cartridge structure
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: InesHeader,
    prg_rom: Vec<u8>,
    /// CHR ROM, or CHR RAM when `chr_is_ram`
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    mapper: Mapper,
}

impl Cartridge {
    /// Create a new cartridge from iNES ROM data
    pub fn from_rom(rom_data: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(rom_data)?;

        let declared = header.image_size();
        if declared > rom_data.len() {
            return Err(CartridgeError::Truncated {
                declared,
                available: rom_data.len(),
            });
        }

        let mapper = Mapper::from_number(header.mapper_number())
            .ok_or(CartridgeError::UnsupportedMapper(header.mapper_number()))?;

        let mut offset = HEADER_SIZE;
        if header.has_trainer() {
            offset += TRAINER_SIZE;
        }

        let prg_rom_size = header.prg_rom_size as usize * PRG_UNIT;
        let prg_rom = rom_data[offset..offset + prg_rom_size].to_vec();
        offset += prg_rom_size;

        let chr_rom_size = header.chr_rom_size as usize * CHR_UNIT;
        let (chr, chr_is_ram) = if chr_rom_size == 0 {
            (vec![0; CHR_RAM_SIZE], true)
        } else {
            (rom_data[offset..offset + chr_rom_size].to_vec(), false)
        };

        log::debug!(
            "cartridge: mapper {} ({}), PRG {}KB, CHR {}KB{}, {:?}",
            mapper.number(),
            mapper.name(),
            prg_rom.len() / 1024,
            chr.len() / 1024,
            if chr_is_ram { " RAM" } else { "" },
            header.mirroring()
        );

        Ok(Self {
            header,
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; PRG_RAM_SIZE],
            mapper,
        })
    }

    /// An empty NROM board with CHR RAM, used before any image is loaded
    pub fn empty() -> Self {
        Self {
            header: InesHeader::default(),
            prg_rom: Vec::new(),
            chr: vec![0; CHR_RAM_SIZE],
            chr_is_ram: true,
            prg_ram: vec![0; PRG_RAM_SIZE],
            mapper: Mapper::Nrom,
        }
    }

    /// Get the iNES header
    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    /// Get PRG ROM data
    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    /// Get CHR ROM (or RAM) data
    pub fn chr(&self) -> &[u8] {
        &self.chr
    }

    pub fn chr_is_ram(&self) -> bool {
        self.chr_is_ram
    }

    /// Get mapper
    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn has_battery(&self) -> bool {
        self.header.has_battery()
    }

    /// Effective nametable mirroring
    pub fn mirroring(&self) -> Mirroring {
        if self.header.four_screen() {
            return Mirroring::FourScreen;
        }
        self.mapper
            .mirroring()
            .unwrap_or_else(|| self.header.mirroring())
    }

    /// Read from PRG ROM ($8000-$FFFF)
    pub fn read_prg(&self, address: u16) -> u8 {
        let len = self.prg_rom.len();
        if len == 0 {
            return 0;
        }
        self.prg_rom[self.mapper.prg_offset(address, len) % len]
    }

    /// CPU write to $8000-$FFFF
    pub fn write_prg(&mut self, address: u16, value: u8) {
        self.mapper.write_register(address, value);
    }

    /// Read from PRG RAM ($6000-$7FFF), `None` while the board has it disabled
    pub fn read_prg_ram(&self, address: u16) -> Option<u8> {
        if !self.mapper.prg_ram_readable() {
            return None;
        }
        Some(self.prg_ram[(address as usize - 0x6000) % PRG_RAM_SIZE])
    }

    /// Write to PRG RAM ($6000-$7FFF), dropped while write-protected
    pub fn write_prg_ram(&mut self, address: u16, value: u8) {
        if self.mapper.prg_ram_writable() {
            self.prg_ram[(address as usize - 0x6000) % PRG_RAM_SIZE] = value;
        }
    }

    /// Read from CHR ($0000-$1FFF in PPU space)
    pub fn read_chr(&self, address: u16) -> u8 {
        let len = self.chr.len();
        if len == 0 {
            return 0;
        }
        self.chr[self.mapper.chr_offset(address, len) % len]
    }

    /// Write to CHR; ignored for CHR ROM
    pub fn write_chr(&mut self, address: u16, value: u8) {
        let len = self.chr.len();
        if !self.chr_is_ram || len == 0 {
            return;
        }
        let offset = self.mapper.chr_offset(address, len) % len;
        self.chr[offset] = value;
    }

    pub fn tick_scanline(&mut self) {
        self.mapper.tick_scanline();
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub fn clear_irq(&mut self) {
        self.mapper.clear_irq();
    }

    /// Battery-backed PRG RAM contents
    pub fn prg_ram(&self) -> &[u8] {
        &self.prg_ram
    }

    /// Restore PRG RAM from a battery save; extra bytes are ignored
    pub fn load_prg_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.prg_ram.len());
        self.prg_ram[..len].copy_from_slice(&data[..len]);
    }

    pub fn capture_state(&self) -> CartridgeState {
        CartridgeState {
            mapper: self.mapper.clone(),
            prg_ram: self.prg_ram.clone(),
            chr_ram: self.chr_is_ram.then(|| self.chr.clone()),
        }
    }

    /// Whether a captured state was taken from a board shaped like this one
    pub fn accepts_state(&self, state: &CartridgeState) -> bool {
        state.mapper.number() == self.mapper.number()
            && state.prg_ram.len() == self.prg_ram.len()
            && match &state.chr_ram {
                Some(chr) => self.chr_is_ram && chr.len() == self.chr.len(),
                None => !self.chr_is_ram,
            }
    }

    pub fn restore_state(&mut self, state: CartridgeState) {
        self.mapper = state.mapper;
        self.prg_ram = state.prg_ram;
        if let Some(chr) = state.chr_ram {
            self.chr = chr;
        }
    }
}

impl Default for Cartridge {
    fn default() -> Self {
        Self::empty()
    }
}
