//! Memory bus and mapping
//!
//! The NES memory map:
//! $0000-$07FF - 2KB Internal RAM
//! $0800-$1FFF - RAM mirroring (repeats every $0800 bytes)
//! $2000-$2007 - PPU registers
//! $2008-$3FFF - PPU register mirroring (repeats every $08 bytes)
//! $4000-$4013 - APU registers
//! $4014       - OAM DMA
//! $4015       - APU status
//! $4016-$4017 - Controllers (writes to $4017 go to the APU frame counter)
//! $4018-$5FFF - Unmapped
//! $6000-$7FFF - Cartridge PRG RAM
//! $8000-$FFFF - Cartridge PRG ROM and mapper registers
//!
//! The bus owns nothing. It is assembled from borrows of the system's parts
//! for the duration of one CPU instruction.

use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::controller::ControllerPorts;
use crate::cpu::Bus as CpuBus;
use crate::mapper::Mirroring;
use crate::ppu::{Ppu, OAM_SIZE};

/// RAM size in bytes
pub const RAM_SIZE: usize = 2048; // 2KB

/// CPU cycles the processor is halted for an OAM DMA, before alignment
pub const OAM_DMA_CYCLES: u32 = 513;

/// Value returned for reads of unmapped addresses
pub const OPEN_BUS: u8 = 0;

/// Map a nametable address ($2000-$3EFF) to an offset into 4KB of nametable memory
pub fn mirror_nametable(address: u16, mirroring: Mirroring) -> usize {
    let offset = (address as usize - 0x2000) & 0x0FFF;
    let table = offset / 0x400;
    let index = offset % 0x400;
    let physical = match mirroring {
        Mirroring::Horizontal => table / 2,
        Mirroring::Vertical => table % 2,
        Mirroring::SingleScreenLow => 0,
        Mirroring::SingleScreenHigh => 1,
        Mirroring::FourScreen => table,
    };
    physical * 0x400 + index
}

/// CPU view of the system for one instruction
pub struct SystemBus<'a> {
    ram: &'a mut [u8; RAM_SIZE],
    ppu: &'a mut Ppu,
    apu: &'a mut Apu,
    cartridge: &'a mut Cartridge,
    controllers: &'a mut ControllerPorts,
    /// CPU cycle count at the start of the instruction, for DMA alignment
    cpu_cycles: u64,
    dma_stall: u32,
}

impl<'a> SystemBus<'a> {
    pub fn new(
        ram: &'a mut [u8; RAM_SIZE],
        ppu: &'a mut Ppu,
        apu: &'a mut Apu,
        cartridge: &'a mut Cartridge,
        controllers: &'a mut ControllerPorts,
        cpu_cycles: u64,
    ) -> Self {
        Self {
            ram,
            ppu,
            apu,
            cartridge,
            controllers,
            cpu_cycles,
            dma_stall: 0,
        }
    }

    /// Stall cycles requested by OAM DMA during this instruction, clearing them
    pub fn take_dma_stall(&mut self) -> u32 {
        std::mem::take(&mut self.dma_stall)
    }

    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        for offset in 0..OAM_SIZE as u16 {
            let value = self.read(base | offset);
            self.ppu.write_oam(value);
        }
        let alignment = (self.cpu_cycles & 1) as u32;
        self.dma_stall += OAM_DMA_CYCLES + alignment;
        log::trace!("OAM DMA from ${:04X}", base);
    }
}

impl CpuBus for SystemBus<'_> {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8 {
        match address {
            // $0000-$1FFF - Internal RAM and mirrors
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize],
            // $2000-$3FFF - PPU registers and mirrors
            0x2000..=0x3FFF => self.ppu.read_register(address & 0x0007, self.cartridge),
            0x4015 => self.apu.read_status(),
            0x4016 | 0x4017 => self.controllers.read(address),
            // Write-only APU registers and unmapped I/O
            0x4000..=0x5FFF => OPEN_BUS,
            // $6000-$7FFF - Cartridge PRG RAM
            0x6000..=0x7FFF => self.cartridge.read_prg_ram(address).unwrap_or(OPEN_BUS),
            // $8000-$FFFF - Cartridge PRG ROM
            0x8000..=0xFFFF => self.cartridge.read_prg(address),
        }
    }

    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => self.ram[(address & 0x07FF) as usize] = value,
            0x2000..=0x3FFF => self.ppu.write_register(address & 0x0007, value, self.cartridge),
            0x4014 => self.oam_dma(value),
            0x4016 => self.controllers.write(value),
            0x4000..=0x4017 => self.apu.write_register(address, value),
            0x4018..=0x5FFF => {
                log::trace!("write to unmapped ${:04X} = ${:02X}", address, value);
            }
            0x6000..=0x7FFF => self.cartridge.write_prg_ram(address, value),
            // PRG ROM area writes go to the mapper
            0x8000..=0xFFFF => self.cartridge.write_prg(address, value),
        }
    }
}
