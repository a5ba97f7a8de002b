//! PPU (Picture Processing Unit) implementation
//!
//! Timing follows the NTSC 2C02 frame: 341 dots per scanline, 262 scanlines.
//! - Scanlines 0-239: visible, one pixel per dot 0-255
//! - Scanline 240: idle
//! - Scanlines 241-260: VBlank (flag and NMI raised at dot 1 of 241)
//! - Scanline 261: pre-render, reloads vertical scroll and clears status flags
//!
//! Scrolling uses the shared 15-bit `v`/`t` address registers, fine X, and
//! the first/second write toggle:
//!
//! ```text
//! yyy NN YYYYY XXXXX
//! ||| || ||||| +++++-- coarse X scroll
//! ||| || +++++-------- coarse Y scroll
//! ||| ++-------------- nametable select
//! +++----------------- fine Y scroll
//! ```

use bincode::{Decode, Encode};

use crate::bus::mirror_nametable;
use crate::cartridge::Cartridge;
use crate::config::{DOTS_PER_SCANLINE, SCANLINES_PER_FRAME};

/// PPU memory map
pub const VRAM_SIZE: usize = 16384; // 16KB
pub const PALETTE_SIZE: usize = 32;  // 32 bytes (8 palettes x 4 colors each)
pub const OAM_SIZE: usize = 256;     // Object Attribute Memory

/// Output frame dimensions
pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;
/// Frame buffer size in bytes (RGB)
pub const FRAME_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 3;

/// Sprites drawn per scanline
pub const SPRITES_PER_LINE: usize = 8;

const VBLANK_LINE: u16 = 241;
const PRE_RENDER_LINE: u16 = SCANLINES_PER_FRAME - 1;
const LAST_DOT: u16 = DOTS_PER_SCANLINE - 1;

/// NES color palette (6-bit values converted to 8-bit RGB)
pub const NES_PALETTE: [(u8, u8, u8); 64] = [
    (84, 84, 84), (0, 30, 116), (8, 16, 144), (48, 0, 136), (68, 0, 100), (92, 0, 48), (84, 4, 0), (60, 24, 0),
    (32, 42, 0), (8, 58, 0), (0, 64, 0), (0, 60, 0), (0, 50, 60), (0, 0, 0), (0, 0, 0), (0, 0, 0),
    (152, 150, 152), (8, 76, 196), (48, 50, 236), (92, 30, 228), (136, 20, 176), (160, 20, 100), (152, 34, 32), (120, 60, 0),
    (84, 90, 0), (40, 114, 0), (8, 124, 0), (0, 118, 40), (0, 102, 120), (0, 0, 0), (0, 0, 0), (0, 0, 0),
    (236, 238, 236), (76, 154, 236), (120, 124, 236), (176, 98, 236), (228, 84, 236), (236, 88, 180), (236, 106, 100), (212, 136, 32),
    (160, 170, 0), (116, 196, 0), (76, 208, 32), (56, 204, 108), (56, 180, 204), (60, 60, 60), (0, 0, 0), (0, 0, 0),
    (236, 238, 236), (168, 204, 236), (188, 188, 236), (212, 178, 236), (236, 174, 236), (236, 174, 212), (236, 180, 176), (228, 196, 144),
    (204, 210, 120), (180, 222, 120), (168, 226, 144), (152, 226, 180), (160, 214, 228), (160, 162, 160), (0, 0, 0), (0, 0, 0),
];

/// PPU control flags ($2000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PpuCtrl(u8);

impl PpuCtrl {
    pub const NMI_ENABLE: u8 = 0b10000000;
    pub const MASTER_SLAVE: u8 = 0b01000000;
    pub const SPRITE_SIZE: u8 = 0b00100000;
    pub const BG_PATTERN_TABLE: u8 = 0b00010000;
    pub const SPR_PATTERN_TABLE: u8 = 0b00001000;
    pub const VRAM_INC: u8 = 0b00000100;
    pub const NAMETABLE: u8 = 0b00000011;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn nmi_enable(&self) -> bool {
        (self.0 & Self::NMI_ENABLE) != 0
    }

    /// 8x16 sprites
    pub fn tall_sprites(&self) -> bool {
        (self.0 & Self::SPRITE_SIZE) != 0
    }

    pub fn sprite_height(&self) -> i16 {
        if self.tall_sprites() {
            16
        } else {
            8
        }
    }

    pub fn background_table(&self) -> u16 {
        if (self.0 & Self::BG_PATTERN_TABLE) != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn sprite_table(&self) -> u16 {
        if (self.0 & Self::SPR_PATTERN_TABLE) != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn vram_increment(&self) -> u16 {
        if (self.0 & Self::VRAM_INC) != 0 {
            32
        } else {
            1
        }
    }

    pub fn nametable(&self) -> u8 {
        self.0 & Self::NAMETABLE
    }
}

/// PPU status flags ($2002)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PpuStatus(u8);

impl PpuStatus {
    pub const VBLANK: u8 = 0b10000000;
    pub const SPRITE_ZERO_HIT: u8 = 0b01000000;
    pub const SPRITE_OVERFLOW: u8 = 0b00100000;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn vblank(&self) -> bool {
        (self.0 & Self::VBLANK) != 0
    }

    pub fn sprite_zero_hit(&self) -> bool {
        (self.0 & Self::SPRITE_ZERO_HIT) != 0
    }

    pub fn sprite_overflow(&self) -> bool {
        (self.0 & Self::SPRITE_OVERFLOW) != 0
    }

    fn set(&mut self, mask: u8, val: bool) {
        self.0 = if val { self.0 | mask } else { self.0 & !mask };
    }
}

/// PPU render mask flags ($2001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PpuMask(u8);

impl PpuMask {
    pub const GRAYSCALE: u8 = 0b00000001;
    pub const SHOW_BG_LEFT: u8 = 0b00000010;
    pub const SHOW_SPR_LEFT: u8 = 0b00000100;
    pub const SHOW_BG: u8 = 0b00001000;
    pub const SHOW_SPR: u8 = 0b00010000;
    pub const EMPHASIZE_RED: u8 = 0b00100000;
    pub const EMPHASIZE_GREEN: u8 = 0b01000000;
    pub const EMPHASIZE_BLUE: u8 = 0b10000000;

    pub fn new(val: u8) -> Self {
        Self(val)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn grayscale(&self) -> bool {
        (self.0 & Self::GRAYSCALE) != 0
    }

    pub fn show_background(&self) -> bool {
        (self.0 & Self::SHOW_BG) != 0
    }

    pub fn show_sprites(&self) -> bool {
        (self.0 & Self::SHOW_SPR) != 0
    }

    pub fn show_background_left(&self) -> bool {
        (self.0 & Self::SHOW_BG_LEFT) != 0
    }

    pub fn show_sprites_left(&self) -> bool {
        (self.0 & Self::SHOW_SPR_LEFT) != 0
    }

    /// Either layer enabled; scroll and sprite logic only run when set
    pub fn rendering_enabled(&self) -> bool {
        (self.0 & (Self::SHOW_BG | Self::SHOW_SPR)) != 0
    }
}

/// A sprite selected for the current scanline, with its pattern row fetched
#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
struct SpriteSlot {
    x: u8,
    attributes: u8,
    /// Pattern planes, already flipped horizontally if requested
    low: u8,
    high: u8,
    is_sprite_zero: bool,
}

/// Palette RAM index with the $3F10/$3F14/$3F18/$3F1C mirrors folded
fn palette_index(address: u16) -> usize {
    let index = (address & 0x1F) as usize;
    if index & 0x13 == 0x10 {
        index & 0x0F
    } else {
        index
    }
}

/// PPU internal state
#[derive(Debug, Clone, Encode, Decode)]
pub struct Ppu {
    /// Video memory; nametables live at $2000-$2FFF
    vram: Vec<u8>,
    palette: [u8; PALETTE_SIZE],
    oam: Vec<u8>,
    control: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    oam_addr: u8,
    /// Current VRAM address
    v: u16,
    /// Temporary VRAM address
    t: u16,
    fine_x: u8,
    /// Write toggle for PPUSCROLL and PPUADDR
    write_toggle: bool,
    /// Read buffer (for PPUDATA)
    read_buffer: u8,
    /// Last value written to any register; returned by write-only registers
    io_latch: u8,
    /// Dot position (0-340)
    dot: u16,
    /// Scanline position (0-261)
    scanline: u16,
    frame_ready: bool,
    nmi_pending: bool,
    frame_count: u64,
    sprites: Vec<SpriteSlot>,
    frame: Vec<u8>,
}

impl Ppu {
    /// Create a new PPU instance
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_SIZE],
            palette: [0; PALETTE_SIZE],
            oam: vec![0; OAM_SIZE],
            control: PpuCtrl::new(0),
            mask: PpuMask::new(0),
            status: PpuStatus::new(0),
            oam_addr: 0,
            v: 0,
            t: 0,
            fine_x: 0,
            write_toggle: false,
            read_buffer: 0,
            io_latch: 0,
            dot: 0,
            scanline: 0,
            frame_ready: false,
            nmi_pending: false,
            frame_count: 0,
            sprites: Vec::with_capacity(SPRITES_PER_LINE),
            frame: vec![0; FRAME_SIZE],
        }
    }

    /// Reset the PPU
    pub fn reset(&mut self) {
        self.vram.fill(0);
        self.palette = [0; PALETTE_SIZE];
        self.oam.fill(0);
        self.control = PpuCtrl::new(0);
        self.mask = PpuMask::new(0);
        self.status = PpuStatus::new(0);
        self.oam_addr = 0;
        self.v = 0;
        self.t = 0;
        self.fine_x = 0;
        self.write_toggle = false;
        self.read_buffer = 0;
        self.io_latch = 0;
        self.dot = 0;
        self.scanline = 0;
        self.frame_ready = false;
        self.nmi_pending = false;
        self.frame_count = 0;
        self.sprites.clear();
        self.frame.fill(0);
    }

    /// Whether memories and timing counters have the shapes the PPU indexes by.
    /// Decoded save states are checked with this before use.
    pub fn is_consistent(&self) -> bool {
        self.vram.len() == VRAM_SIZE
            && self.oam.len() == OAM_SIZE
            && self.frame.len() == FRAME_SIZE
            && self.sprites.len() <= SPRITES_PER_LINE
            && self.dot <= LAST_DOT
            && self.scanline <= PRE_RENDER_LINE
    }

    #[cfg(test)]
    pub(crate) fn frame_storage_mut(&mut self) -> &mut Vec<u8> {
        &mut self.frame
    }

    /// Step the PPU by one dot
    pub fn step(&mut self, cart: &mut Cartridge) {
        let rendering = self.mask.rendering_enabled();

        match self.scanline {
            0..=239 => self.visible_dot(cart, rendering),
            VBLANK_LINE if self.dot == 1 => {
                self.status.set(PpuStatus::VBLANK, true);
                if self.control.nmi_enable() {
                    self.nmi_pending = true;
                }
            }
            PRE_RENDER_LINE => {
                if rendering {
                    match self.dot {
                        256 => self.increment_y(),
                        257 => self.copy_horizontal(),
                        280..=304 => self.copy_vertical(),
                        _ => {}
                    }
                }
                if self.dot == LAST_DOT {
                    self.status.set(
                        PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW,
                        false,
                    );
                }
            }
            _ => {}
        }

        self.dot += 1;
        if self.dot > LAST_DOT {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline > PRE_RENDER_LINE {
                self.scanline = 0;
                self.frame_ready = true;
                self.frame_count += 1;
            }
        }
    }

    fn visible_dot(&mut self, cart: &mut Cartridge, rendering: bool) {
        match self.dot {
            0..=255 => {
                if self.dot == 0 {
                    self.sprites.clear();
                    if rendering {
                        self.evaluate_sprites(cart);
                    }
                }
                self.render_pixel(cart, self.dot as usize);
            }
            256 if rendering => self.increment_y(),
            257 if rendering => self.copy_horizontal(),
            260 if rendering => cart.tick_scanline(),
            _ => {}
        }
    }

    fn increment_y(&mut self) {
        if (self.v & 0x7000) != 0x7000 {
            self.v += 0x1000;
            return;
        }
        self.v &= !0x7000;
        let mut coarse_y = (self.v & 0x03E0) >> 5;
        if coarse_y == 29 {
            coarse_y = 0;
            self.v ^= 0x0800;
        } else if coarse_y == 31 {
            coarse_y = 0;
        } else {
            coarse_y += 1;
        }
        self.v = (self.v & !0x03E0) | (coarse_y << 5);
    }

    fn copy_horizontal(&mut self) {
        self.v = (self.v & !0x041F) | (self.t & 0x041F);
    }

    fn copy_vertical(&mut self) {
        self.v = (self.v & !0x7BE0) | (self.t & 0x7BE0);
    }

    /// Select up to eight sprites covering the current scanline
    fn evaluate_sprites(&mut self, cart: &Cartridge) {
        let height = self.control.sprite_height();
        let line = self.scanline as i16;

        for index in 0..OAM_SIZE / 4 {
            let entry = &self.oam[index * 4..index * 4 + 4];
            let row = line - entry[0] as i16 - 1;
            if !(0..height).contains(&row) {
                continue;
            }
            if self.sprites.len() == SPRITES_PER_LINE {
                self.status.set(PpuStatus::SPRITE_OVERFLOW, true);
                break;
            }

            let (tile, attributes, x) = (entry[1], entry[2], entry[3]);
            let row = if attributes & 0x80 != 0 {
                (height - 1 - row) as u16
            } else {
                row as u16
            };

            let address = if self.control.tall_sprites() {
                let table = (tile as u16 & 1) * 0x1000;
                let tile = (tile & 0xFE) as u16 + (row >> 3);
                table + tile * 16 + (row & 7)
            } else {
                self.control.sprite_table() + tile as u16 * 16 + row
            };

            let mut low = cart.read_chr(address);
            let mut high = cart.read_chr(address + 8);
            if attributes & 0x40 != 0 {
                low = low.reverse_bits();
                high = high.reverse_bits();
            }

            self.sprites.push(SpriteSlot {
                x,
                attributes,
                low,
                high,
                is_sprite_zero: index == 0,
            });
        }
    }

    /// Background pattern value and palette for screen column `x`
    fn background_pixel(&self, cart: &Cartridge, x: usize) -> (u8, u8) {
        let scroll_x = self.fine_x as usize + x;
        let coarse_x = (self.v & 0x001F) as usize + (scroll_x >> 3);
        let nametable_x = ((self.v >> 10) & 1) ^ ((coarse_x >> 5) & 1) as u16;
        let coarse_x = (coarse_x & 0x1F) as u16;
        let coarse_y = (self.v >> 5) & 0x1F;
        let fine_y = (self.v >> 12) & 0x07;
        let nametable = (self.v & 0x0800) | (nametable_x << 10);

        let tile = self.read_vram(cart, 0x2000 | nametable | (coarse_y << 5) | coarse_x);
        let attribute = self.read_vram(
            cart,
            0x23C0 | nametable | ((coarse_y >> 2) << 3) | (coarse_x >> 2),
        );
        let shift = ((coarse_y & 0x02) << 1) | (coarse_x & 0x02);
        let palette = (attribute >> shift) & 0x03;

        let address = self.control.background_table() + tile as u16 * 16 + fine_y;
        let bit = 7 - (scroll_x & 7);
        let low = (cart.read_chr(address) >> bit) & 1;
        let high = (cart.read_chr(address + 8) >> bit) & 1;
        ((high << 1) | low, palette)
    }

    /// First opaque sprite pixel at column `x`: (value, palette, behind background, sprite 0)
    fn sprite_pixel(&self, x: usize) -> Option<(u8, u8, bool, bool)> {
        self.sprites.iter().find_map(|sprite| {
            let offset = x.checked_sub(sprite.x as usize)?;
            if offset >= 8 {
                return None;
            }
            let bit = 7 - offset;
            let value = (((sprite.high >> bit) & 1) << 1) | ((sprite.low >> bit) & 1);
            (value != 0).then_some((
                value,
                sprite.attributes & 0x03,
                sprite.attributes & 0x20 != 0,
                sprite.is_sprite_zero,
            ))
        })
    }

    fn render_pixel(&mut self, cart: &Cartridge, x: usize) {
        let (bg_value, bg_palette) = if self.mask.show_background()
            && (x >= 8 || self.mask.show_background_left())
        {
            self.background_pixel(cart, x)
        } else {
            (0, 0)
        };

        let sprite = if self.mask.show_sprites() && (x >= 8 || self.mask.show_sprites_left()) {
            self.sprite_pixel(x)
        } else {
            None
        };

        let index = match sprite {
            Some((value, palette, behind, is_sprite_zero)) => {
                if is_sprite_zero && bg_value != 0 && x != 255 {
                    self.status.set(PpuStatus::SPRITE_ZERO_HIT, true);
                }
                if bg_value == 0 || !behind {
                    0x10 + palette * 4 + value
                } else {
                    bg_palette * 4 + bg_value
                }
            }
            None if bg_value != 0 => bg_palette * 4 + bg_value,
            None => 0,
        };

        let mut color = self.palette[palette_index(index as u16)] & 0x3F;
        if self.mask.grayscale() {
            color &= 0x30;
        }
        let (r, g, b) = NES_PALETTE[color as usize];
        let offset = (self.scanline as usize * SCREEN_WIDTH + x) * 3;
        self.frame[offset] = r;
        self.frame[offset + 1] = g;
        self.frame[offset + 2] = b;
    }

    fn read_vram(&self, cart: &Cartridge, address: u16) -> u8 {
        let address = address & 0x3FFF;
        match address {
            0x0000..=0x1FFF => cart.read_chr(address),
            0x2000..=0x3EFF => self.vram[0x2000 + mirror_nametable(address, cart.mirroring())],
            _ => self.palette[palette_index(address)],
        }
    }

    fn write_vram(&mut self, cart: &mut Cartridge, address: u16, value: u8) {
        let address = address & 0x3FFF;
        match address {
            0x0000..=0x1FFF => cart.write_chr(address, value),
            0x2000..=0x3EFF => {
                self.vram[0x2000 + mirror_nametable(address, cart.mirroring())] = value;
            }
            _ => self.palette[palette_index(address)] = value & 0x3F,
        }
    }

    /// CPU read from $2000-$2007 (already reduced to the register index)
    pub fn read_register(&mut self, register: u16, cart: &mut Cartridge) -> u8 {
        match register & 0x07 {
            // $2002 - PPUSTATUS
            2 => {
                let value = (self.status.bits() & 0xE0) | (self.io_latch & 0x1F);
                self.status.set(PpuStatus::VBLANK, false);
                self.write_toggle = false;
                value
            }
            // $2004 - OAMDATA
            4 => self.oam[self.oam_addr as usize],
            // $2007 - PPUDATA
            7 => {
                let address = self.v & 0x3FFF;
                let value = if address >= 0x3F00 {
                    // Palette reads are immediate; the buffer gets the nametable byte underneath
                    self.read_buffer = self.read_vram(cart, address - 0x1000);
                    self.read_vram(cart, address)
                } else {
                    let buffered = self.read_buffer;
                    self.read_buffer = self.read_vram(cart, address);
                    buffered
                };
                self.v = self.v.wrapping_add(self.control.vram_increment()) & 0x7FFF;
                value
            }
            _ => self.io_latch,
        }
    }

    /// CPU write to $2000-$2007 (already reduced to the register index)
    pub fn write_register(&mut self, register: u16, value: u8, cart: &mut Cartridge) {
        self.io_latch = value;
        match register & 0x07 {
            // $2000 - PPUCTRL
            0 => {
                let was_enabled = self.control.nmi_enable();
                self.control = PpuCtrl::new(value);
                self.t = (self.t & !0x0C00) | ((value as u16 & 0x03) << 10);
                if !was_enabled && self.control.nmi_enable() && self.status.vblank() {
                    self.nmi_pending = true;
                }
            }
            // $2001 - PPUMASK
            1 => self.mask = PpuMask::new(value),
            // $2002 - PPUSTATUS is read-only
            2 => {}
            // $2003 - OAMADDR
            3 => self.oam_addr = value,
            // $2004 - OAMDATA
            4 => self.write_oam(value),
            // $2005 - PPUSCROLL
            5 => {
                if !self.write_toggle {
                    self.t = (self.t & !0x001F) | (value as u16 >> 3);
                    self.fine_x = value & 0x07;
                } else {
                    self.t = (self.t & !0x73E0)
                        | ((value as u16 & 0x07) << 12)
                        | ((value as u16 & 0xF8) << 2);
                }
                self.write_toggle = !self.write_toggle;
            }
            // $2006 - PPUADDR
            6 => {
                if !self.write_toggle {
                    self.t = (self.t & 0x00FF) | ((value as u16 & 0x3F) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | value as u16;
                    self.v = self.t;
                }
                self.write_toggle = !self.write_toggle;
            }
            // $2007 - PPUDATA
            _ => {
                self.write_vram(cart, self.v, value);
                self.v = self.v.wrapping_add(self.control.vram_increment()) & 0x7FFF;
            }
        }
    }

    /// OAM write through $2004 or DMA
    pub fn write_oam(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// Take the pending NMI request, clearing it
    pub fn poll_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Whether a frame completed since the flag was last cleared
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn clear_frame_ready(&mut self) {
        self.frame_ready = false;
    }

    /// Frames completed since reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// RGB frame buffer, 256x240x3
    pub fn frame_buffer(&self) -> &[u8] {
        &self.frame
    }

    /// Get PPU status
    pub fn status(&self) -> &PpuStatus {
        &self.status
    }

    /// Get PPU mask
    pub fn mask(&self) -> &PpuMask {
        &self.mask
    }

    /// Get PPU control
    pub fn control(&self) -> &PpuCtrl {
        &self.control
    }

    /// Current VRAM address register
    pub fn vram_address(&self) -> u16 {
        self.v
    }

    /// Temporary VRAM address register
    pub fn temp_address(&self) -> u16 {
        self.t
    }

    pub fn fine_x(&self) -> u8 {
        self.fine_x
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    /// Get current scanline
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Get current dot
    pub fn dot(&self) -> u16 {
        self.dot
    }

    /// Get the palette byte at the given index
    pub fn palette_entry(&self, index: usize) -> u8 {
        self.palette[palette_index(index as u16)]
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
