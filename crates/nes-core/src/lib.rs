//! NES Core - Pure Rust NES emulator library
//!
//! This crate provides the core emulation logic for a Nintendo Entertainment System (NES).
//! It performs no I/O and no pacing: callers drive it with [`NesSystem::run_frame`]
//! or [`NesSystem::tick`], read the frame buffer and audio samples, and feed input.
//!
//! ```no_run
//! use nes_core::{controller::BUTTON_START, NesSystem};
//!
//! let rom = std::fs::read("game.nes").unwrap();
//! let mut nes = NesSystem::new();
//! nes.load_rom(&rom).unwrap();
//! nes.set_button(0, BUTTON_START, true);
//! nes.run_frame();
//! let _rgb = nes.frame_buffer();
//! ```

#![forbid(unsafe_code)]

/// CPU module containing the 2A03 (6502 variant) implementation
pub mod cpu;
/// Memory bus and mapping
pub mod bus;
/// PPU (Picture Processing Unit) implementation
pub mod ppu;
/// APU (Audio Processing Unit) with register file and simple channel output
pub mod apu;
/// Cartridge loading
pub mod cartridge;
/// Board-specific bank switching
pub mod mapper;
/// Standard controllers
pub mod controller;
/// Session configuration and timing constants
pub mod config;
/// Save state encoding
pub mod savestate;
/// Integration module for complete NES system
pub mod system;

pub use cartridge::{Cartridge, CartridgeError};
pub use config::SystemConfig;
pub use savestate::StateError;
pub use system::NesSystem;
