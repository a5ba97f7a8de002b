//! Save state tests

mod common;

use common::{nrom, RomBuilder};
use nes_core::controller::BUTTON_B;
use nes_core::system::NesSystem;
use nes_core::StateError;

/// NMI-driven program that scrolls and keeps a frame counter in RAM
fn busy_rom(mapper: u8) -> Vec<u8> {
    let program = [
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000
        0xA9, 0x1E, // LDA #$1E
        0x8D, 0x01, 0x20, // STA $2001
        0xE8, // loop: INX
        0x9D, 0x00, 0x03, // STA $0300,X
        0x4C, 0x0A, 0x80, // JMP loop
    ];
    let nmi = [
        0xE6, 0x20, // INC $20
        0xA5, 0x20, // LDA $20
        0x8D, 0x05, 0x20, // STA $2005
        0x8D, 0x05, 0x20, // STA $2005
        0x40, // RTI
    ];
    let prg_banks = if mapper == 4 { 2 } else { 1 };
    RomBuilder::new(mapper, prg_banks, 1)
        .program(&program)
        .prg_bytes(0x40, &nmi)
        .nmi_vector(0x8040)
        .tag_chr(16)
        .build()
}

fn assert_same_machine(a: &NesSystem, b: &NesSystem) {
    assert_eq!(a.cpu().registers(), b.cpu().registers());
    assert_eq!(a.cpu().total_cycles(), b.cpu().total_cycles());
    assert_eq!(a.ram(), b.ram());
    assert_eq!(a.frame_count(), b.frame_count());
    assert_eq!(a.frame_buffer(), b.frame_buffer());
    assert_eq!(a.ppu().scanline(), b.ppu().scanline());
    assert_eq!(a.ppu().dot(), b.ppu().dot());
}

#[test]
fn test_restore_replays_identically() {
    let rom = busy_rom(0);
    let mut system = NesSystem::new();
    system.load_rom(&rom).unwrap();
    system.run_frames(3);
    // Stop mid-instruction to cover the pending wait cycles
    for _ in 0..1000 {
        system.tick();
    }
    let saved = system.save_state().unwrap();

    system.set_button(0, BUTTON_B, true);
    system.run_frames(4);

    let mut replay = NesSystem::new();
    replay.load_rom(&rom).unwrap();
    replay.load_state(&saved).unwrap();
    replay.set_button(0, BUTTON_B, true);
    replay.run_frames(4);

    assert_same_machine(&system, &replay);
}

#[test]
fn test_load_state_rewinds_running_system() {
    let mut system = NesSystem::new();
    system.load_rom(&busy_rom(0)).unwrap();
    system.run_frame();
    let saved = system.save_state().unwrap();
    let frame = system.frame_count();
    let counter = system.ram()[0x20];

    system.run_frames(5);
    assert_ne!(system.ram()[0x20], counter);

    system.load_state(&saved).unwrap();
    assert_eq!(system.frame_count(), frame);
    assert_eq!(system.ram()[0x20], counter);
}

#[test]
fn test_mmc3_registers_survive() {
    let rom = busy_rom(4);
    let mut system = NesSystem::new();
    system.load_rom(&rom).unwrap();
    system.run_frame();
    // R7 = 1, then mirror horizontally
    system.write_memory(0x8000, 7);
    system.write_memory(0x8001, 1);
    system.write_memory(0xA000, 1);
    let saved = system.save_state().unwrap();

    let mut other = NesSystem::new();
    other.load_rom(&rom).unwrap();
    other.load_state(&saved).unwrap();
    assert_eq!(other.cartridge().mirroring(), system.cartridge().mirroring());
    assert_eq!(other.read_memory(0xA000), system.read_memory(0xA000));

    system.run_frames(2);
    other.run_frames(2);
    assert_same_machine(&system, &other);
}

#[test]
fn test_battery_ram_restored() {
    let rom = RomBuilder::new(0, 1, 1).battery().build();
    let mut system = NesSystem::new();
    system.load_rom(&rom).unwrap();
    system.write_memory(0x6010, 0x77);
    let saved = system.save_state().unwrap();

    system.write_memory(0x6010, 0x00);
    system.load_state(&saved).unwrap();
    assert_eq!(system.cartridge().prg_ram()[0x10], 0x77);
}

#[test]
fn test_state_from_other_board_rejected() {
    let mut source = NesSystem::new();
    source.load_rom(&busy_rom(4)).unwrap();
    source.run_frame();
    let saved = source.save_state().unwrap();

    let mut target = NesSystem::new();
    target.load_rom(&busy_rom(0)).unwrap();
    target.run_frame();
    let before = target.save_state().unwrap();

    assert!(matches!(
        target.load_state(&saved),
        Err(StateError::CartridgeMismatch)
    ));
    assert_eq!(target.save_state().unwrap(), before);
}

#[test]
fn test_chr_ram_shape_checked() {
    let mut source = NesSystem::new();
    source.load_rom(&RomBuilder::new(0, 1, 0).build()).unwrap();
    let saved = source.save_state().unwrap();

    let mut target = NesSystem::new();
    target.load_rom(&nrom(&[])).unwrap();
    assert!(matches!(
        target.load_state(&saved),
        Err(StateError::CartridgeMismatch)
    ));
}

#[test]
fn test_garbage_rejected() {
    let mut system = NesSystem::new();
    system.load_rom(&nrom(&[])).unwrap();
    let before = system.save_state().unwrap();

    assert!(system.load_state(&[]).is_err());
    assert!(matches!(
        system.load_state(&before[..before.len() / 2]),
        Err(StateError::Decode(_))
    ));
    assert_eq!(system.save_state().unwrap(), before);
}
