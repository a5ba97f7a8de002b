//! NES CLI - Headless runner for the NES emulator core

mod slots;

use clap::Parser;
use nes_core::system::NesSystem;
use nes_core::{Cartridge, SystemConfig};
use slots::SlotManager;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

/// NES Emulator CLI
#[derive(Parser, Debug)]
#[command(name = "nes-cli")]
#[command(about = "Run an iNES ROM headless", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Number of frames to run
    #[arg(short, long, default_value = "60")]
    frames: u64,

    /// Emulation speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Audio sample rate in Hz
    #[arg(long, default_value = "44100")]
    sample_rate: u32,

    /// Dump CPU state after execution
    #[arg(short = 'c', long)]
    dump_cpu: bool,

    /// Dump PPU state after execution
    #[arg(short = 'p', long)]
    dump_ppu: bool,

    /// Write the last frame as a PPM image
    #[arg(long)]
    dump_frame: Option<PathBuf>,

    /// Directory holding save-state slots
    #[arg(long, default_value = "states")]
    state_dir: PathBuf,

    /// Save into this slot (0-9) after running
    #[arg(long)]
    save_slot: Option<u8>,

    /// Restore this slot (0-9) before running
    #[arg(long)]
    load_slot: Option<u8>,

    /// List occupied slots and exit
    #[arg(long)]
    list_slots: bool,

    /// Delete a slot and exit
    #[arg(long)]
    delete_slot: Option<u8>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(message) = run(&args) {
        eprintln!("{}", message);
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn run(args: &Args) -> Result<(), String> {
    let slots = SlotManager::new(&args.state_dir, &args.rom);

    if args.list_slots {
        list_slots(&slots);
        return Ok(());
    }
    if let Some(slot) = args.delete_slot {
        slots
            .delete(slot)
            .map_err(|e| format!("Failed to delete slot: {}", e))?;
        println!("Deleted slot {}", slot);
        return Ok(());
    }

    let rom_data = fs::read(&args.rom).map_err(|e| format!("Failed to read ROM file: {}", e))?;

    let cartridge =
        Cartridge::from_rom(&rom_data).map_err(|e| format!("Failed to load cartridge: {}", e))?;
    println!("Loaded cartridge:");
    println!("  PRG ROM: {} bytes", cartridge.prg_rom().len());
    if cartridge.chr_is_ram() {
        println!("  CHR RAM: {} bytes", cartridge.chr().len());
    } else {
        println!("  CHR ROM: {} bytes", cartridge.chr().len());
    }
    println!("  Mapper: {}", cartridge.header().mapper_number());
    println!("  Mirroring: {:?}", cartridge.mirroring());

    let mut system = NesSystem::with_config(SystemConfig {
        speed: args.speed,
        sample_rate: args.sample_rate,
    });
    system
        .load_rom(&rom_data)
        .map_err(|e| format!("Failed to load ROM: {}", e))?;

    let battery_path = args.rom.with_extension("sav");
    if system.cartridge().has_battery() {
        load_battery(&mut system, &battery_path);
    }

    if let Some(slot) = args.load_slot {
        let file = slots
            .load(slot)
            .map_err(|e| format!("Failed to load slot: {}", e))?;
        system
            .load_state(&file.state)
            .map_err(|e| format!("Failed to restore slot {}: {}", slot, e))?;
        match file.saved_at() {
            Some(time) => println!("Restored slot {} ({})", slot, time.format("%Y-%m-%d %H:%M:%S")),
            None => println!("Restored slot {}", slot),
        }
    }

    println!("\nRunning {} frames...", args.frames);
    system.run_frames(args.frames);

    // Samples are not played headless
    let mut samples = 0usize;
    while system.next_sample().is_some() {
        samples += 1;
    }
    log::debug!("discarded {} trailing audio samples", samples);

    println!("Completed {} frames.", system.frame_count());

    if args.dump_cpu {
        dump_cpu_state(&system);
    }

    if args.dump_ppu {
        dump_ppu_state(&system);
    }

    if let Some(path) = &args.dump_frame {
        write_ppm(path, system.frame_buffer())
            .map_err(|e| format!("Failed to write frame: {}", e))?;
        println!("Wrote frame to {}", path.display());
    }

    if let Some(slot) = args.save_slot {
        let state = system
            .save_state()
            .map_err(|e| format!("Failed to capture state: {}", e))?;
        slots
            .save(slot, state)
            .map_err(|e| format!("Failed to save slot: {}", e))?;
        println!("Saved slot {}", slot);
    }

    if system.cartridge().has_battery() {
        fs::write(&battery_path, system.cartridge().prg_ram())
            .map_err(|e| format!("Failed to write battery save: {}", e))?;
        log::info!("wrote battery RAM to {}", battery_path.display());
    }

    Ok(())
}

fn load_battery(system: &mut NesSystem, path: &Path) {
    match fs::read(path) {
        Ok(data) => {
            system.cartridge_mut().load_prg_ram(&data);
            log::info!("loaded battery RAM from {}", path.display());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("ignoring battery save {}: {}", path.display(), e),
    }
}

fn list_slots(slots: &SlotManager) {
    let occupied = slots.list();
    if occupied.is_empty() {
        println!("No save slots for {}", slots.rom_name());
        return;
    }
    for (slot, file) in occupied {
        let time = file
            .saved_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        println!(
            "  [{}] {}  {}  ({} bytes)",
            slot,
            time,
            file.rom_name,
            file.state.len()
        );
    }
}

fn write_ppm(path: &Path, frame: &[u8]) -> io::Result<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    write!(
        file,
        "P6\n{} {}\n255\n",
        nes_core::ppu::SCREEN_WIDTH,
        nes_core::ppu::SCREEN_HEIGHT
    )?;
    file.write_all(frame)?;
    file.flush()
}

fn dump_cpu_state(system: &NesSystem) {
    let cpu = system.cpu();
    let regs = cpu.registers();
    let status = cpu.status();

    println!("\nCPU State:");
    println!("  A:    ${:02X}", regs.a);
    println!("  X:    ${:02X}", regs.x);
    println!("  Y:    ${:02X}", regs.y);
    println!("  PC:   ${:04X}", regs.pc);
    println!("  SP:   ${:02X}", regs.sp);
    println!("  P:    ${:02X} ({})", status.bits(), status);
    println!("  Cycles: {}", cpu.total_cycles());
}

fn dump_ppu_state(system: &NesSystem) {
    let ppu = system.ppu();

    println!("\nPPU State:");
    println!("  Scanline: {}", ppu.scanline());
    println!("  Dot: {}", ppu.dot());
    println!("  VBLANK: {}", ppu.status().vblank());
    println!("  CTRL: ${:02X}", ppu.control().bits());
    println!("  MASK: ${:02X}", ppu.mask().bits());
    println!("  V: ${:04X}  T: ${:04X}", ppu.vram_address(), ppu.temp_address());
    println!("  Frames: {}", ppu.frame_count());
}
