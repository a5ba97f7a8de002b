//! NES Desktop - Desktop NES emulator with minifb rendering
//!
//! Keys: arrows = D-pad, Z = A, X = B, Right Shift = Select, Enter = Start,
//! F5 = quick save, F9 = quick load, P = pause, Esc = quit.

use clap::Parser;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use nes_core::controller::{
    BUTTON_A, BUTTON_B, BUTTON_DOWN, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_SELECT, BUTTON_START,
    BUTTON_UP,
};
use nes_core::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use nes_core::system::NesSystem;
use nes_core::SystemConfig;
use std::fs;
use std::path::PathBuf;
use std::process;

/// NES Emulator Desktop App
#[derive(Parser, Debug)]
#[command(name = "nes-desktop")]
#[command(about = "A NES emulator desktop app", long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    #[arg(short, long)]
    rom: PathBuf,

    /// Screen scale factor (1-4)
    #[arg(short, long, default_value = "2")]
    scale: usize,

    /// Emulation speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f32,
}

const KEY_MAP: [(Key, u8); 8] = [
    (Key::Z, BUTTON_A),
    (Key::X, BUTTON_B),
    (Key::RightShift, BUTTON_SELECT),
    (Key::Enter, BUTTON_START),
    (Key::Up, BUTTON_UP),
    (Key::Down, BUTTON_DOWN),
    (Key::Left, BUTTON_LEFT),
    (Key::Right, BUTTON_RIGHT),
];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read ROM file: {}", e);
            process::exit(1);
        }
    };

    let mut system = NesSystem::with_config(SystemConfig {
        speed: args.speed,
        ..SystemConfig::default()
    });
    if let Err(e) = system.load_rom(&rom_data) {
        eprintln!("Failed to load ROM: {}", e);
        process::exit(1);
    }

    let scale = args.scale.clamp(1, 4);
    let mut window = match Window::new(
        "NES Emulator",
        SCREEN_WIDTH * scale,
        SCREEN_HEIGHT * scale,
        WindowOptions {
            resize: false,
            ..WindowOptions::default()
        },
    ) {
        Ok(window) => window,
        Err(e) => {
            eprintln!("Failed to create window: {}", e);
            process::exit(1);
        }
    };
    window.set_target_fps(60);

    // minifb wants 0RGB words
    let mut pixels = vec![0u32; SCREEN_WIDTH * SCREEN_HEIGHT];
    let mut quick_state: Option<Vec<u8>> = None;

    log::info!("running {}", args.rom.display());

    while window.is_open() && !window.is_key_down(Key::Escape) {
        for (key, button) in KEY_MAP {
            system.set_button(0, button, window.is_key_down(key));
        }

        if window.is_key_pressed(Key::P, KeyRepeat::No) {
            let paused = !system.is_paused();
            system.set_paused(paused);
            log::info!("{}", if paused { "paused" } else { "resumed" });
        }
        if window.is_key_pressed(Key::F5, KeyRepeat::No) {
            match system.save_state() {
                Ok(state) => quick_state = Some(state),
                Err(e) => log::error!("quick save failed: {}", e),
            }
        }
        if window.is_key_pressed(Key::F9, KeyRepeat::No) {
            match &quick_state {
                Some(state) => {
                    if let Err(e) = system.load_state(state) {
                        log::error!("quick load failed: {}", e);
                    }
                }
                None => log::warn!("no quick save yet"),
            }
        }

        system.run_frame();
        // No audio output; keep the queue from filling
        while system.next_sample().is_some() {}

        if system.frame_ready() {
            for (pixel, rgb) in pixels.iter_mut().zip(system.frame_buffer().chunks_exact(3)) {
                *pixel = (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2]);
            }
            system.clear_frame_ready();
        }

        if let Err(e) = window.update_with_buffer(&pixels, SCREEN_WIDTH, SCREEN_HEIGHT) {
            eprintln!("Failed to update window: {}", e);
            process::exit(1);
        }
    }

    println!("Emulator closed.");
}
