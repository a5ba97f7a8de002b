//! NES System Integration
//!
//! [`NesSystem`] owns every component. The CPU bus is a short-lived
//! [`SystemBus`] built from borrows of the other parts for each instruction.
//!
//! Scheduling is cycle based: an instruction executes at once and the system
//! then waits out its cycle cost, stepping the PPU three dots and the APU one
//! tick per CPU cycle. Interrupt lines are sampled after every cycle and
//! serviced by the CPU at the next instruction boundary.

use crate::apu::Apu;
use crate::bus::{SystemBus, RAM_SIZE};
use crate::cartridge::{Cartridge, CartridgeError};
use crate::config::{SystemConfig, PPU_DOTS_PER_CPU_CYCLE};
use crate::controller::ControllerPorts;
use crate::cpu::{Bus as _, Cpu};
use crate::ppu::Ppu;
use crate::savestate::{Snapshot, StateError, STATE_VERSION};

/// NES System - integrates all components
#[derive(Debug, Clone)]
pub struct NesSystem {
    cpu: Cpu,
    ppu: Ppu,
    apu: Apu,
    ram: [u8; RAM_SIZE],
    cartridge: Cartridge,
    controllers: ControllerPorts,
    config: SystemConfig,
    /// CPU cycles left before the next instruction starts
    wait_cycles: u32,
    /// Frame counter
    frame_count: u64,
    paused: bool,
}

impl NesSystem {
    /// Create a new NES system with no cartridge
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        let config = SystemConfig {
            speed: SystemConfig::sanitized_speed(config.speed),
            ..config
        };
        Self {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            apu: Apu::new(config.sample_rate),
            ram: [0; RAM_SIZE],
            cartridge: Cartridge::empty(),
            controllers: ControllerPorts::new(),
            config,
            wait_cycles: 0,
            frame_count: 0,
            paused: false,
        }
    }

    /// Load an iNES ROM file and reset. On error the current cartridge is kept.
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), CartridgeError> {
        let cartridge = Cartridge::from_rom(rom_data)?;
        log::info!(
            "loaded ROM: mapper {} ({}), {} bytes",
            cartridge.mapper().number(),
            cartridge.mapper().name(),
            rom_data.len()
        );
        self.cartridge = cartridge;
        self.reset();
        Ok(())
    }

    /// Reset the NES system. Work RAM is left as it was.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        self.wait_cycles = 0;
        self.frame_count = 0;
        let (cpu, mut bus) = self.split();
        cpu.reset(&mut bus);
    }

    fn split(&mut self) -> (&mut Cpu, SystemBus<'_>) {
        let cycles = self.cpu.total_cycles();
        let bus = SystemBus::new(
            &mut self.ram,
            &mut self.ppu,
            &mut self.apu,
            &mut self.cartridge,
            &mut self.controllers,
            cycles,
        );
        (&mut self.cpu, bus)
    }

    /// Advance the system by one CPU cycle
    pub fn tick(&mut self) {
        if self.wait_cycles == 0 {
            let (cpu, mut bus) = self.split();
            let cycles = cpu.step(&mut bus);
            let stall = bus.take_dma_stall();
            cpu.add_stall_cycles(stall);
            self.wait_cycles = cycles + stall;
        }
        self.wait_cycles = self.wait_cycles.saturating_sub(1);

        for _ in 0..PPU_DOTS_PER_CPU_CYCLE {
            self.ppu.step(&mut self.cartridge);
        }
        self.apu.tick();

        if self.ppu.poll_nmi() {
            self.cpu.trigger_nmi();
        }
        self.cpu.set_irq(self.cartridge.irq_pending());
    }

    /// Run until the current instruction completes, returning the cycles it took
    pub fn step(&mut self) -> u32 {
        let mut elapsed = 0;
        loop {
            self.tick();
            elapsed += 1;
            if self.wait_cycles == 0 {
                return elapsed;
            }
        }
    }

    /// Run one frame's worth of CPU cycles at the configured speed
    pub fn run_frame(&mut self) {
        if self.paused {
            return;
        }
        let target = self.cpu.total_cycles() + self.config.cycles_per_frame();
        while self.cpu.total_cycles() < target {
            self.tick();
        }
        self.frame_count += 1;
    }

    /// Run for N frames
    pub fn run_frames(&mut self, frames: u64) {
        for _ in 0..frames {
            self.run_frame();
        }
    }

    /// Press or release a button on controller port 0 or 1
    pub fn set_button(&mut self, port: usize, button: u8, pressed: bool) {
        match self.controllers.port_mut(port) {
            Some(pad) => pad.set_button(button, pressed),
            None => log::warn!("no controller port {}", port),
        }
    }

    /// Pop the oldest audio sample
    pub fn next_sample(&mut self) -> Option<f32> {
        self.apu.next_sample()
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = SystemConfig::sanitized_speed(speed);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Capture the machine state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: STATE_VERSION,
            cpu: self.cpu.clone(),
            ram: self.ram,
            ppu: self.ppu.clone(),
            apu: self.apu.clone(),
            cartridge: self.cartridge.capture_state(),
            controllers: self.controllers.clone(),
            wait_cycles: self.wait_cycles,
            frame_count: self.frame_count,
            paused: self.paused,
        }
    }

    /// Restore a captured state. Nothing changes if it does not fit the loaded cartridge.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), StateError> {
        if !self.cartridge.accepts_state(&snapshot.cartridge) {
            return Err(StateError::CartridgeMismatch);
        }
        if !snapshot.ppu.is_consistent() {
            return Err(StateError::Malformed("picture unit layout"));
        }
        let mut apu = snapshot.apu;
        apu.normalize();
        self.cpu = snapshot.cpu;
        self.ram = snapshot.ram;
        self.ppu = snapshot.ppu;
        self.apu = apu;
        self.cartridge.restore_state(snapshot.cartridge);
        self.controllers = snapshot.controllers;
        self.wait_cycles = snapshot.wait_cycles;
        self.frame_count = snapshot.frame_count;
        self.paused = snapshot.paused;
        Ok(())
    }

    /// Encode the machine state to bytes
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let bytes = self.snapshot().to_bytes()?;
        log::info!("state saved ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Restore the machine state from bytes produced by [`save_state`](Self::save_state)
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let snapshot = Snapshot::from_bytes(bytes)?;
        self.restore(snapshot)?;
        log::info!("state restored, frame {}", self.frame_count);
        Ok(())
    }

    /// Get CPU reference
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Get mutable CPU reference
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Get PPU reference
    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    /// Get APU reference
    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    /// Work RAM contents
    pub fn ram(&self) -> &[u8; RAM_SIZE] {
        &self.ram
    }

    /// RGB frame buffer, 256x240x3
    pub fn frame_buffer(&self) -> &[u8] {
        self.ppu.frame_buffer()
    }

    pub fn frame_ready(&self) -> bool {
        self.ppu.frame_ready()
    }

    pub fn clear_frame_ready(&mut self) {
        self.ppu.clear_frame_ready();
    }

    /// Get frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Read a byte from memory via the bus (register reads have their usual side effects)
    pub fn read_memory(&mut self, address: u16) -> u8 {
        let (_, mut bus) = self.split();
        bus.read(address)
    }

    /// Write a byte to memory via the bus
    pub fn write_memory(&mut self, address: u16, value: u8) {
        let (_, mut bus) = self.split();
        bus.write(address, value);
    }
}

impl Default for NesSystem {
    fn default() -> Self {
        Self::new()
    }
}
