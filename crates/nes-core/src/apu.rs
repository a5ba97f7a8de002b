//! APU (Audio Processing Unit) implementation
//!
//! The NES APU has five channels:
//! - Pulse 1 and Pulse 2 (square waves with four duty cycles)
//! - Triangle (32-step ramp)
//! - Noise (15-bit linear feedback shift register)
//! - DMC (delta modulation channel)
//!
//! Registers, length counters and the $4015 status are modelled. Channel
//! output is a plain phase stepper without envelopes, sweeps, the linear
//! counter or DMC sample fetches; DMC output is the level written to $4011.

use std::collections::VecDeque;

use bincode::{Decode, Encode};

use crate::config::CPU_HZ;

/// CPU cycles between length counter clocks (one half frame)
pub const HALF_FRAME_CYCLES: u32 = 14_915;

/// Samples buffered before the oldest are dropped
pub const SAMPLE_BUFFER_LIMIT: usize = 8192;

const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14,
    12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

const TRIANGLE_TABLE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0,
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

const NOISE_PERIODS: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

#[derive(Debug, Clone, Default, Encode, Decode)]
struct Pulse {
    /// $4000/$4004: duty, length halt, constant volume, volume
    control: u8,
    period: u16,
    timer: u16,
    step: u8,
    length: u8,
    enabled: bool,
}

impl Pulse {
    fn halted(&self) -> bool {
        self.control & 0x20 != 0
    }

    fn write(&mut self, register: u16, value: u8) {
        match register & 3 {
            0 => self.control = value,
            1 => {} // sweep
            2 => self.period = (self.period & 0x0700) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | ((value as u16 & 0x07) << 8);
                if self.enabled {
                    self.length = LENGTH_TABLE[(value >> 3) as usize];
                }
                self.step = 0;
            }
        }
    }

    /// Clocked every other CPU cycle
    fn clock(&mut self) {
        if self.timer == 0 {
            self.timer = self.period;
            self.step = (self.step + 1) & 7;
        } else {
            self.timer -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.length == 0 || self.period < 8 {
            return 0;
        }
        let duty = (self.control >> 6) as usize;
        DUTY_TABLE[duty][self.step as usize] * (self.control & 0x0F)
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
struct Triangle {
    control: u8,
    period: u16,
    timer: u16,
    step: u8,
    length: u8,
    enabled: bool,
}

impl Triangle {
    fn halted(&self) -> bool {
        self.control & 0x80 != 0
    }

    fn write(&mut self, register: u16, value: u8) {
        match register & 3 {
            0 => self.control = value,
            1 => {}
            2 => self.period = (self.period & 0x0700) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | ((value as u16 & 0x07) << 8);
                if self.enabled {
                    self.length = LENGTH_TABLE[(value >> 3) as usize];
                }
            }
        }
    }

    fn clock(&mut self) {
        if self.timer == 0 {
            self.timer = self.period;
            if self.length > 0 {
                self.step = (self.step + 1) & 31;
            }
        } else {
            self.timer -= 1;
        }
    }

    fn output(&self) -> u8 {
        // Ultrasonic periods are silenced
        if self.length == 0 || self.period < 2 {
            return 0;
        }
        TRIANGLE_TABLE[self.step as usize]
    }
}

#[derive(Debug, Clone, Encode, Decode)]
struct Noise {
    control: u8,
    /// $400E: mode flag and period index
    mode: u8,
    timer: u16,
    shift: u16,
    length: u8,
    enabled: bool,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            control: 0,
            mode: 0,
            timer: 0,
            shift: 1,
            length: 0,
            enabled: false,
        }
    }
}

impl Noise {
    fn halted(&self) -> bool {
        self.control & 0x20 != 0
    }

    fn write(&mut self, register: u16, value: u8) {
        match register & 3 {
            0 => self.control = value,
            1 => {}
            2 => self.mode = value,
            _ => {
                if self.enabled {
                    self.length = LENGTH_TABLE[(value >> 3) as usize];
                }
            }
        }
    }

    fn clock(&mut self) {
        if self.timer == 0 {
            self.timer = NOISE_PERIODS[(self.mode & 0x0F) as usize];
            let tap = if self.mode & 0x80 != 0 { 6 } else { 1 };
            let feedback = (self.shift ^ (self.shift >> tap)) & 1;
            self.shift = (self.shift >> 1) | (feedback << 14);
        } else {
            self.timer -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.length == 0 || self.shift & 1 != 0 {
            return 0;
        }
        self.control & 0x0F
    }
}

/// APU state
#[derive(Debug, Clone, Encode, Decode)]
pub struct Apu {
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    /// DMC output level ($4011)
    dmc_level: u8,
    dmc_enabled: bool,
    /// $4017 mode and IRQ inhibit bits
    frame_mode: u8,
    /// Cycles since the last half-frame clock
    frame_cycle: u32,
    /// Cycle counter for timing
    cycle_count: u64,
    sample_rate: u32,
    /// Fractional sample position, in units of 1/CPU_HZ
    sample_clock: u32,
    samples: VecDeque<f32>,
}

impl Apu {
    /// Create a new APU producing `sample_rate` samples per emulated second
    pub fn new(sample_rate: u32) -> Self {
        Self {
            pulse1: Pulse::default(),
            pulse2: Pulse::default(),
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc_level: 0,
            dmc_enabled: false,
            frame_mode: 0,
            frame_cycle: 0,
            cycle_count: 0,
            sample_rate: sample_rate.clamp(1, CPU_HZ),
            sample_clock: 0,
            samples: VecDeque::with_capacity(SAMPLE_BUFFER_LIMIT),
        }
    }

    /// Reset the APU, keeping the sample rate
    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }

    /// Pull decoded state back into the ranges `tick` and the mixer index by
    pub fn normalize(&mut self) {
        self.sample_rate = self.sample_rate.clamp(1, CPU_HZ);
        self.sample_clock %= CPU_HZ;
        self.frame_cycle = self.frame_cycle.min(HALF_FRAME_CYCLES);
        self.pulse1.step &= 7;
        self.pulse2.step &= 7;
        self.triangle.step &= 31;
        let excess = self.samples.len().saturating_sub(SAMPLE_BUFFER_LIMIT);
        self.samples.drain(..excess);
    }

    #[cfg(test)]
    pub(crate) fn set_raw_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate;
    }

    /// Advance by one CPU cycle
    pub fn tick(&mut self) {
        self.cycle_count += 1;

        self.triangle.clock();
        self.noise.clock();
        if self.cycle_count % 2 == 0 {
            self.pulse1.clock();
            self.pulse2.clock();
        }

        self.frame_cycle += 1;
        if self.frame_cycle >= HALF_FRAME_CYCLES {
            self.frame_cycle = 0;
            self.clock_lengths();
        }

        self.sample_clock += self.sample_rate;
        if self.sample_clock >= CPU_HZ {
            self.sample_clock -= CPU_HZ;
            if self.samples.len() == SAMPLE_BUFFER_LIMIT {
                self.samples.pop_front();
            }
            self.samples.push_back(self.mix());
        }
    }

    fn clock_lengths(&mut self) {
        if !self.pulse1.halted() && self.pulse1.length > 0 {
            self.pulse1.length -= 1;
        }
        if !self.pulse2.halted() && self.pulse2.length > 0 {
            self.pulse2.length -= 1;
        }
        if !self.triangle.halted() && self.triangle.length > 0 {
            self.triangle.length -= 1;
        }
        if !self.noise.halted() && self.noise.length > 0 {
            self.noise.length -= 1;
        }
    }

    /// Linear approximation of the channel mixer, in 0.0..=1.0
    fn mix(&self) -> f32 {
        let pulse = (self.pulse1.output() + self.pulse2.output()) as f32;
        0.00752 * pulse
            + 0.00851 * self.triangle.output() as f32
            + 0.00494 * self.noise.output() as f32
            + 0.00335 * self.dmc_level as f32
    }

    /// Get the current cycle count
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// $4015 read: length counter status per channel
    pub fn read_status(&mut self) -> u8 {
        let mut status = 0;
        if self.pulse1.length > 0 {
            status |= 0x01;
        }
        if self.pulse2.length > 0 {
            status |= 0x02;
        }
        if self.triangle.length > 0 {
            status |= 0x04;
        }
        if self.noise.length > 0 {
            status |= 0x08;
        }
        status
    }

    /// Write to an APU register ($4000-$4013, $4015, $4017)
    pub fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0x4000..=0x4003 => self.pulse1.write(address, value),
            0x4004..=0x4007 => self.pulse2.write(address, value),
            0x4008..=0x400B => self.triangle.write(address, value),
            0x400C..=0x400F => self.noise.write(address, value),
            0x4011 => self.dmc_level = value & 0x7F,
            0x4010 | 0x4012 | 0x4013 => {} // DMC sample playback
            0x4015 => {
                self.pulse1.enabled = value & 0x01 != 0;
                self.pulse2.enabled = value & 0x02 != 0;
                self.triangle.enabled = value & 0x04 != 0;
                self.noise.enabled = value & 0x08 != 0;
                self.dmc_enabled = value & 0x10 != 0;
                if !self.pulse1.enabled {
                    self.pulse1.length = 0;
                }
                if !self.pulse2.enabled {
                    self.pulse2.length = 0;
                }
                if !self.triangle.enabled {
                    self.triangle.length = 0;
                }
                if !self.noise.enabled {
                    self.noise.length = 0;
                }
            }
            0x4017 => {
                self.frame_mode = value & 0xC0;
                self.frame_cycle = 0;
                // Five-step mode clocks the length counters immediately
                if value & 0x80 != 0 {
                    self.clock_lengths();
                }
            }
            _ => {}
        }
    }

    /// Pop the oldest buffered sample
    pub fn next_sample(&mut self) -> Option<f32> {
        self.samples.pop_front()
    }

    /// Number of buffered samples
    pub fn samples_available(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new(44_100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_restores_ranges() {
        let mut apu = Apu::new(44_100);
        apu.sample_rate = 0;
        apu.sample_clock = u32::MAX;
        apu.pulse1.step = 200;
        apu.triangle.step = 40;
        apu.samples.extend(std::iter::repeat(0.0).take(SAMPLE_BUFFER_LIMIT + 10));

        apu.normalize();
        assert_eq!(apu.sample_rate(), 1);
        assert!(apu.sample_clock < CPU_HZ);
        assert!(apu.pulse1.step < 8);
        assert!(apu.triangle.step < 32);
        assert_eq!(apu.samples_available(), SAMPLE_BUFFER_LIMIT);

        // Runs without indexing past the tables
        for _ in 0..100 {
            apu.tick();
        }
    }

    #[test]
    fn test_apu_reset() {
        let mut apu = Apu::new(44_100);
        apu.tick();
        apu.reset();
        assert_eq!(apu.cycle_count(), 0);
        assert_eq!(apu.sample_rate(), 44_100);
    }

    #[test]
    fn test_length_counter_load_and_status() {
        let mut apu = Apu::new(44_100);
        // Disabled channels ignore length loads
        apu.write_register(0x4003, 0x08);
        assert_eq!(apu.read_status(), 0);

        apu.write_register(0x4015, 0x0F);
        apu.write_register(0x4003, 0x08);
        apu.write_register(0x400B, 0x08);
        assert_eq!(apu.read_status(), 0x05);

        apu.write_register(0x4015, 0x04);
        assert_eq!(apu.read_status(), 0x04);
    }

    #[test]
    fn test_length_counter_expires() {
        let mut apu = Apu::new(44_100);
        apu.write_register(0x4015, 0x01);
        // Index 3 loads a length of 2
        apu.write_register(0x4003, 3 << 3);
        for _ in 0..HALF_FRAME_CYCLES * 2 {
            apu.tick();
        }
        assert_eq!(apu.read_status() & 0x01, 0);
    }

    #[test]
    fn test_halt_keeps_length() {
        let mut apu = Apu::new(44_100);
        apu.write_register(0x4015, 0x01);
        apu.write_register(0x4000, 0x20);
        apu.write_register(0x4003, 3 << 3);
        for _ in 0..HALF_FRAME_CYCLES * 4 {
            apu.tick();
        }
        assert_eq!(apu.read_status() & 0x01, 0x01);
    }

    #[test]
    fn test_sample_rate() {
        let mut apu = Apu::new(44_100);
        for _ in 0..CPU_HZ / 10 {
            apu.tick();
        }
        let produced = apu.samples_available();
        assert!((4409..=4411).contains(&produced), "{}", produced);
        assert!(apu.next_sample().is_some());
        assert_eq!(apu.samples_available(), produced - 1);
    }

    #[test]
    fn test_silent_by_default() {
        let mut apu = Apu::new(44_100);
        for _ in 0..1000 {
            apu.tick();
        }
        while let Some(sample) = apu.next_sample() {
            assert_eq!(sample, 0.0);
        }
    }

    #[test]
    fn test_dmc_level_drives_output() {
        let mut apu = Apu::new(44_100);
        apu.write_register(0x4011, 0x40);
        for _ in 0..100 {
            apu.tick();
        }
        let sample = apu.next_sample().unwrap_or_default();
        assert!(sample > 0.0);
    }
}
