//! System configuration and NTSC timing constants.

/// CPU cycles per video frame (NTSC, rounded down)
pub const CYCLES_PER_FRAME: u64 = 29_780;
/// CPU clock in Hz (NTSC)
pub const CPU_HZ: u32 = 1_789_773;
/// PPU dots per scanline
pub const DOTS_PER_SCANLINE: u16 = 341;
/// Scanlines per frame including pre-render and VBlank
pub const SCANLINES_PER_FRAME: u16 = 262;
/// PPU dots per CPU cycle
pub const PPU_DOTS_PER_CPU_CYCLE: u32 = 3;

/// Slowest accepted speed multiplier
pub const MIN_SPEED: f32 = 0.1;
/// Fastest accepted speed multiplier
pub const MAX_SPEED: f32 = 8.0;

/// Emulation session settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemConfig {
    /// Emulated time per `run_frame` is divided by this factor
    pub speed: f32,
    /// Audio samples produced per emulated second
    pub sample_rate: u32,
}

impl SystemConfig {
    /// Speed multiplier with out-of-range values pulled back into range.
    /// Non-finite or non-positive values fall back to 1.0.
    #[must_use]
    pub fn sanitized_speed(speed: f32) -> f32 {
        if !speed.is_finite() || speed <= 0.0 {
            log::warn!("invalid speed multiplier {}, using 1.0", speed);
            return 1.0;
        }
        let clamped = speed.clamp(MIN_SPEED, MAX_SPEED);
        if clamped != speed {
            log::warn!("speed multiplier {} clamped to {}", speed, clamped);
        }
        clamped
    }

    /// CPU cycles covered by one `run_frame` at this speed
    #[must_use]
    pub fn cycles_per_frame(&self) -> u64 {
        (CYCLES_PER_FRAME as f64 / self.speed as f64) as u64
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            sample_rate: 44_100,
        }
    }
}
