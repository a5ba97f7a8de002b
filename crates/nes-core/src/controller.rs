//! Controller input handling
//!
//! Standard pads are read serially through $4016/$4017. Writing bit 0 of
//! $4016 high latches the live button state; each read returns the next
//! button in the order A, B, Select, Start, Up, Down, Left, Right. After the
//! eighth read the pad returns 1.

use bincode::{Decode, Encode};

/// Button constants
pub const BUTTON_A: u8 = 0;
pub const BUTTON_B: u8 = 1;
pub const BUTTON_SELECT: u8 = 2;
pub const BUTTON_START: u8 = 3;
pub const BUTTON_UP: u8 = 4;
pub const BUTTON_DOWN: u8 = 5;
pub const BUTTON_LEFT: u8 = 6;
pub const BUTTON_RIGHT: u8 = 7;

/// Upper data lines read back as open bus from the high address byte
const OPEN_BUS: u8 = 0x40;

/// Standard NES controller
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct StandardController {
    /// Live button state, one bit per button
    buttons: u8,
    strobe: bool,
    shift: u8,
}

impl StandardController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: u8, pressed: bool) {
        if button >= 8 {
            return;
        }
        if pressed {
            self.buttons |= 1 << button;
        } else {
            self.buttons &= !(1 << button);
        }
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    pub fn strobe_write(&mut self, value: u8) {
        self.strobe = value & 0x01 != 0;
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return (self.buttons & 1) | OPEN_BUS;
        }
        let bit = self.shift & 1;
        self.shift = (self.shift >> 1) | 0x80;
        bit | OPEN_BUS
    }
}

/// Both controller ports
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct ControllerPorts {
    pub port1: StandardController,
    pub port2: StandardController,
}

impl ControllerPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port by index (0 or 1)
    pub fn port_mut(&mut self, port: usize) -> Option<&mut StandardController> {
        match port {
            0 => Some(&mut self.port1),
            1 => Some(&mut self.port2),
            _ => None,
        }
    }

    /// $4016 write: strobe goes to both pads
    pub fn write(&mut self, value: u8) {
        self.port1.strobe_write(value);
        self.port2.strobe_write(value);
    }

    /// $4016 / $4017 read
    pub fn read(&mut self, address: u16) -> u8 {
        if address == 0x4016 {
            self.port1.read()
        } else {
            self.port2.read()
        }
    }
}
