//! CPU module - 2A03 (6502 variant) implementation
//!
//! The NES uses a modified 6502 CPU without decimal mode. The interpreter is
//! instruction-stepped: `step` runs one instruction (or one interrupt entry)
//! to completion and returns the cycles it took, including page-cross and
//! branch penalties.

use std::fmt;

use bincode::{Decode, Encode};

/// NMI vector address
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector address
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector address
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles taken to enter an interrupt handler
pub const INTERRUPT_CYCLES: u32 = 7;
/// Cost of an undocumented opcode
pub const UNDOCUMENTED_CYCLES: u8 = 2;

const STACK_BASE: u16 = 0x0100;

/// Bus trait for memory and I/O access
pub trait Bus {
    /// Read a byte from the given address
    fn read(&mut self, address: u16) -> u8;
    /// Write a byte to the given address
    fn write(&mut self, address: u16, value: u8);

    /// Read a little-endian word
    fn read_u16(&mut self, address: u16) -> u16 {
        let lo = self.read(address) as u16;
        let hi = self.read(address.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Write a little-endian word
    fn write_u16(&mut self, address: u16, value: u16) {
        self.write(address, value as u8);
        self.write(address.wrapping_add(1), (value >> 8) as u8);
    }
}

/// 2A03 CPU registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct CpuRegisters {
    pub a: u8,    // Accumulator
    pub x: u8,    // X index register
    pub y: u8,    // Y index register
    pub sp: u8,   // Stack pointer
    pub pc: u16,  // Program counter
}

impl Default for CpuRegisters {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD, // Stack starts at $01FD
            pc: 0,    // Will be set by reset vector
        }
    }
}

/// CPU status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const CARRY: u8 = 0b00000001;
    pub const ZERO: u8 = 0b00000010;
    pub const INTERRUPT: u8 = 0b00000100;
    pub const DECIMAL: u8 = 0b00001000;
    pub const BREAK: u8 = 0b00010000;
    pub const UNUSED: u8 = 0b00100000;
    pub const OVERFLOW: u8 = 0b01000000;
    pub const NEGATIVE: u8 = 0b10000000;

    pub fn new(flags: u8) -> Self {
        Self(flags)
    }

    /// Packed status byte; bit 5 always reads as 1
    pub fn bits(&self) -> u8 {
        self.0 | Self::UNUSED
    }

    /// Byte pushed to the stack. B is set only for BRK and PHP.
    pub fn to_pushed(&self, brk: bool) -> u8 {
        let bits = self.bits() & !Self::BREAK;
        if brk {
            bits | Self::BREAK
        } else {
            bits
        }
    }

    /// Status restored by PLP/RTI; the pulled B bit is not latched
    pub fn from_pulled(value: u8) -> Self {
        Self((value & !Self::BREAK) | Self::UNUSED)
    }

    pub fn carry(&self) -> bool {
        (self.0 & Self::CARRY) != 0
    }

    pub fn zero(&self) -> bool {
        (self.0 & Self::ZERO) != 0
    }

    pub fn interrupt(&self) -> bool {
        (self.0 & Self::INTERRUPT) != 0
    }

    pub fn decimal(&self) -> bool {
        (self.0 & Self::DECIMAL) != 0
    }

    pub fn break_flag(&self) -> bool {
        (self.0 & Self::BREAK) != 0
    }

    pub fn overflow(&self) -> bool {
        (self.0 & Self::OVERFLOW) != 0
    }

    pub fn negative(&self) -> bool {
        (self.0 & Self::NEGATIVE) != 0
    }

    fn set(&mut self, mask: u8, val: bool) {
        self.0 = if val { self.0 | mask } else { self.0 & !mask };
    }

    pub fn set_carry(&mut self, val: bool) {
        self.set(Self::CARRY, val);
    }

    pub fn set_zero(&mut self, val: bool) {
        self.set(Self::ZERO, val);
    }

    pub fn set_interrupt(&mut self, val: bool) {
        self.set(Self::INTERRUPT, val);
    }

    pub fn set_decimal(&mut self, val: bool) {
        self.set(Self::DECIMAL, val);
    }

    pub fn set_break(&mut self, val: bool) {
        self.set(Self::BREAK, val);
    }

    pub fn set_overflow(&mut self, val: bool) {
        self.set(Self::OVERFLOW, val);
    }

    pub fn set_negative(&mut self, val: bool) {
        self.set(Self::NEGATIVE, val);
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "C:{} Z:{} I:{} D:{} B:{} U:1 V:{} N:{}",
            self.carry() as u8,
            self.zero() as u8,
            self.interrupt() as u8,
            self.decimal() as u8,
            self.break_flag() as u8,
            self.overflow() as u8,
            self.negative() as u8
        )
    }
}

/// CPU instruction mnemonic
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
    /// Any opcode outside the documented set; executes as a 1-byte NOP
    Undocumented,
}

impl Opcode {
    /// Instructions whose indexed forms pay a cycle on page cross
    fn pays_page_penalty(self) -> bool {
        use Opcode::*;
        matches!(self, ADC | AND | CMP | EOR | LDA | LDX | LDY | ORA | SBC)
    }
}

/// Addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

/// CPU instruction info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionInfo {
    pub opcode: Opcode,
    pub mode: AddressingMode,
    pub cycles: u8,
    pub page_cycle: bool, // Extra cycle if page crossed
}

/// Decode an opcode byte
pub fn decode(byte: u8) -> InstructionInfo {
    use AddressingMode::*;
    use Opcode::*;

    let (opcode, mode, cycles) = match byte {
        0x69 => (ADC, Immediate, 2),
        0x65 => (ADC, ZeroPage, 3),
        0x75 => (ADC, ZeroPageX, 4),
        0x6D => (ADC, Absolute, 4),
        0x7D => (ADC, AbsoluteX, 4),
        0x79 => (ADC, AbsoluteY, 4),
        0x61 => (ADC, IndirectX, 6),
        0x71 => (ADC, IndirectY, 5),
        0x29 => (AND, Immediate, 2),
        0x25 => (AND, ZeroPage, 3),
        0x35 => (AND, ZeroPageX, 4),
        0x2D => (AND, Absolute, 4),
        0x3D => (AND, AbsoluteX, 4),
        0x39 => (AND, AbsoluteY, 4),
        0x21 => (AND, IndirectX, 6),
        0x31 => (AND, IndirectY, 5),
        0x0A => (ASL, Accumulator, 2),
        0x06 => (ASL, ZeroPage, 5),
        0x16 => (ASL, ZeroPageX, 6),
        0x0E => (ASL, Absolute, 6),
        0x1E => (ASL, AbsoluteX, 7),
        0x90 => (BCC, Relative, 2),
        0xB0 => (BCS, Relative, 2),
        0xF0 => (BEQ, Relative, 2),
        0x30 => (BMI, Relative, 2),
        0xD0 => (BNE, Relative, 2),
        0x10 => (BPL, Relative, 2),
        0x50 => (BVC, Relative, 2),
        0x70 => (BVS, Relative, 2),
        0x24 => (BIT, ZeroPage, 3),
        0x2C => (BIT, Absolute, 4),
        0x00 => (BRK, Implied, 7),
        0x18 => (CLC, Implied, 2),
        0xD8 => (CLD, Implied, 2),
        0x58 => (CLI, Implied, 2),
        0xB8 => (CLV, Implied, 2),
        0xC9 => (CMP, Immediate, 2),
        0xC5 => (CMP, ZeroPage, 3),
        0xD5 => (CMP, ZeroPageX, 4),
        0xCD => (CMP, Absolute, 4),
        0xDD => (CMP, AbsoluteX, 4),
        0xD9 => (CMP, AbsoluteY, 4),
        0xC1 => (CMP, IndirectX, 6),
        0xD1 => (CMP, IndirectY, 5),
        0xE0 => (CPX, Immediate, 2),
        0xE4 => (CPX, ZeroPage, 3),
        0xEC => (CPX, Absolute, 4),
        0xC0 => (CPY, Immediate, 2),
        0xC4 => (CPY, ZeroPage, 3),
        0xCC => (CPY, Absolute, 4),
        0xC6 => (DEC, ZeroPage, 5),
        0xD6 => (DEC, ZeroPageX, 6),
        0xCE => (DEC, Absolute, 6),
        0xDE => (DEC, AbsoluteX, 7),
        0xCA => (DEX, Implied, 2),
        0x88 => (DEY, Implied, 2),
        0x49 => (EOR, Immediate, 2),
        0x45 => (EOR, ZeroPage, 3),
        0x55 => (EOR, ZeroPageX, 4),
        0x4D => (EOR, Absolute, 4),
        0x5D => (EOR, AbsoluteX, 4),
        0x59 => (EOR, AbsoluteY, 4),
        0x41 => (EOR, IndirectX, 6),
        0x51 => (EOR, IndirectY, 5),
        0xE6 => (INC, ZeroPage, 5),
        0xF6 => (INC, ZeroPageX, 6),
        0xEE => (INC, Absolute, 6),
        0xFE => (INC, AbsoluteX, 7),
        0xE8 => (INX, Implied, 2),
        0xC8 => (INY, Implied, 2),
        0x4C => (JMP, Absolute, 3),
        0x6C => (JMP, Indirect, 5),
        0x20 => (JSR, Absolute, 6),
        0xA9 => (LDA, Immediate, 2),
        0xA5 => (LDA, ZeroPage, 3),
        0xB5 => (LDA, ZeroPageX, 4),
        0xAD => (LDA, Absolute, 4),
        0xBD => (LDA, AbsoluteX, 4),
        0xB9 => (LDA, AbsoluteY, 4),
        0xA1 => (LDA, IndirectX, 6),
        0xB1 => (LDA, IndirectY, 5),
        0xA2 => (LDX, Immediate, 2),
        0xA6 => (LDX, ZeroPage, 3),
        0xB6 => (LDX, ZeroPageY, 4),
        0xAE => (LDX, Absolute, 4),
        0xBE => (LDX, AbsoluteY, 4),
        0xA0 => (LDY, Immediate, 2),
        0xA4 => (LDY, ZeroPage, 3),
        0xB4 => (LDY, ZeroPageX, 4),
        0xAC => (LDY, Absolute, 4),
        0xBC => (LDY, AbsoluteX, 4),
        0x4A => (LSR, Accumulator, 2),
        0x46 => (LSR, ZeroPage, 5),
        0x56 => (LSR, ZeroPageX, 6),
        0x4E => (LSR, Absolute, 6),
        0x5E => (LSR, AbsoluteX, 7),
        0xEA => (NOP, Implied, 2),
        0x09 => (ORA, Immediate, 2),
        0x05 => (ORA, ZeroPage, 3),
        0x15 => (ORA, ZeroPageX, 4),
        0x0D => (ORA, Absolute, 4),
        0x1D => (ORA, AbsoluteX, 4),
        0x19 => (ORA, AbsoluteY, 4),
        0x01 => (ORA, IndirectX, 6),
        0x11 => (ORA, IndirectY, 5),
        0x48 => (PHA, Implied, 3),
        0x08 => (PHP, Implied, 3),
        0x68 => (PLA, Implied, 4),
        0x28 => (PLP, Implied, 4),
        0x2A => (ROL, Accumulator, 2),
        0x26 => (ROL, ZeroPage, 5),
        0x36 => (ROL, ZeroPageX, 6),
        0x2E => (ROL, Absolute, 6),
        0x3E => (ROL, AbsoluteX, 7),
        0x6A => (ROR, Accumulator, 2),
        0x66 => (ROR, ZeroPage, 5),
        0x76 => (ROR, ZeroPageX, 6),
        0x6E => (ROR, Absolute, 6),
        0x7E => (ROR, AbsoluteX, 7),
        0x40 => (RTI, Implied, 6),
        0x60 => (RTS, Implied, 6),
        0xE9 => (SBC, Immediate, 2),
        0xE5 => (SBC, ZeroPage, 3),
        0xF5 => (SBC, ZeroPageX, 4),
        0xED => (SBC, Absolute, 4),
        0xFD => (SBC, AbsoluteX, 4),
        0xF9 => (SBC, AbsoluteY, 4),
        0xE1 => (SBC, IndirectX, 6),
        0xF1 => (SBC, IndirectY, 5),
        0x38 => (SEC, Implied, 2),
        0xF8 => (SED, Implied, 2),
        0x78 => (SEI, Implied, 2),
        0x85 => (STA, ZeroPage, 3),
        0x95 => (STA, ZeroPageX, 4),
        0x8D => (STA, Absolute, 4),
        0x9D => (STA, AbsoluteX, 5),
        0x99 => (STA, AbsoluteY, 5),
        0x81 => (STA, IndirectX, 6),
        0x91 => (STA, IndirectY, 6),
        0x86 => (STX, ZeroPage, 3),
        0x96 => (STX, ZeroPageY, 4),
        0x8E => (STX, Absolute, 4),
        0x84 => (STY, ZeroPage, 3),
        0x94 => (STY, ZeroPageX, 4),
        0x8C => (STY, Absolute, 4),
        0xAA => (TAX, Implied, 2),
        0xA8 => (TAY, Implied, 2),
        0xBA => (TSX, Implied, 2),
        0x8A => (TXA, Implied, 2),
        0x9A => (TXS, Implied, 2),
        0x98 => (TYA, Implied, 2),
        _ => (Undocumented, Implied, UNDOCUMENTED_CYCLES),
    };

    InstructionInfo {
        opcode,
        mode,
        cycles,
        page_cycle: opcode.pays_page_penalty() && matches!(mode, AbsoluteX | AbsoluteY | IndirectY),
    }
}

fn page_crossed(a: u16, b: u16) -> bool {
    (a & 0xFF00) != (b & 0xFF00)
}

/// CPU emulator state
#[derive(Debug, Clone, Encode, Decode)]
pub struct Cpu {
    registers: CpuRegisters,
    status: StatusFlags,
    /// Total cycles executed
    total_cycles: u64,
    /// Edge-latched NMI request, cleared when serviced
    nmi_pending: bool,
    /// Level of the shared IRQ line
    irq_line: bool,
    /// Penalty cycles accumulated by the current instruction
    extra_cycles: u32,
}

impl Cpu {
    /// Create a new CPU instance
    pub fn new() -> Self {
        Self {
            registers: CpuRegisters::default(),
            status: StatusFlags::new(0x24),
            total_cycles: 0,
            nmi_pending: false,
            irq_line: false,
            extra_cycles: 0,
        }
    }

    /// Reset the CPU and load PC from the reset vector
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.registers = CpuRegisters::default();
        self.status = StatusFlags::new(0x24);
        self.total_cycles = 0;
        self.nmi_pending = false;
        self.irq_line = false;
        self.extra_cycles = 0;
        self.registers.pc = bus.read_u16(RESET_VECTOR);
        log::info!("CPU reset, PC = ${:04X}", self.registers.pc);
    }

    /// Get CPU registers
    pub fn registers(&self) -> &CpuRegisters {
        &self.registers
    }

    /// Get mutable CPU registers
    pub fn registers_mut(&mut self) -> &mut CpuRegisters {
        &mut self.registers
    }

    /// Get CPU status flags
    pub fn status(&self) -> &StatusFlags {
        &self.status
    }

    /// Get mutable CPU status flags
    pub fn status_mut(&mut self) -> &mut StatusFlags {
        &mut self.status
    }

    /// Get total cycles executed
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Account for cycles the CPU spent halted (OAM DMA)
    pub fn add_stall_cycles(&mut self, cycles: u32) {
        self.total_cycles += cycles as u64;
    }

    /// Latch an NMI; serviced before the next instruction
    pub fn trigger_nmi(&mut self) {
        self.nmi_pending = true;
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi_pending
    }

    /// Drive the IRQ line level
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Execute one instruction or interrupt entry, returning cycles consumed
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.interrupt(bus, NMI_VECTOR);
            self.total_cycles += INTERRUPT_CYCLES as u64;
            return INTERRUPT_CYCLES;
        }
        if self.irq_line && !self.status.interrupt() {
            self.interrupt(bus, IRQ_VECTOR);
            self.total_cycles += INTERRUPT_CYCLES as u64;
            return INTERRUPT_CYCLES;
        }

        let pc = self.registers.pc;
        let byte = self.fetch(bus);
        let info = decode(byte);
        if info.opcode == Opcode::Undocumented {
            log::trace!("undocumented opcode ${:02X} at ${:04X}", byte, pc);
        }

        self.extra_cycles = 0;
        self.execute(bus, info);

        let cycles = info.cycles as u32 + self.extra_cycles;
        self.total_cycles += cycles as u64;
        cycles
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.registers.pc);
        self.registers.pc = self.registers.pc.wrapping_add(1);
        value
    }

    fn fetch_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus) as u16;
        let hi = self.fetch(bus) as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(STACK_BASE | self.registers.sp as u16, value);
        self.registers.sp = self.registers.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.registers.sp = self.registers.sp.wrapping_add(1);
        bus.read(STACK_BASE | self.registers.sp as u16)
    }

    fn push_u16(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pull_u16(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        (hi << 8) | lo
    }

    fn interrupt(&mut self, bus: &mut impl Bus, vector: u16) {
        self.push_u16(bus, self.registers.pc);
        self.push(bus, self.status.to_pushed(false));
        self.status.set_interrupt(true);
        self.registers.pc = bus.read_u16(vector);
    }

    /// Read a zero-page pointer, wrapping within page zero
    fn read_zp_pointer(bus: &mut impl Bus, zp: u8) -> u16 {
        let lo = bus.read(zp as u16) as u16;
        let hi = bus.read(zp.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    fn indexed(&mut self, base: u16, index: u8, page_cycle: bool) -> u16 {
        let address = base.wrapping_add(index as u16);
        if page_cycle && page_crossed(base, address) {
            self.extra_cycles += 1;
        }
        address
    }

    /// Resolve the effective address for memory operands
    fn operand_address(&mut self, bus: &mut impl Bus, info: InstructionInfo) -> u16 {
        let regs = self.registers;
        match info.mode {
            AddressingMode::Immediate => {
                let address = regs.pc;
                self.registers.pc = regs.pc.wrapping_add(1);
                address
            }
            AddressingMode::ZeroPage => self.fetch(bus) as u16,
            AddressingMode::ZeroPageX => self.fetch(bus).wrapping_add(regs.x) as u16,
            AddressingMode::ZeroPageY => self.fetch(bus).wrapping_add(regs.y) as u16,
            AddressingMode::Absolute => self.fetch_u16(bus),
            AddressingMode::AbsoluteX => {
                let base = self.fetch_u16(bus);
                self.indexed(base, regs.x, info.page_cycle)
            }
            AddressingMode::AbsoluteY => {
                let base = self.fetch_u16(bus);
                self.indexed(base, regs.y, info.page_cycle)
            }
            AddressingMode::Indirect => {
                // The high byte never carries into the next page
                let pointer = self.fetch_u16(bus);
                let lo = bus.read(pointer) as u16;
                let hi = bus.read((pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF)) as u16;
                (hi << 8) | lo
            }
            AddressingMode::IndirectX => {
                let zp = self.fetch(bus).wrapping_add(regs.x);
                Self::read_zp_pointer(bus, zp)
            }
            AddressingMode::IndirectY => {
                let zp = self.fetch(bus);
                let base = Self::read_zp_pointer(bus, zp);
                self.indexed(base, regs.y, info.page_cycle)
            }
            AddressingMode::Implied | AddressingMode::Accumulator | AddressingMode::Relative => {
                regs.pc
            }
        }
    }

    fn set_zn(&mut self, value: u8) {
        self.status.set_zero(value == 0);
        self.status.set_negative(value & 0x80 != 0);
    }

    fn add_with_carry(&mut self, value: u8) {
        let a = self.registers.a;
        let sum = a as u16 + value as u16 + self.status.carry() as u16;
        let result = sum as u8;
        self.status.set_carry(sum > 0xFF);
        self.status.set_overflow((!(a ^ value) & (a ^ result) & 0x80) != 0);
        self.registers.a = result;
        self.set_zn(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set_carry(register >= value);
        self.set_zn(register.wrapping_sub(value));
    }

    fn branch(&mut self, bus: &mut impl Bus, condition: bool) {
        let offset = self.fetch(bus) as i8;
        if condition {
            let from = self.registers.pc;
            let target = from.wrapping_add(offset as u16);
            self.extra_cycles += 1;
            if page_crossed(from, target) {
                self.extra_cycles += 1;
            }
            self.registers.pc = target;
        }
    }

    /// Read-modify-write on the accumulator or memory
    fn modify<F>(&mut self, bus: &mut impl Bus, info: InstructionInfo, op: F)
    where
        F: FnOnce(&mut Self, u8) -> u8,
    {
        if info.mode == AddressingMode::Accumulator {
            let value = self.registers.a;
            self.registers.a = op(self, value);
        } else {
            let address = self.operand_address(bus, info);
            let value = bus.read(address);
            let result = op(self, value);
            bus.write(address, result);
        }
    }

    fn execute(&mut self, bus: &mut impl Bus, info: InstructionInfo) {
        use Opcode::*;

        match info.opcode {
            LDA | LDX | LDY | ADC | SBC | AND | ORA | EOR | CMP | CPX | CPY | BIT => {
                let address = self.operand_address(bus, info);
                let value = bus.read(address);
                match info.opcode {
                    LDA => {
                        self.registers.a = value;
                        self.set_zn(value);
                    }
                    LDX => {
                        self.registers.x = value;
                        self.set_zn(value);
                    }
                    LDY => {
                        self.registers.y = value;
                        self.set_zn(value);
                    }
                    ADC => self.add_with_carry(value),
                    SBC => self.add_with_carry(!value),
                    AND => {
                        self.registers.a &= value;
                        self.set_zn(self.registers.a);
                    }
                    ORA => {
                        self.registers.a |= value;
                        self.set_zn(self.registers.a);
                    }
                    EOR => {
                        self.registers.a ^= value;
                        self.set_zn(self.registers.a);
                    }
                    CMP => self.compare(self.registers.a, value),
                    CPX => self.compare(self.registers.x, value),
                    CPY => self.compare(self.registers.y, value),
                    _ => {
                        self.status.set_zero(self.registers.a & value == 0);
                        self.status.set_overflow(value & 0x40 != 0);
                        self.status.set_negative(value & 0x80 != 0);
                    }
                }
            }

            STA | STX | STY => {
                let address = self.operand_address(bus, info);
                let value = match info.opcode {
                    STA => self.registers.a,
                    STX => self.registers.x,
                    _ => self.registers.y,
                };
                bus.write(address, value);
            }

            ASL => self.modify(bus, info, |cpu, v| {
                cpu.status.set_carry(v & 0x80 != 0);
                let r = v << 1;
                cpu.set_zn(r);
                r
            }),
            LSR => self.modify(bus, info, |cpu, v| {
                cpu.status.set_carry(v & 0x01 != 0);
                let r = v >> 1;
                cpu.set_zn(r);
                r
            }),
            ROL => self.modify(bus, info, |cpu, v| {
                let r = (v << 1) | cpu.status.carry() as u8;
                cpu.status.set_carry(v & 0x80 != 0);
                cpu.set_zn(r);
                r
            }),
            ROR => self.modify(bus, info, |cpu, v| {
                let r = (v >> 1) | ((cpu.status.carry() as u8) << 7);
                cpu.status.set_carry(v & 0x01 != 0);
                cpu.set_zn(r);
                r
            }),
            INC => self.modify(bus, info, |cpu, v| {
                let r = v.wrapping_add(1);
                cpu.set_zn(r);
                r
            }),
            DEC => self.modify(bus, info, |cpu, v| {
                let r = v.wrapping_sub(1);
                cpu.set_zn(r);
                r
            }),

            INX => {
                self.registers.x = self.registers.x.wrapping_add(1);
                self.set_zn(self.registers.x);
            }
            INY => {
                self.registers.y = self.registers.y.wrapping_add(1);
                self.set_zn(self.registers.y);
            }
            DEX => {
                self.registers.x = self.registers.x.wrapping_sub(1);
                self.set_zn(self.registers.x);
            }
            DEY => {
                self.registers.y = self.registers.y.wrapping_sub(1);
                self.set_zn(self.registers.y);
            }

            TAX => {
                self.registers.x = self.registers.a;
                self.set_zn(self.registers.x);
            }
            TAY => {
                self.registers.y = self.registers.a;
                self.set_zn(self.registers.y);
            }
            TXA => {
                self.registers.a = self.registers.x;
                self.set_zn(self.registers.a);
            }
            TYA => {
                self.registers.a = self.registers.y;
                self.set_zn(self.registers.a);
            }
            TSX => {
                self.registers.x = self.registers.sp;
                self.set_zn(self.registers.x);
            }
            TXS => self.registers.sp = self.registers.x,

            BCC => self.branch(bus, !self.status.carry()),
            BCS => self.branch(bus, self.status.carry()),
            BNE => self.branch(bus, !self.status.zero()),
            BEQ => self.branch(bus, self.status.zero()),
            BPL => self.branch(bus, !self.status.negative()),
            BMI => self.branch(bus, self.status.negative()),
            BVC => self.branch(bus, !self.status.overflow()),
            BVS => self.branch(bus, self.status.overflow()),

            JMP => self.registers.pc = self.operand_address(bus, info),
            JSR => {
                let target = self.fetch_u16(bus);
                let ret = self.registers.pc.wrapping_sub(1);
                self.push_u16(bus, ret);
                self.registers.pc = target;
            }
            RTS => self.registers.pc = self.pull_u16(bus).wrapping_add(1),
            RTI => {
                let status = self.pull(bus);
                self.status = StatusFlags::from_pulled(status);
                self.registers.pc = self.pull_u16(bus);
            }
            BRK => {
                // Skip the padding byte
                let ret = self.registers.pc.wrapping_add(1);
                self.push_u16(bus, ret);
                self.push(bus, self.status.to_pushed(true));
                self.status.set_interrupt(true);
                self.registers.pc = bus.read_u16(IRQ_VECTOR);
            }

            PHA => self.push(bus, self.registers.a),
            PHP => self.push(bus, self.status.to_pushed(true)),
            PLA => {
                self.registers.a = self.pull(bus);
                self.set_zn(self.registers.a);
            }
            PLP => {
                let status = self.pull(bus);
                self.status = StatusFlags::from_pulled(status);
            }

            CLC => self.status.set_carry(false),
            SEC => self.status.set_carry(true),
            CLI => self.status.set_interrupt(false),
            SEI => self.status.set_interrupt(true),
            CLD => self.status.set_decimal(false),
            SED => self.status.set_decimal(true),
            CLV => self.status.set_overflow(false),

            NOP | Undocumented => {}
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
