//! CPU tests for the NES emulator

use nes_core::cpu::{decode, Bus, Cpu, Opcode, StatusFlags, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};

/// 64KB of plain RAM
struct FlatBus {
    memory: Vec<u8>,
}

impl FlatBus {
    fn with_program(origin: u16, program: &[u8]) -> Self {
        let mut memory = vec![0; 0x10000];
        memory[origin as usize..origin as usize + program.len()].copy_from_slice(program);
        memory[RESET_VECTOR as usize] = origin as u8;
        memory[RESET_VECTOR as usize + 1] = (origin >> 8) as u8;
        Self { memory }
    }
}

impl Bus for FlatBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }
}

fn boot(origin: u16, program: &[u8]) -> (Cpu, FlatBus) {
    let mut bus = FlatBus::with_program(origin, program);
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    (cpu, bus)
}

#[test]
fn test_cpu_reset() {
    let (cpu, _) = boot(0x1234, &[]);

    assert_eq!(cpu.registers().a, 0);
    assert_eq!(cpu.registers().x, 0);
    assert_eq!(cpu.registers().y, 0);
    assert_eq!(cpu.registers().sp, 0xFD);
    assert_eq!(cpu.registers().pc, 0x1234);
    assert!(cpu.status().interrupt());
    assert_eq!(cpu.total_cycles(), 0);
}

#[test]
fn test_status_flags() {
    let mut flags = StatusFlags::new(0xFF);
    assert!(flags.carry());
    assert!(flags.zero());
    assert!(flags.interrupt());
    assert!(flags.overflow());
    assert!(flags.negative());

    flags.set_carry(false);
    assert!(!flags.carry());

    flags.set_overflow(false);
    assert!(!flags.overflow());
    assert_eq!(flags.bits(), 0xFF & !StatusFlags::CARRY & !StatusFlags::OVERFLOW);
}

#[test]
fn test_adc_signed_overflow() {
    // CLC; LDA #$50; ADC #$50
    let (mut cpu, mut bus) = boot(0x8000, &[0x18, 0xA9, 0x50, 0x69, 0x50]);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().a, 0xA0);
    assert!(cpu.status().overflow());
    assert!(!cpu.status().carry());
    assert!(cpu.status().negative());
}

#[test]
fn test_adc_carry_out() {
    // SEC; LDA #$FF; ADC #$00
    let (mut cpu, mut bus) = boot(0x8000, &[0x38, 0xA9, 0xFF, 0x69, 0x00]);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().a, 0x00);
    assert!(cpu.status().carry());
    assert!(cpu.status().zero());
    assert!(!cpu.status().overflow());
}

#[test]
fn test_sbc_borrow() {
    // SEC; LDA #$00; SBC #$01
    let (mut cpu, mut bus) = boot(0x8000, &[0x38, 0xA9, 0x00, 0xE9, 0x01]);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.registers().a, 0xFF);
    assert!(!cpu.status().carry());
    assert!(cpu.status().negative());
}

#[test]
fn test_compare_leaves_register() {
    // LDA #$40; CMP #$41
    let (mut cpu, mut bus) = boot(0x8000, &[0xA9, 0x40, 0xC9, 0x41]);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().a, 0x40);
    assert!(!cpu.status().carry());
    assert!(cpu.status().negative());
    assert!(!cpu.status().zero());
}

#[test]
fn test_branch_not_taken() {
    // BEQ +$10 with Z clear
    let (mut cpu, mut bus) = boot(0x8000, &[0xF0, 0x10]);
    cpu.status_mut().set_zero(false);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.registers().pc, 0x8002);
}

#[test]
fn test_branch_taken_same_page() {
    let (mut cpu, mut bus) = boot(0x8000, &[0xF0, 0x10]);
    cpu.status_mut().set_zero(true);
    assert_eq!(cpu.step(&mut bus), 3);
    assert_eq!(cpu.registers().pc, 0x8012);
}

#[test]
fn test_branch_taken_page_cross() {
    let (mut cpu, mut bus) = boot(0x80F0, &[0xF0, 0x20]);
    cpu.status_mut().set_zero(true);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.registers().pc, 0x8112);
}

#[test]
fn test_branch_backwards_page_cross() {
    // BNE -4 from $8001 lands at $7FFE
    let (mut cpu, mut bus) = boot(0x8000, &[0xD0, 0xFC]);
    cpu.status_mut().set_zero(false);
    assert_eq!(cpu.step(&mut bus), 4);
    assert_eq!(cpu.registers().pc, 0x7FFE);
}

#[test]
fn test_jmp_indirect_page_wrap() {
    let (mut cpu, mut bus) = boot(0x8000, &[0x6C, 0xFF, 0x30]);
    bus.memory[0x30FF] = 0x40;
    bus.memory[0x3000] = 0x12;
    bus.memory[0x3100] = 0x99;
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(cpu.registers().pc, 0x1240);
}

#[test]
fn test_absolute_x_page_penalty() {
    // LDX #$01; LDA $80FF,X; STA $80FF,X
    let (mut cpu, mut bus) = boot(0x8000, &[0xA2, 0x01, 0xBD, 0xFF, 0x80, 0x9D, 0xFF, 0x80]);
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 5);
    // Stores always take the fixed cost
    assert_eq!(cpu.step(&mut bus), 5);
}

#[test]
fn test_indirect_y_page_penalty() {
    // LDY #$10; LDA ($20),Y with pointer $01F8
    let (mut cpu, mut bus) = boot(0x8000, &[0xA0, 0x10, 0xB1, 0x20]);
    bus.memory[0x20] = 0xF8;
    bus.memory[0x21] = 0x01;
    bus.memory[0x0208] = 0x5A;
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.registers().a, 0x5A);
}

#[test]
fn test_jsr_rts() {
    // JSR $9000 ... $9000: RTS
    let (mut cpu, mut bus) = boot(0x8000, &[0x20, 0x00, 0x90]);
    bus.memory[0x9000] = 0x60;
    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.registers().pc, 0x9000);
    // Return address minus one is on the stack
    assert_eq!(bus.memory[0x01FD], 0x80);
    assert_eq!(bus.memory[0x01FC], 0x02);
    assert_eq!(cpu.step(&mut bus), 6);
    assert_eq!(cpu.registers().pc, 0x8003);
    assert_eq!(cpu.registers().sp, 0xFD);
}

#[test]
fn test_brk_and_rti() {
    let (mut cpu, mut bus) = boot(0x8000, &[0x00, 0xFF]);
    bus.memory[IRQ_VECTOR as usize] = 0x00;
    bus.memory[IRQ_VECTOR as usize + 1] = 0x90;
    bus.memory[0x9000] = 0x40; // RTI
    cpu.status_mut().set_interrupt(false);

    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.registers().pc, 0x9000);
    assert!(cpu.status().interrupt());
    // Pushed status carries B
    assert_eq!(bus.memory[0x01FB] & StatusFlags::BREAK, StatusFlags::BREAK);

    assert_eq!(cpu.step(&mut bus), 6);
    // BRK skips its padding byte
    assert_eq!(cpu.registers().pc, 0x8002);
    assert!(!cpu.status().interrupt());
}

#[test]
fn test_nmi_sequence() {
    let (mut cpu, mut bus) = boot(0x8000, &[0xEA]);
    bus.memory[NMI_VECTOR as usize] = 0x00;
    bus.memory[NMI_VECTOR as usize + 1] = 0xA0;

    cpu.trigger_nmi();
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.registers().pc, 0xA000);
    assert!(!cpu.nmi_pending());
    // Return address, then status without B
    assert_eq!(bus.memory[0x01FD], 0x80);
    assert_eq!(bus.memory[0x01FC], 0x00);
    assert_eq!(bus.memory[0x01FB] & StatusFlags::BREAK, 0);
    assert_eq!(cpu.registers().sp, 0xFA);
}

#[test]
fn test_irq_respects_interrupt_disable() {
    let (mut cpu, mut bus) = boot(0x8000, &[0xEA, 0x58, 0xEA]);
    bus.memory[IRQ_VECTOR as usize] = 0x00;
    bus.memory[IRQ_VECTOR as usize + 1] = 0xB0;
    cpu.set_irq(true);

    // I is set after reset: the NOP runs
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.registers().pc, 0x8001);
    // CLI
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 7);
    assert_eq!(cpu.registers().pc, 0xB000);
}

#[test]
fn test_undocumented_opcode_is_nop() {
    let (mut cpu, mut bus) = boot(0x8000, &[0x02, 0xA9, 0x07]);
    assert_eq!(decode(0x02).opcode, Opcode::Undocumented);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.registers().pc, 0x8001);
    cpu.step(&mut bus);
    assert_eq!(cpu.registers().a, 0x07);
}

#[test]
fn test_read_modify_write() {
    // LDA #$81; ASL A; ROL $10; INC $10
    let (mut cpu, mut bus) = boot(0x8000, &[0xA9, 0x81, 0x0A, 0x26, 0x10, 0xE6, 0x10]);
    bus.memory[0x10] = 0x40;
    cpu.step(&mut bus);
    assert_eq!(cpu.step(&mut bus), 2);
    assert_eq!(cpu.registers().a, 0x02);
    assert!(cpu.status().carry());
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.memory[0x10], 0x81);
    assert_eq!(cpu.step(&mut bus), 5);
    assert_eq!(bus.memory[0x10], 0x82);
}

#[test]
fn test_cycle_counter_accumulates() {
    // LDA #$01; STA $0200; NOP
    let (mut cpu, mut bus) = boot(0x8000, &[0xA9, 0x01, 0x8D, 0x00, 0x02, 0xEA]);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.total_cycles(), 2 + 4 + 2);
    cpu.add_stall_cycles(513);
    assert_eq!(cpu.total_cycles(), 2 + 4 + 2 + 513);
}
