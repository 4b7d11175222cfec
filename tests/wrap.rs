mod common;

use common::{Rig, asm};

#[test]
fn pc_rewrites_from_wrap_top_to_wrap_bottom() {
    let mut rig = Rig::new(&[asm::NOP, asm::NOP, asm::NOP, asm::NOP]);
    rig.sm.set_wrap_top(3).unwrap();
    rig.sm.set_wrap_bottom(1).unwrap();
    rig.sm.set_pc(3).unwrap();

    rig.tick();
    assert_eq!(rig.sm.pc(), 1);
}

// The wrap applies whatever the ordering of top and bottom.
#[test]
fn wrap_bottom_above_wrap_top_still_applies() {
    let mut rig = Rig::new(&[asm::NOP; 8]);
    rig.sm.set_wrap_top(1).unwrap();
    rig.sm.set_wrap_bottom(5).unwrap();
    rig.sm.set_pc(1).unwrap();

    rig.tick();
    assert_eq!(rig.sm.pc(), 5);
}

#[test]
fn pc_advances_modulo_32_away_from_the_wrap() {
    let mut rig = Rig::new(&[asm::NOP]);
    rig.memory.set(31, asm::NOP);
    rig.sm.set_wrap_top(30).unwrap();
    rig.sm.set_pc(31).unwrap();

    rig.tick();
    assert_eq!(rig.sm.pc(), 0);
}

// A taken JMP at the wrap top wins over the wrap rewrite.
#[test]
fn jumps_override_the_wrap() {
    let mut rig = Rig::new(&[asm::NOP; 8]);
    rig.memory.set(3, asm::jmp(asm::COND_ALWAYS, 7));
    rig.sm.set_wrap_top(3).unwrap();
    rig.sm.set_wrap_bottom(1).unwrap();
    rig.sm.set_pc(3).unwrap();

    rig.tick();
    assert_eq!(rig.sm.pc(), 7);
}

// A stalled instruction at the wrap top keeps its address.
#[test]
fn stalls_do_not_wrap() {
    let mut rig = Rig::new(&[asm::NOP; 4]);
    rig.memory.set(3, asm::pull(false, true));
    rig.sm.set_wrap_top(3).unwrap();
    rig.sm.set_pc(3).unwrap();

    rig.ticks(3);
    assert_eq!(rig.sm.pc(), 3);
    rig.sm.fifo_mut().tx_push(1);
    rig.tick();
    assert_eq!(rig.sm.pc(), 0);
}
