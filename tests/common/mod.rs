#![allow(dead_code)]

use pio_sim::gpio::Pads;
use pio_sim::irq::IrqFlags;
use pio_sim::memory::CodeMemory;
use pio_sim::{SmIndex, StateMachine};

/// One state machine wired to fresh collaborators, program preloaded at 0.
pub struct Rig {
    pub sm: StateMachine,
    pub memory: CodeMemory,
    pub pads: Pads,
    pub irq: IrqFlags,
}

impl Rig {
    pub fn new(program: &[u16]) -> Self {
        Self::with_index(program, SmIndex::Sm0)
    }

    pub fn with_index(program: &[u16], index: SmIndex) -> Self {
        let mut memory = CodeMemory::new();
        memory.load(0, program).expect("program fits in code RAM");
        let mut sm = StateMachine::new(index);
        sm.enable();
        Rig {
            sm,
            memory,
            pads: Pads::new(),
            irq: IrqFlags::new(),
        }
    }

    pub fn tick(&mut self) {
        self.sm
            .clock_rising_edge(&self.memory, &mut self.pads, &mut self.irq)
            .expect("instruction decodes");
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn try_tick(&mut self) -> Result<(), pio_sim::DecodeError> {
        self.sm
            .clock_rising_edge(&self.memory, &mut self.pads, &mut self.irq)
    }
}

/// Hand-assembled instruction words, kept independent of the crate's own
/// decoder so the tests double as an encoding oracle.
pub mod asm {
    pub const COND_ALWAYS: u16 = 0;
    pub const COND_X_ZERO: u16 = 1;
    pub const COND_X_DEC: u16 = 2;
    pub const COND_Y_ZERO: u16 = 3;
    pub const COND_Y_DEC: u16 = 4;
    pub const COND_X_NE_Y: u16 = 5;
    pub const COND_PIN: u16 = 6;
    pub const COND_OSR_NOT_EMPTY: u16 = 7;

    pub const WAIT_GPIO: u16 = 0;
    pub const WAIT_PIN: u16 = 1;
    pub const WAIT_IRQ: u16 = 2;

    pub const SRC_PINS: u16 = 0;
    pub const SRC_X: u16 = 1;
    pub const SRC_Y: u16 = 2;
    pub const SRC_NULL: u16 = 3;
    pub const SRC_STATUS: u16 = 5;
    pub const SRC_ISR: u16 = 6;
    pub const SRC_OSR: u16 = 7;

    pub const DST_PINS: u16 = 0;
    pub const DST_X: u16 = 1;
    pub const DST_Y: u16 = 2;
    pub const DST_NULL: u16 = 3;
    pub const DST_PINDIRS: u16 = 4;
    pub const DST_EXEC_MOV: u16 = 4;
    pub const DST_PC: u16 = 5;
    pub const DST_ISR: u16 = 6;
    pub const DST_EXEC_OUT: u16 = 7;
    pub const DST_OSR: u16 = 7;

    pub const OP_NONE: u16 = 0;
    pub const OP_INVERT: u16 = 1;
    pub const OP_REVERSE: u16 = 2;

    /// MOV Y, Y.
    pub const NOP: u16 = 0xa042;

    /// OR the raw delay/side-set field into a word.
    pub const fn with_field(word: u16, field: u16) -> u16 {
        word | ((field & 0x1f) << 8)
    }

    pub const fn jmp(condition: u16, address: u16) -> u16 {
        (condition << 5) | (address & 0x1f)
    }

    pub const fn wait(polarity: u16, source: u16, index: u16) -> u16 {
        0x2000 | (polarity << 7) | (source << 5) | (index & 0x1f)
    }

    pub const fn in_from(source: u16, count: u16) -> u16 {
        0x4000 | (source << 5) | (count & 0x1f)
    }

    pub const fn out_to(destination: u16, count: u16) -> u16 {
        0x6000 | (destination << 5) | (count & 0x1f)
    }

    pub const fn push(if_full: bool, block: bool) -> u16 {
        0x8000 | ((if_full as u16) << 6) | ((block as u16) << 5)
    }

    pub const fn pull(if_empty: bool, block: bool) -> u16 {
        0x8080 | ((if_empty as u16) << 6) | ((block as u16) << 5)
    }

    pub const fn mov(destination: u16, op: u16, source: u16) -> u16 {
        0xa000 | (destination << 5) | (op << 3) | source
    }

    pub const fn irq_set(wait: bool, index: u16) -> u16 {
        0xc000 | ((wait as u16) << 5) | (index & 0x1f)
    }

    pub const fn irq_clear(index: u16) -> u16 {
        0xc040 | (index & 0x1f)
    }

    pub const fn set(destination: u16, data: u16) -> u16 {
        0xe000 | (destination << 5) | (data & 0x1f)
    }
}
