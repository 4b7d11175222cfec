//! Instruction decode and execution.
//!
//! A 16-bit word splits into the opcode class (bits 13..=15), the combined
//! delay/side-set field (bits 8..=12) and class-specific operands
//! (bits 0..=7). Decoding is total: every reserved encoding maps to a
//! [DecodeError] instead of silently doing something else.

use arbitrary_int::u3;

use crate::gpio::{Gpio, Level};
use crate::irq::{IrqFlags, resolve_irq_index};
use crate::sm::{ExecResult, StateMachine};

/// Branch condition of a JMP instruction. All eight encodings are valid.
#[bitbybit::bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JmpCondition {
    Always = 0,
    XZero = 1,
    XDecrement = 2,
    YZero = 3,
    YDecrement = 4,
    XNotEqualY = 5,
    Pin = 6,
    OsrNotEmpty = 7,
}

/// What a WAIT instruction samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitSource {
    /// Absolute pad number.
    Gpio,
    /// Pad relative to the IN window base.
    Pin,
    /// Interrupt flag, absolute or slot-relative.
    Irq,
}

/// Source of an IN shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InSource {
    Pins,
    X,
    Y,
    Null,
    Isr,
    Osr,
}

/// Destination of an OUT shift. All eight encodings are valid.
#[bitbybit::bitenum(u3, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutDestination {
    Pins = 0,
    X = 1,
    Y = 2,
    Null = 3,
    PinDirs = 4,
    Pc = 5,
    Isr = 6,
    Exec = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovDestination {
    Pins,
    X,
    Y,
    Exec,
    Pc,
    Isr,
    Osr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovOp {
    None,
    Invert,
    BitReverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MovSource {
    Pins,
    X,
    Y,
    Null,
    /// All ones while the selected FIFO level is below STATUS_N, else zero.
    Status,
    Isr,
    Osr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetDestination {
    Pins,
    X,
    Y,
    PinDirs,
}

/// Reserved or malformed encodings surfaced by [Instruction::decode].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    #[error("wait source 0b11 is reserved")]
    ReservedWaitSource,
    #[error("in source {0} is reserved")]
    ReservedInSource(u8),
    #[error("mov destination {0} is reserved")]
    ReservedMovDestination(u8),
    #[error("mov operation {0} is reserved")]
    ReservedMovOp(u8),
    #[error("mov source {0} is reserved")]
    ReservedMovSource(u8),
    #[error("set destination {0} is reserved")]
    ReservedSetDestination(u8),
    #[error("push/pull instruction with reserved low bits {0:#04x}")]
    NonZeroPushPullBits(u8),
    #[error("irq instruction with reserved bit 7 set")]
    ReservedIrqBit,
    #[error("irq index {0:#04x} is invalid")]
    InvalidIrqIndex(u8),
}

/// One decoded operation, without its delay/side-set annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    Jmp {
        condition: JmpCondition,
        address: u8,
    },
    Wait {
        polarity: Level,
        source: WaitSource,
        index: u8,
    },
    In {
        source: InSource,
        bit_count: u8,
    },
    Out {
        destination: OutDestination,
        bit_count: u8,
    },
    Push {
        if_full: bool,
        block: bool,
    },
    Pull {
        if_empty: bool,
        block: bool,
    },
    Mov {
        destination: MovDestination,
        op: MovOp,
        source: MovSource,
    },
    Irq {
        clear: bool,
        wait: bool,
        index: u8,
    },
    Set {
        destination: SetDestination,
        data: u8,
    },
}

/// A fully decoded instruction: the operation plus the delay and side-set
/// values extracted from bits 8..=12 under the current PINCTRL/EXECCTRL
/// side-set configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instruction {
    pub operation: Operation,
    /// Idle cycles to insert after the instruction retires.
    pub delay: u8,
    /// Side-set value to drive while executing, if one is present.
    pub side_set: Option<u8>,
}

fn validate_irq_index(index: u8) -> Result<u8, DecodeError> {
    if index & 0x08 != 0 || (index & 0x10 != 0 && index & 0x04 != 0) {
        return Err(DecodeError::InvalidIrqIndex(index));
    }
    Ok(index)
}

/// 0 encodes a full 32-bit shift.
fn bit_count(lsb: u8) -> u8 {
    match lsb & 0x1f {
        0 => 32,
        n => n,
    }
}

impl Instruction {
    /// Decode a 16-bit instruction word against the current side-set
    /// configuration. `sideset_count` values above 5 (reachable only through
    /// raw PINCTRL writes) are treated as 5.
    pub fn decode(word: u16, sideset_count: u8, side_en: bool) -> Result<Self, DecodeError> {
        let lsb = (word & 0xff) as u8;
        let operation = match (word >> 13) & 0x7 {
            0b000 => Operation::Jmp {
                condition: JmpCondition::new_with_raw_value(u3::new((lsb >> 5) & 0x7)),
                address: lsb & 0x1f,
            },
            0b001 => {
                let source = match (lsb >> 5) & 0x3 {
                    0 => WaitSource::Gpio,
                    1 => WaitSource::Pin,
                    2 => WaitSource::Irq,
                    _ => return Err(DecodeError::ReservedWaitSource),
                };
                let index = lsb & 0x1f;
                if source == WaitSource::Irq {
                    validate_irq_index(index)?;
                }
                Operation::Wait {
                    polarity: (lsb & 0x80 != 0).into(),
                    source,
                    index,
                }
            }
            0b010 => Operation::In {
                source: match (lsb >> 5) & 0x7 {
                    0 => InSource::Pins,
                    1 => InSource::X,
                    2 => InSource::Y,
                    3 => InSource::Null,
                    6 => InSource::Isr,
                    7 => InSource::Osr,
                    reserved => return Err(DecodeError::ReservedInSource(reserved)),
                },
                bit_count: bit_count(lsb),
            },
            0b011 => Operation::Out {
                destination: OutDestination::new_with_raw_value(u3::new((lsb >> 5) & 0x7)),
                bit_count: bit_count(lsb),
            },
            0b100 => {
                if lsb & 0x1f != 0 {
                    return Err(DecodeError::NonZeroPushPullBits(lsb & 0x1f));
                }
                if lsb & 0x80 != 0 {
                    Operation::Pull {
                        if_empty: lsb & 0x40 != 0,
                        block: lsb & 0x20 != 0,
                    }
                } else {
                    Operation::Push {
                        if_full: lsb & 0x40 != 0,
                        block: lsb & 0x20 != 0,
                    }
                }
            }
            0b101 => Operation::Mov {
                destination: match (lsb >> 5) & 0x7 {
                    0 => MovDestination::Pins,
                    1 => MovDestination::X,
                    2 => MovDestination::Y,
                    4 => MovDestination::Exec,
                    5 => MovDestination::Pc,
                    6 => MovDestination::Isr,
                    7 => MovDestination::Osr,
                    reserved => return Err(DecodeError::ReservedMovDestination(reserved)),
                },
                op: match (lsb >> 3) & 0x3 {
                    0 => MovOp::None,
                    1 => MovOp::Invert,
                    2 => MovOp::BitReverse,
                    reserved => return Err(DecodeError::ReservedMovOp(reserved)),
                },
                source: match lsb & 0x7 {
                    0 => MovSource::Pins,
                    1 => MovSource::X,
                    2 => MovSource::Y,
                    3 => MovSource::Null,
                    5 => MovSource::Status,
                    6 => MovSource::Isr,
                    7 => MovSource::Osr,
                    reserved => return Err(DecodeError::ReservedMovSource(reserved)),
                },
            },
            0b110 => {
                if lsb & 0x80 != 0 {
                    return Err(DecodeError::ReservedIrqBit);
                }
                Operation::Irq {
                    clear: lsb & 0x40 != 0,
                    wait: lsb & 0x20 != 0,
                    index: validate_irq_index(lsb & 0x1f)?,
                }
            }
            _ => Operation::Set {
                destination: match (lsb >> 5) & 0x7 {
                    0 => SetDestination::Pins,
                    1 => SetDestination::X,
                    2 => SetDestination::Y,
                    4 => SetDestination::PinDirs,
                    reserved => return Err(DecodeError::ReservedSetDestination(reserved)),
                },
                data: lsb & 0x1f,
            },
        };

        let field = ((word >> 8) & 0x1f) as u8;
        let count = sideset_count.min(5);
        let delay = field & (0x1f >> count);
        let side_set = if count == 0 {
            None
        } else if side_en {
            // The top bit of the field is the per-instruction enable; the
            // data sits below it.
            if field & 0x10 != 0 {
                Some((field & 0x0f) >> (5 - count))
            } else {
                None
            }
        } else {
            Some(field >> (5 - count))
        };

        Ok(Instruction {
            operation,
            delay,
            side_set,
        })
    }

    /// Execute against the owning state machine and the shared
    /// collaborators. Side-set is the engine's business and has already been
    /// driven by the time this runs.
    pub fn execute<G: Gpio>(
        &self,
        sm: &mut StateMachine,
        gpio: &mut G,
        irq: &mut IrqFlags,
    ) -> ExecResult {
        match self.operation {
            Operation::Jmp { condition, address } => {
                let taken = match condition {
                    JmpCondition::Always => true,
                    JmpCondition::XZero => sm.x == 0,
                    JmpCondition::XDecrement => {
                        let taken = sm.x != 0;
                        sm.x = sm.x.wrapping_sub(1);
                        taken
                    }
                    JmpCondition::YZero => sm.y == 0,
                    JmpCondition::YDecrement => {
                        let taken = sm.y != 0;
                        sm.y = sm.y.wrapping_sub(1);
                        taken
                    }
                    JmpCondition::XNotEqualY => sm.x != sm.y,
                    JmpCondition::Pin => gpio.pin(sm.execctrl.jmp_pin().value()).is_high(),
                    JmpCondition::OsrNotEmpty => {
                        sm.osr.count() < sm.shiftctrl.pull_threshold()
                    }
                };
                if taken {
                    sm.pc = address & 0x1f;
                    ExecResult::Jump
                } else {
                    ExecResult::Complete
                }
            }
            Operation::Wait {
                polarity,
                source,
                index,
            } => {
                let observed = match source {
                    WaitSource::Gpio => gpio.pin(index),
                    WaitSource::Pin => {
                        gpio.pin((sm.pinctrl.in_base().value().wrapping_add(index)) & 0x1f)
                    }
                    WaitSource::Irq => irq.get(resolve_irq_index(index, sm.index)),
                };
                if observed != polarity {
                    return ExecResult::Stall;
                }
                // A satisfied high-polarity IRQ wait consumes the flag.
                if source == WaitSource::Irq && polarity == Level::High {
                    irq.clear(resolve_irq_index(index, sm.index));
                }
                ExecResult::Complete
            }
            Operation::In { source, bit_count } => {
                let data = match source {
                    InSource::Pins => gpio.pins(sm.pinctrl.in_base().value(), bit_count),
                    InSource::X => sm.x,
                    InSource::Y => sm.y,
                    InSource::Null => 0,
                    InSource::Isr => sm.isr.value(),
                    InSource::Osr => sm.osr.value(),
                };
                let direction = sm.shiftctrl.in_shiftdir();
                sm.isr.shift_in(data, bit_count, direction);
                if sm.push_isr(true, true) {
                    ExecResult::Stall
                } else {
                    ExecResult::Complete
                }
            }
            Operation::Out {
                destination,
                bit_count,
            } => {
                let direction = sm.shiftctrl.out_shiftdir();
                let data = sm.osr.shift_out(bit_count, direction);
                let mut result = ExecResult::Complete;
                match destination {
                    OutDestination::Pins => gpio.set_pins(
                        data,
                        sm.pinctrl.out_base().value(),
                        sm.pinctrl.out_count().value(),
                    ),
                    OutDestination::X => sm.x = data,
                    OutDestination::Y => sm.y = data,
                    OutDestination::Null => {}
                    OutDestination::PinDirs => gpio.set_pindirs(
                        data,
                        sm.pinctrl.out_base().value(),
                        sm.pinctrl.out_count().value(),
                    ),
                    OutDestination::Pc => {
                        sm.pc = (data as u8) & 0x1f;
                        result = ExecResult::Jump;
                    }
                    OutDestination::Isr => {
                        sm.isr.set_value(data);
                        sm.isr.set_count(bit_count);
                    }
                    OutDestination::Exec => {
                        sm.pending_instruction = Some(data as u16);
                        result = ExecResult::Stall;
                    }
                }
                let refill_stall = sm.pull_osr(true, true);
                match result {
                    ExecResult::Complete if refill_stall => ExecResult::Stall,
                    other => other,
                }
            }
            Operation::Push { if_full, block } => {
                if sm.push_isr(if_full, block) {
                    ExecResult::Stall
                } else {
                    ExecResult::Complete
                }
            }
            Operation::Pull { if_empty, block } => {
                if sm.pull_osr(if_empty, block) {
                    ExecResult::Stall
                } else {
                    ExecResult::Complete
                }
            }
            Operation::Mov {
                destination,
                op,
                source,
            } => {
                let mut value = match source {
                    MovSource::Pins => gpio.pins(sm.pinctrl.in_base().value(), 32),
                    MovSource::X => sm.x,
                    MovSource::Y => sm.y,
                    MovSource::Null => 0,
                    MovSource::Status => {
                        let level = if sm.execctrl.status_sel() {
                            sm.fifo.rx_level()
                        } else {
                            sm.fifo.tx_level()
                        };
                        if level < usize::from(sm.execctrl.status_n().value()) {
                            u32::MAX
                        } else {
                            0
                        }
                    }
                    MovSource::Isr => sm.isr.value(),
                    MovSource::Osr => sm.osr.value(),
                };
                match op {
                    MovOp::None => {}
                    MovOp::Invert => value = !value,
                    MovOp::BitReverse => value = value.reverse_bits(),
                }
                match destination {
                    MovDestination::Pins => gpio.set_pins(
                        value,
                        sm.pinctrl.out_base().value(),
                        sm.pinctrl.out_count().value(),
                    ),
                    MovDestination::X => sm.x = value,
                    MovDestination::Y => sm.y = value,
                    MovDestination::Exec => {
                        sm.pending_instruction = Some(value as u16);
                        return ExecResult::Stall;
                    }
                    MovDestination::Pc => {
                        sm.pc = (value as u8) & 0x1f;
                        return ExecResult::Jump;
                    }
                    MovDestination::Isr => sm.isr.load(value),
                    MovDestination::Osr => sm.osr.load(value),
                }
                ExecResult::Complete
            }
            Operation::Irq { clear, wait, index } => {
                let flag = resolve_irq_index(index, sm.index);
                if clear {
                    irq.clear(flag);
                    return ExecResult::Complete;
                }
                // Raise only on first issue; a stalled re-run must not undo
                // the external clear it is waiting for.
                if !sm.stalled {
                    irq.set(flag);
                }
                if wait && irq.get(flag) == Level::High {
                    ExecResult::Stall
                } else {
                    ExecResult::Complete
                }
            }
            Operation::Set { destination, data } => {
                match destination {
                    SetDestination::Pins => gpio.set_pins(
                        u32::from(data),
                        sm.pinctrl.set_base().value(),
                        sm.pinctrl.set_count().value(),
                    ),
                    SetDestination::X => sm.x = u32::from(data),
                    SetDestination::Y => sm.y = u32::from(data),
                    SetDestination::PinDirs => gpio.set_pindirs(
                        u32::from(data),
                        sm.pinctrl.set_base().value(),
                        sm.pinctrl.set_count().value(),
                    ),
                }
                ExecResult::Complete
            }
        }
    }
}
