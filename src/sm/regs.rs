//! Packed per-state-machine configuration registers.
//!
//! Field layouts follow the device register map bit for bit. Whole-register
//! writes preserve reserved bits as zero; bounds on individual fields are
//! enforced by the granular setters on the state machine, not here.

use arbitrary_int::{u3, u4, u5, u6};

use crate::shift::ShiftDirection;

/// What the side-set value is applied to.
#[bitbybit::bitenum(u1, exhaustive = true)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SidePinDir {
    GpioLevels = 0,
    PinDirs = 1,
}

pub const EXECCTRL_RESET: u32 = 0x0001_f000;
pub const SHIFTCTRL_RESET: u32 = 0x000c_0000;
pub const PINCTRL_RESET: u32 = 0x1400_0000;
pub const CLKDIV_RESET: u32 = 0x0001_0000;

/// Execution control: side-set behavior, wrap window, JMP pin and the
/// MOV STATUS source selection.
#[bitbybit::bitfield(u32, default = 0x0001_f000, debug, defmt_bitfields(feature = "defmt"))]
pub struct ExecCtrl {
    #[bit(30, rw)]
    side_en: bool,
    #[bit(29, rw)]
    side_pindir: SidePinDir,
    #[bits(24..=28, rw)]
    jmp_pin: u5,
    #[bits(12..=16, rw)]
    wrap_top: u5,
    #[bits(7..=11, rw)]
    wrap_bottom: u5,
    #[bit(4, rw)]
    status_sel: bool,
    #[bits(0..=3, rw)]
    status_n: u4,
}

impl ExecCtrl {
    pub const VALID_MASK: u32 = 0x7f01_ff9f;
}

/// Shift control: directions, thresholds, autopush/autopull and the FIFO
/// join flags.
#[bitbybit::bitfield(u32, default = 0x000c_0000, debug, defmt_bitfields(feature = "defmt"))]
pub struct ShiftCtrl {
    #[bit(31, rw)]
    join_rx: bool,
    #[bit(30, rw)]
    join_tx: bool,
    #[bits(25..=29, rw)]
    pull_thresh: u5,
    #[bits(20..=24, rw)]
    push_thresh: u5,
    #[bit(19, rw)]
    out_shiftdir: ShiftDirection,
    #[bit(18, rw)]
    in_shiftdir: ShiftDirection,
    #[bit(17, rw)]
    autopull: bool,
    #[bit(16, rw)]
    autopush: bool,
}

impl ShiftCtrl {
    pub const VALID_MASK: u32 = 0xffff_0000;

    /// Pull threshold in bits; the 0 encoding means a full 32-bit word.
    pub fn pull_threshold(&self) -> u8 {
        match self.pull_thresh().value() {
            0 => 32,
            bits => bits,
        }
    }

    /// Push threshold in bits; the 0 encoding means a full 32-bit word.
    pub fn push_threshold(&self) -> u8 {
        match self.push_thresh().value() {
            0 => 32,
            bits => bits,
        }
    }
}

/// Pin control: the base/count windows for side-set, SET, OUT and IN.
#[bitbybit::bitfield(u32, default = 0x1400_0000, debug, defmt_bitfields(feature = "defmt"))]
pub struct PinCtrl {
    #[bits(29..=31, rw)]
    sideset_count: u3,
    #[bits(26..=28, rw)]
    set_count: u3,
    #[bits(20..=25, rw)]
    out_count: u6,
    #[bits(15..=19, rw)]
    in_base: u5,
    #[bits(10..=14, rw)]
    sideset_base: u5,
    #[bits(5..=9, rw)]
    set_base: u5,
    #[bits(0..=4, rw)]
    out_base: u5,
}

impl PinCtrl {
    pub const VALID_MASK: u32 = 0xffff_ffff;
}

/// Fractional clock divider register. The divider itself is evaluated by
/// the external clock collaborator; the state machine only stores the
/// packed value. An integer part of 0 encodes the maximum divisor of 65536.
#[bitbybit::bitfield(u32, default = 0x0001_0000, debug, defmt_bitfields(feature = "defmt"))]
pub struct ClkDiv {
    #[bits(16..=31, rw)]
    int: u16,
    #[bits(8..=15, rw)]
    frac: u8,
}

impl ClkDiv {
    pub const VALID_MASK: u32 = 0xffff_ff00;
}

// Reset values must carry no reserved bits.
static_assertions::const_assert_eq!(EXECCTRL_RESET & !ExecCtrl::VALID_MASK, 0);
static_assertions::const_assert_eq!(SHIFTCTRL_RESET & !ShiftCtrl::VALID_MASK, 0);
static_assertions::const_assert_eq!(CLKDIV_RESET & !ClkDiv::VALID_MASK, 0);

#[cfg(test)]
mod tests {
    use super::{
        CLKDIV_RESET, ClkDiv, EXECCTRL_RESET, ExecCtrl, PINCTRL_RESET, PinCtrl, SHIFTCTRL_RESET,
        ShiftCtrl,
    };
    use crate::shift::ShiftDirection;

    #[test]
    fn execctrl_fields_sit_at_their_documented_bits() {
        let reg = ExecCtrl::new_with_raw_value(
            (1 << 30) | (1 << 29) | (9 << 24) | (0x15 << 12) | (0x0a << 7) | (1 << 4) | 0xb,
        );
        assert!(reg.side_en());
        assert_eq!(reg.side_pindir(), super::SidePinDir::PinDirs);
        assert_eq!(reg.jmp_pin().value(), 9);
        assert_eq!(reg.wrap_top().value(), 0x15);
        assert_eq!(reg.wrap_bottom().value(), 0x0a);
        assert!(reg.status_sel());
        assert_eq!(reg.status_n().value(), 0xb);
    }

    #[test]
    fn shiftctrl_fields_sit_at_their_documented_bits() {
        let reg = ShiftCtrl::new_with_raw_value(
            (1 << 31) | (12 << 25) | (7 << 20) | (1 << 19) | (1 << 17),
        );
        assert!(reg.join_rx());
        assert!(!reg.join_tx());
        assert_eq!(reg.pull_thresh().value(), 12);
        assert_eq!(reg.push_thresh().value(), 7);
        assert_eq!(reg.out_shiftdir(), ShiftDirection::Right);
        assert_eq!(reg.in_shiftdir(), ShiftDirection::Left);
        assert!(reg.autopull());
        assert!(!reg.autopush());
    }

    #[test]
    fn pinctrl_fields_sit_at_their_documented_bits() {
        let reg = PinCtrl::new_with_raw_value(
            (0b101 << 29) | (0b011 << 26) | (30 << 20) | (17 << 15) | (8 << 10) | (5 << 5) | 29,
        );
        assert_eq!(reg.sideset_count().value(), 5);
        assert_eq!(reg.set_count().value(), 3);
        assert_eq!(reg.out_count().value(), 30);
        assert_eq!(reg.in_base().value(), 17);
        assert_eq!(reg.sideset_base().value(), 8);
        assert_eq!(reg.set_base().value(), 5);
        assert_eq!(reg.out_base().value(), 29);
    }

    #[test]
    fn thresholds_of_zero_mean_a_full_word() {
        let reg = ShiftCtrl::new_with_raw_value(0);
        assert_eq!(reg.pull_threshold(), 32);
        assert_eq!(reg.push_threshold(), 32);
        let reg = ShiftCtrl::new_with_raw_value((31 << 25) | (1 << 20));
        assert_eq!(reg.pull_threshold(), 31);
        assert_eq!(reg.push_threshold(), 1);
    }

    #[test]
    fn reset_values_decode_to_the_documented_defaults() {
        let execctrl = ExecCtrl::new_with_raw_value(EXECCTRL_RESET);
        assert_eq!(execctrl.wrap_top().value(), 0x1f);
        assert_eq!(execctrl.wrap_bottom().value(), 0);
        let shiftctrl = ShiftCtrl::new_with_raw_value(SHIFTCTRL_RESET);
        assert_eq!(shiftctrl.in_shiftdir(), ShiftDirection::Right);
        assert_eq!(shiftctrl.out_shiftdir(), ShiftDirection::Right);
        let pinctrl = PinCtrl::new_with_raw_value(PINCTRL_RESET);
        assert_eq!(pinctrl.set_count().value(), 5);
        let clkdiv = ClkDiv::new_with_raw_value(CLKDIV_RESET);
        assert_eq!(clkdiv.int(), 1);
        assert_eq!(clkdiv.frac(), 0);
    }
}
