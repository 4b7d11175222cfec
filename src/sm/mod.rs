//! The per-state-machine cycle engine.
//!
//! Each rising clock edge runs at most one fetch/decode/execute round:
//! pending delay cycles are consumed first, then the next word comes either
//! from the one-slot injection queue or from shared code RAM at PC. The
//! execute result decides whether PC advances (with the wrap window applied)
//! and whether the instruction's delay is armed. A stalled instruction is
//! simply re-executed on the next edge.

use crate::fifo::FifoPair;
use crate::gpio::Gpio;
use crate::irq::IrqFlags;
use crate::memory::CodeMemory;
use crate::shift::{ShiftDirection, ShiftRegister};
use crate::{FieldRangeError, SmIndex, check_field};

pub mod instr;
pub mod regs;

use instr::{DecodeError, Instruction};
use regs::{
    CLKDIV_RESET, ClkDiv, EXECCTRL_RESET, ExecCtrl, PINCTRL_RESET, PinCtrl, SHIFTCTRL_RESET,
    ShiftCtrl, SidePinDir,
};

/// Outcome of executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecResult {
    /// Retired normally; the engine advances PC and arms the delay.
    Complete,
    /// Not retired; PC is untouched, no delay is armed, and the same
    /// instruction runs again on the next edge.
    Stall,
    /// The instruction wrote PC itself; the engine must not advance it.
    Jump,
}

/// Error returned by [StateMachine::insert_instruction] while an injected
/// word is still waiting to execute.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("an injected instruction is already pending")]
pub struct InjectionPendingError;

/// One PIO state machine.
///
/// Owns its architectural state and its FIFO pair; the shared collaborators
/// (code RAM, pad bank, IRQ flags) are borrowed for the duration of each
/// clock edge.
#[derive(Debug)]
pub struct StateMachine {
    pub(crate) index: SmIndex,
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) isr: ShiftRegister,
    pub(crate) osr: ShiftRegister,
    pub(crate) pc: u8,
    enabled: bool,
    clock_enabled: bool,
    pending_delay: u8,
    pub(crate) pending_instruction: Option<u16>,
    pub(crate) stalled: bool,
    clkdiv: ClkDiv,
    pub(crate) execctrl: ExecCtrl,
    pub(crate) shiftctrl: ShiftCtrl,
    pub(crate) pinctrl: PinCtrl,
    pub(crate) fifo: FifoPair,
}

impl StateMachine {
    pub fn new(index: SmIndex) -> Self {
        let mut osr = ShiftRegister::new();
        // Nothing has been pulled yet, so the OSR starts out fully drained.
        osr.set_count(32);
        StateMachine {
            index,
            x: 0,
            y: 0,
            isr: ShiftRegister::new(),
            osr,
            pc: 0,
            enabled: false,
            clock_enabled: true,
            pending_delay: 0,
            pending_instruction: None,
            stalled: false,
            clkdiv: ClkDiv::new_with_raw_value(CLKDIV_RESET),
            execctrl: ExecCtrl::new_with_raw_value(EXECCTRL_RESET),
            shiftctrl: ShiftCtrl::new_with_raw_value(SHIFTCTRL_RESET),
            pinctrl: PinCtrl::new_with_raw_value(PINCTRL_RESET),
            fifo: FifoPair::new(),
        }
    }

    //==============================================================================================
    // Cycle engine
    //==============================================================================================

    /// Run one rising clock edge.
    ///
    /// Decode failures are fatal for this edge: the error is surfaced, PC
    /// does not advance, and whether to [disable](Self::disable) the machine
    /// is the host's call.
    pub fn clock_rising_edge<G: Gpio>(
        &mut self,
        memory: &CodeMemory,
        gpio: &mut G,
        irq: &mut IrqFlags,
    ) -> Result<(), DecodeError> {
        if !(self.enabled && self.clock_enabled) {
            return Ok(());
        }
        if self.pending_delay > 0 {
            self.pending_delay -= 1;
            return Ok(());
        }
        let word = match self.pending_instruction.take() {
            // An injected word is a fresh issue, never a stalled re-run.
            Some(word) => {
                self.stalled = false;
                word
            }
            None => memory.get(self.pc),
        };
        let instruction = Instruction::decode(
            word,
            self.pinctrl.sideset_count().value(),
            self.execctrl.side_en(),
        )?;
        self.drive_side_set(gpio, &instruction);
        let result = instruction.execute(self, gpio, irq);
        if result == ExecResult::Complete {
            self.advance_pc();
        }
        if result != ExecResult::Stall {
            self.pending_delay = instruction.delay;
        }
        self.stalled = result == ExecResult::Stall;
        Ok(())
    }

    fn advance_pc(&mut self) {
        if self.pc == self.execctrl.wrap_top().value() {
            self.pc = self.execctrl.wrap_bottom().value();
        } else {
            self.pc = (self.pc + 1) & 0x1f;
        }
    }

    /// Side-set drives its pin window on every execution of the carrying
    /// instruction, stalled or not.
    fn drive_side_set<G: Gpio>(&self, gpio: &mut G, instruction: &Instruction) {
        let Some(value) = instruction.side_set else {
            return;
        };
        let count = self.pinctrl.sideset_count().value().min(5);
        let data_bits = if self.execctrl.side_en() {
            count - 1
        } else {
            count
        };
        if data_bits == 0 {
            return;
        }
        let base = self.pinctrl.sideset_base().value();
        match self.execctrl.side_pindir() {
            SidePinDir::GpioLevels => gpio.set_pins(u32::from(value), base, data_bits),
            SidePinDir::PinDirs => gpio.set_pindirs(u32::from(value), base, data_bits),
        }
    }

    /// Push the ISR to the RX FIFO, honoring the threshold condition.
    ///
    /// With `if_full` the push only happens once the ISR shift count has
    /// reached the push threshold and autopush is enabled. Returns whether
    /// the caller must stall (RX full on a blocking push); the ISR is left
    /// intact in that case.
    pub(crate) fn push_isr(&mut self, if_full: bool, block: bool) -> bool {
        let isr_full = self.isr.count() >= self.shiftctrl.push_threshold();
        if if_full && !(isr_full && self.shiftctrl.autopush()) {
            return false;
        }
        if self.fifo.rx_full() {
            return block;
        }
        self.fifo.rx_push(self.isr.value());
        self.isr.load(0);
        false
    }

    /// Refill the OSR from the TX FIFO, honoring the threshold condition.
    ///
    /// With `if_empty` the pull only happens once the OSR shift count has
    /// reached the pull threshold and autopull is enabled. A non-blocking
    /// pull from an empty FIFO copies X instead, as the device documents.
    /// Returns whether the caller must stall.
    pub(crate) fn pull_osr(&mut self, if_empty: bool, block: bool) -> bool {
        let osr_empty = self.osr.count() >= self.shiftctrl.pull_threshold();
        if if_empty && !(osr_empty && self.shiftctrl.autopull()) {
            return false;
        }
        match self.fifo.tx_pull() {
            Some(word) => {
                self.osr.load(word);
                false
            }
            None => {
                if !block {
                    let x = self.x;
                    self.osr.load(x);
                }
                block
            }
        }
    }

    //==============================================================================================
    // Host operations
    //==============================================================================================

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Gate from the clock divider collaborator.
    pub fn set_clock_enabled(&mut self, enabled: bool) {
        self.clock_enabled = enabled;
    }

    pub const fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }

    /// Queue a word to execute on the next edge instead of the fetch at PC.
    pub fn insert_instruction(&mut self, word: u16) -> Result<(), InjectionPendingError> {
        if self.pending_instruction.is_some() {
            return Err(InjectionPendingError);
        }
        self.pending_instruction = Some(word);
        Ok(())
    }

    /// Restart execution: clears the ISR, both shift counts, PC, pending
    /// delay and the injection slot. X, Y, the OSR contents and all
    /// configuration registers are retained.
    pub fn restart(&mut self) {
        self.isr.load(0);
        self.osr.set_count(32);
        self.pc = 0;
        self.pending_delay = 0;
        self.pending_instruction = None;
        self.stalled = false;
    }

    //==============================================================================================
    // Architectural state
    //==============================================================================================

    pub const fn index(&self) -> SmIndex {
        self.index
    }

    pub const fn x(&self) -> u32 {
        self.x
    }

    pub fn set_x(&mut self, value: u32) {
        self.x = value;
    }

    pub const fn y(&self) -> u32 {
        self.y
    }

    pub fn set_y(&mut self, value: u32) {
        self.y = value;
    }

    pub const fn pc(&self) -> u8 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u8) -> Result<(), FieldRangeError> {
        check_field("PC", u32::from(pc), 31)?;
        self.pc = pc;
        Ok(())
    }

    pub fn isr(&self) -> u32 {
        self.isr.value()
    }

    pub fn isr_count(&self) -> u8 {
        self.isr.count()
    }

    /// Host write of the ISR value; the shift count is left alone.
    pub fn set_isr(&mut self, value: u32) {
        self.isr.set_value(value);
    }

    pub fn osr(&self) -> u32 {
        self.osr.value()
    }

    pub fn osr_count(&self) -> u8 {
        self.osr.count()
    }

    /// Host write of the OSR value; the shift count is left alone.
    pub fn set_osr(&mut self, value: u32) {
        self.osr.set_value(value);
    }

    /// Whether the last executed instruction is stalled (EXEC_STALLED).
    pub const fn stalled(&self) -> bool {
        self.stalled
    }

    pub fn fifo(&self) -> &FifoPair {
        &self.fifo
    }

    pub fn fifo_mut(&mut self) -> &mut FifoPair {
        &mut self.fifo
    }

    //==============================================================================================
    // Packed register access
    //==============================================================================================

    pub fn execctrl(&self) -> u32 {
        self.execctrl.raw_value()
    }

    /// Whole-register write; reserved bits are forced to zero.
    pub fn set_execctrl(&mut self, value: u32) {
        self.execctrl = ExecCtrl::new_with_raw_value(value & ExecCtrl::VALID_MASK);
    }

    pub fn shiftctrl(&self) -> u32 {
        self.shiftctrl.raw_value()
    }

    /// Whole-register write; reserved bits are forced to zero. The join
    /// flags take effect on the FIFO pair immediately.
    pub fn set_shiftctrl(&mut self, value: u32) {
        self.shiftctrl = ShiftCtrl::new_with_raw_value(value & ShiftCtrl::VALID_MASK);
        self.fifo.set_join_rx(self.shiftctrl.join_rx());
        self.fifo.set_join_tx(self.shiftctrl.join_tx());
    }

    pub fn pinctrl(&self) -> u32 {
        self.pinctrl.raw_value()
    }

    pub fn set_pinctrl(&mut self, value: u32) {
        self.pinctrl = PinCtrl::new_with_raw_value(value & PinCtrl::VALID_MASK);
    }

    pub fn clkdiv(&self) -> u32 {
        self.clkdiv.raw_value()
    }

    pub fn set_clkdiv(&mut self, value: u32) {
        self.clkdiv = ClkDiv::new_with_raw_value(value & ClkDiv::VALID_MASK);
    }

    //==============================================================================================
    // Granular EXECCTRL setters
    //==============================================================================================

    pub fn set_side_en(&mut self, enable: bool) {
        self.execctrl = self.execctrl.with_side_en(enable);
    }

    pub fn set_side_pindir(&mut self, pindir: SidePinDir) {
        self.execctrl = self.execctrl.with_side_pindir(pindir);
    }

    pub fn set_jmp_pin(&mut self, pin: u8) -> Result<(), FieldRangeError> {
        check_field("JMP_PIN", u32::from(pin), 31)?;
        self.execctrl = self.execctrl.with_jmp_pin(arbitrary_int::u5::new(pin));
        Ok(())
    }

    pub fn set_wrap_top(&mut self, addr: u8) -> Result<(), FieldRangeError> {
        check_field("WRAP_TOP", u32::from(addr), 31)?;
        self.execctrl = self.execctrl.with_wrap_top(arbitrary_int::u5::new(addr));
        Ok(())
    }

    pub fn set_wrap_bottom(&mut self, addr: u8) -> Result<(), FieldRangeError> {
        check_field("WRAP_BOTTOM", u32::from(addr), 31)?;
        self.execctrl = self.execctrl.with_wrap_bottom(arbitrary_int::u5::new(addr));
        Ok(())
    }

    pub fn set_status_sel(&mut self, rx: bool) {
        self.execctrl = self.execctrl.with_status_sel(rx);
    }

    pub fn set_status_n(&mut self, level: u8) -> Result<(), FieldRangeError> {
        check_field("STATUS_N", u32::from(level), 15)?;
        self.execctrl = self.execctrl.with_status_n(arbitrary_int::u4::new(level));
        Ok(())
    }

    //==============================================================================================
    // Granular SHIFTCTRL setters
    //==============================================================================================

    pub fn set_in_shiftdir(&mut self, direction: ShiftDirection) {
        self.shiftctrl = self.shiftctrl.with_in_shiftdir(direction);
    }

    pub fn set_out_shiftdir(&mut self, direction: ShiftDirection) {
        self.shiftctrl = self.shiftctrl.with_out_shiftdir(direction);
    }

    pub fn set_push_thresh(&mut self, bits: u8) -> Result<(), FieldRangeError> {
        check_field("PUSH_THRESH", u32::from(bits), 31)?;
        self.shiftctrl = self.shiftctrl.with_push_thresh(arbitrary_int::u5::new(bits));
        Ok(())
    }

    pub fn set_pull_thresh(&mut self, bits: u8) -> Result<(), FieldRangeError> {
        check_field("PULL_THRESH", u32::from(bits), 31)?;
        self.shiftctrl = self.shiftctrl.with_pull_thresh(arbitrary_int::u5::new(bits));
        Ok(())
    }

    pub fn set_autopush(&mut self, enable: bool) {
        self.shiftctrl = self.shiftctrl.with_autopush(enable);
    }

    pub fn set_autopull(&mut self, enable: bool) {
        self.shiftctrl = self.shiftctrl.with_autopull(enable);
    }

    pub fn set_join_rx(&mut self, join: bool) {
        self.shiftctrl = self.shiftctrl.with_join_rx(join);
        self.fifo.set_join_rx(join);
    }

    pub fn set_join_tx(&mut self, join: bool) {
        self.shiftctrl = self.shiftctrl.with_join_tx(join);
        self.fifo.set_join_tx(join);
    }

    //==============================================================================================
    // Granular PINCTRL setters
    //==============================================================================================

    pub fn set_sideset_count(&mut self, count: u8) -> Result<(), FieldRangeError> {
        check_field("SIDESET_COUNT", u32::from(count), 5)?;
        self.pinctrl = self.pinctrl.with_sideset_count(arbitrary_int::u3::new(count));
        Ok(())
    }

    pub fn set_set_count(&mut self, count: u8) -> Result<(), FieldRangeError> {
        check_field("SET_COUNT", u32::from(count), 5)?;
        self.pinctrl = self.pinctrl.with_set_count(arbitrary_int::u3::new(count));
        Ok(())
    }

    pub fn set_out_count(&mut self, count: u8) -> Result<(), FieldRangeError> {
        check_field("OUT_COUNT", u32::from(count), 31)?;
        self.pinctrl = self.pinctrl.with_out_count(arbitrary_int::u6::new(count));
        Ok(())
    }

    pub fn set_in_base(&mut self, base: u8) -> Result<(), FieldRangeError> {
        check_field("IN_BASE", u32::from(base), 31)?;
        self.pinctrl = self.pinctrl.with_in_base(arbitrary_int::u5::new(base));
        Ok(())
    }

    pub fn set_sideset_base(&mut self, base: u8) -> Result<(), FieldRangeError> {
        check_field("SIDESET_BASE", u32::from(base), 31)?;
        self.pinctrl = self.pinctrl.with_sideset_base(arbitrary_int::u5::new(base));
        Ok(())
    }

    pub fn set_set_base(&mut self, base: u8) -> Result<(), FieldRangeError> {
        check_field("SET_BASE", u32::from(base), 31)?;
        self.pinctrl = self.pinctrl.with_set_base(arbitrary_int::u5::new(base));
        Ok(())
    }

    pub fn set_out_base(&mut self, base: u8) -> Result<(), FieldRangeError> {
        check_field("OUT_BASE", u32::from(base), 31)?;
        self.pinctrl = self.pinctrl.with_out_base(arbitrary_int::u5::new(base));
        Ok(())
    }

    //==============================================================================================
    // Granular CLKDIV setters
    //==============================================================================================

    pub fn set_clkdiv_int(&mut self, int: u16) {
        self.clkdiv = self.clkdiv.with_int(int);
    }

    pub fn set_clkdiv_frac(&mut self, frac: u8) {
        self.clkdiv = self.clkdiv.with_frac(frac);
    }
}
