//! Per-state-machine TX and RX FIFO pair.
//!
//! Each direction is four words deep. Joining gives the whole storage of the
//! pair to one direction, doubling its depth and reducing the other side to
//! zero capacity. Pushes and pulls never fail loudly: the engine checks the
//! levels first, and a refused push simply reports that the word was not
//! accepted.

use core::fmt;

use heapless::Deque;

/// Depth of one unjoined FIFO direction.
pub const FIFO_DEPTH: usize = 4;
/// Depth of a direction that has been given the other side's storage.
pub const JOINED_DEPTH: usize = 2 * FIFO_DEPTH;

static_assertions::const_assert!(FIFO_DEPTH.is_power_of_two());

/// TX/RX word queue pair owned by one state machine.
///
/// The state machine side pushes RX words and pulls TX words; the host (or
/// its DMA channel) uses the opposite accessors.
pub struct FifoPair {
    tx: Deque<u32, JOINED_DEPTH>,
    rx: Deque<u32, JOINED_DEPTH>,
    join_tx: bool,
    join_rx: bool,
}

impl FifoPair {
    pub const fn new() -> Self {
        FifoPair {
            tx: Deque::new(),
            rx: Deque::new(),
            join_tx: false,
            join_rx: false,
        }
    }

    pub const fn tx_capacity(&self) -> usize {
        match (self.join_tx, self.join_rx) {
            (true, _) => JOINED_DEPTH,
            (false, true) => 0,
            (false, false) => FIFO_DEPTH,
        }
    }

    pub const fn rx_capacity(&self) -> usize {
        match (self.join_rx, self.join_tx) {
            (true, _) => JOINED_DEPTH,
            (false, true) => 0,
            (false, false) => FIFO_DEPTH,
        }
    }

    /// Give the TX storage to the RX direction. Reconfiguring the join
    /// discards everything currently held in both directions.
    pub fn set_join_rx(&mut self, join: bool) {
        if self.join_rx != join {
            self.join_rx = join;
            self.clear();
        }
    }

    /// Give the RX storage to the TX direction. Discards held words on
    /// change, like [Self::set_join_rx].
    pub fn set_join_tx(&mut self, join: bool) {
        if self.join_tx != join {
            self.join_tx = join;
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.tx.clear();
        self.rx.clear();
    }

    pub fn tx_level(&self) -> usize {
        self.tx.len()
    }

    pub fn rx_level(&self) -> usize {
        self.rx.len()
    }

    pub fn tx_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn tx_full(&self) -> bool {
        self.tx.len() >= self.tx_capacity()
    }

    pub fn rx_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn rx_full(&self) -> bool {
        self.rx.len() >= self.rx_capacity()
    }

    /// Engine-side push of a completed ISR word. Returns whether the word
    /// was accepted; a full (or joined-away) RX FIFO refuses it.
    pub fn rx_push(&mut self, word: u32) -> bool {
        if self.rx_full() {
            return false;
        }
        let _ = self.rx.push_back(word);
        true
    }

    /// Engine-side pull of the next OSR refill word.
    pub fn tx_pull(&mut self) -> Option<u32> {
        self.tx.pop_front()
    }

    /// Host-side push of a word for the state machine to consume.
    pub fn tx_push(&mut self, word: u32) -> bool {
        if self.tx_full() {
            return false;
        }
        let _ = self.tx.push_back(word);
        true
    }

    /// Host-side pop of a word the state machine produced.
    pub fn rx_pop(&mut self) -> Option<u32> {
        self.rx.pop_front()
    }
}

impl Default for FifoPair {
    fn default() -> Self {
        FifoPair::new()
    }
}

impl fmt::Debug for FifoPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FifoPair")
            .field("tx_level", &self.tx.len())
            .field("rx_level", &self.rx.len())
            .field("join_tx", &self.join_tx)
            .field("join_rx", &self.join_rx)
            .finish()
    }
}
