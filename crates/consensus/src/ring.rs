//! Bounded history of confirmed ticks

use crate::types::ConfirmedTick;
use std::collections::VecDeque;

/// Confirmed ticks in strictly increasing order, oldest evicted first
pub struct TickRing {
    capacity: usize,
    ticks: VecDeque<ConfirmedTick>,
}

impl TickRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ticks: VecDeque::new(),
        }
    }

    /// Append a tick newer than every stored one; older ticks are refused.
    pub fn push(&mut self, tick: ConfirmedTick) -> bool {
        if self.latest().map_or(false, |latest| latest.tick() >= tick.tick()) {
            return false;
        }
        if self.ticks.len() == self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
        true
    }

    pub fn get(&self, tick: u32) -> Option<&ConfirmedTick> {
        self.ticks
            .binary_search_by_key(&tick, ConfirmedTick::tick)
            .ok()
            .and_then(|position| self.ticks.get(position))
    }

    pub fn latest(&self) -> Option<&ConfirmedTick> {
        self.ticks.back()
    }

    pub fn oldest(&self) -> Option<&ConfirmedTick> {
        self.ticks.front()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
