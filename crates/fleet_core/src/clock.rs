//! Caller-driven timers.
//!
//! Nothing here owns a thread or reads the wall clock: callers pass `now_ms`
//! (milliseconds since any fixed epoch) and collect whatever has fallen due.
//! Re-arming a key supersedes its previous timer; superseded and cancelled
//! entries stay in the heap and are skipped when popped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

pub const ONE_SEC_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer<K> {
    due_ms: u64,
    generation: u64,
    key: K,
}

impl<K: Eq> Ord for Timer<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by deadline.
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl<K: Eq> PartialOrd for Timer<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One deadline per key; the newest `arm` for a key wins.
#[derive(Debug)]
pub struct TimerQueue<K> {
    heap: BinaryHeap<Timer<K>>,
    live: HashMap<K, u64>,
    next_generation: u64,
}

impl<K: Eq> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_generation: 1,
        }
    }
}

impl<K: Copy + Eq + Hash> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer for `key`. Returns the generation of the new timer.
    pub fn arm(&mut self, key: K, due_ms: u64) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live.insert(key, generation);
        self.heap.push(Timer {
            due_ms,
            generation,
            key,
        });
        generation
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.live.remove(&key).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.live.clear();
        self.heap.clear();
    }

    pub fn is_armed(&self, key: K) -> bool {
        self.live.contains_key(&key)
    }

    /// Earliest live deadline, if any.
    pub fn next_due(&mut self) -> Option<u64> {
        self.discard_dead_head();
        self.heap.peek().map(|timer| timer.due_ms)
    }

    /// Pop every live timer with `due_ms <= now_ms`, earliest first.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<(K, u64)> {
        let mut fired = Vec::new();
        loop {
            self.discard_dead_head();
            match self.heap.peek() {
                Some(timer) if timer.due_ms <= now_ms => {}
                _ => break,
            }
            if let Some(timer) = self.heap.pop() {
                self.live.remove(&timer.key);
                fired.push((timer.key, timer.generation));
            }
        }
        fired
    }

    fn discard_dead_head(&mut self) {
        while let Some(timer) = self.heap.peek() {
            if self.live.get(&timer.key) == Some(&timer.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// Fixed-interval cadence for callers that tick a simulation from a wall clock.
///
/// The first observation anchors the cadence; later calls report how many
/// whole intervals have elapsed since the last reported tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickCadence {
    interval_ms: u64,
    next_ms: Option<u64>,
}

impl TickCadence {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_ms: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Number of ticks owed at `now_ms`.
    pub fn due(&mut self, now_ms: u64) -> u64 {
        let Some(next) = self.next_ms else {
            self.next_ms = Some(now_ms.saturating_add(self.interval_ms));
            return 0;
        };
        if now_ms < next {
            return 0;
        }
        let owed = (now_ms - next) / self.interval_ms + 1;
        self.next_ms = Some(next.saturating_add(owed * self.interval_ms));
        owed
    }

    pub fn reset(&mut self) {
        self.next_ms = None;
    }
}
