//! A priority queue of scheduled simulation work ("plans") sorted by time
//!
//! Defines a `Queue<T>` storing payloads of type `T` ordered by `f64` virtual
//! time, an [`ExecutionPhase`], and finally insertion order. Adding a plan is
//! *O*(log(*n*)); cancellation and retrieval are *O*(1).
//!
//! `Context` stores callbacks `FnOnce(&mut Context)` in this queue and drains
//! it to advance the simulation clock.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

/// Determines how plans scheduled for the same virtual time are ordered
/// relative to each other.
///
/// Within a phase, plans at equal time run in the order they were scheduled.
/// `Last` is intended for observers (periodic snapshots, shutdown) that must
/// see every same-time state change before they fire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum ExecutionPhase {
    First,
    #[default]
    Normal,
    Last,
}

/// A unique identifier for a plan added to a `Queue<T>`, used to cancel it.
pub struct Id {
    id: u64,
}

/// A scheduled payload of type `T` returned at its wake time.
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}

/// The sort key for a plan: time, then phase, then insertion order.
///
/// The payload itself lives in a side map keyed by plan id so that
/// cancellation does not have to touch the heap.
#[derive(PartialEq, Debug)]
struct Entry {
    time: f64,
    phase: ExecutionPhase,
    id: u64,
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that `BinaryHeap`, a max-heap, pops the earliest entry first.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        let time_ordering = self.time.partial_cmp(&other.time).unwrap().reverse();
        match time_ordering {
            // Break time ties by phase and then insertion order
            Ordering::Equal => match self.phase.cmp(&other.phase).reverse() {
                Ordering::Equal => self.id.cmp(&other.id).reverse(),
                phase_ordering => phase_ordering,
            },
            _ => time_ordering,
        }
    }
}

/// A min-queue of plans keyed by `(time, phase, insertion order)`
///
/// The insertion-order tie-break makes drain order deterministic for a given
/// schedule order, which the simulation relies on for reproducible runs.
pub struct Queue<T> {
    heap: BinaryHeap<Entry>,
    data_map: HashMap<u64, T>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            heap: BinaryHeap::new(),
            data_map: HashMap::new(),
            plan_counter: 0,
        }
    }

    /// Add a plan at the specified time and phase
    ///
    /// Returns an [`Id`] that can be used to cancel the plan.
    pub fn add_plan(&mut self, time: f64, data: T, phase: ExecutionPhase) -> Id {
        let id = self.plan_counter;
        self.heap.push(Entry { time, phase, id });
        self.data_map.insert(id, data);
        self.plan_counter += 1;
        Id { id }
    }

    /// Cancel a previously added plan
    ///
    /// # Panics
    ///
    /// Panics if the plan was already cancelled or has executed.
    pub fn cancel_plan(&mut self, id: &Id) {
        // Remove the payload but leave the heap entry; it is skipped on pop.
        self.data_map.remove(&id.id).expect("Plan does not exist");
    }

    /// True if no live plans remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.is_empty()
    }

    /// Remove and return the earliest plan, or `None` if the queue is empty
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        loop {
            match self.heap.pop() {
                Some(entry) => {
                    // Cancelled plans have no payload; skip them.
                    if let Some(data) = self.data_map.remove(&entry.id) {
                        return Some(Plan {
                            time: entry.time,
                            data,
                        });
                    }
                }
                None => {
                    return None;
                }
            }
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
