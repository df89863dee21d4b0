//! Event queue
//!
//! Min-priority queue of schedule entries keyed by `(trigger_time, sequence)`.
//! `sequence` is a monotonic insertion counter, so simultaneous entries pop
//! in the order they were scheduled. That makes the total order, and with it
//! the whole run, a function of the seed and the definitions alone.
//!
//! Entries are never removed early. Superseded and orphaned entries stay in
//! the heap until popped, where the lifecycle table exposes them as ghosts.

use crate::events::EventKindId;
use crate::models::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A queued decision: which event fires for which agent, and when
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub agent_id: AgentId,
    pub event: EventKindId,
    /// Agent generation at scheduling time; stale once the agent moves on
    pub generation: u64,
    pub trigger_time: f64,
    /// Insertion counter, breaks ties between equal trigger times
    pub sequence: u64,
}

// BinaryHeap is a max-heap; reverse so the earliest (time, sequence) is on top.
#[derive(Debug, Clone, Copy)]
struct HeapEntry(ScheduleEntry);

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .trigger_time
            .total_cmp(&self.0.trigger_time)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}

/// Time-ordered schedule
///
/// # Example
/// ```
/// use event_queue_core_rs::queue::EventQueue;
///
/// let queue = EventQueue::new();
/// assert!(queue.is_empty());
/// assert_eq!(queue.peek_min_time(), f64::INFINITY);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    heap: BinaryHeap<HeapEntry>,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from saved entries
    ///
    /// `next_sequence` must exceed every saved sequence number so that new
    /// insertions sort after restored ones at equal times.
    pub fn from_entries(entries: Vec<ScheduleEntry>, next_sequence: u64) -> Self {
        Self {
            heap: entries.into_iter().map(HeapEntry).collect(),
            next_sequence,
        }
    }

    /// Insert an entry, O(log n)
    ///
    /// Earlier entries for the same agent are left in place.
    pub fn insert(
        &mut self,
        agent_id: AgentId,
        event: EventKindId,
        generation: u64,
        trigger_time: f64,
    ) -> ScheduleEntry {
        debug_assert!(!trigger_time.is_nan(), "trigger time must not be NaN");
        let entry = ScheduleEntry {
            agent_id,
            event,
            generation,
            trigger_time,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.heap.push(HeapEntry(entry));
        entry
    }

    /// Remove and return the earliest entry, O(log n)
    pub fn pop_min(&mut self) -> Option<ScheduleEntry> {
        self.heap.pop().map(|e| e.0)
    }

    pub fn peek(&self) -> Option<&ScheduleEntry> {
        self.heap.peek().map(|e| &e.0)
    }

    /// Earliest trigger time, or `f64::INFINITY` when empty
    pub fn peek_min_time(&self) -> f64 {
        self.peek().map_or(f64::INFINITY, |e| e.trigger_time)
    }

    /// Physical size, ghosts included
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop every entry; the sequence counter keeps counting
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// All entries in pop order
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        let mut entries: Vec<HeapEntry> = self.heap.iter().copied().collect();
        // HeapEntry orders latest-first
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.0).collect()
    }

    /// Iterate entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &ScheduleEntry> {
        self.heap.iter().map(|e| &e.0)
    }
}
