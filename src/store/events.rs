use std::collections::{BTreeSet, VecDeque};

use crate::domain::event::{DecodedEvent, EventKind};

pub const DEFAULT_MAX_STORED_EVENTS: usize = 1000;

/// A decoded event plus its arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub seq: u64,
    pub event: DecodedEvent,
}

/// Emitted by [`EventStore::append`] for the render scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendNotice {
    pub seq: u64,
    pub kind: EventKind,
    pub evicted: bool,
}

/// Bounded, newest-first buffer of decoded events with a kind filter
#[derive(Debug)]
pub struct EventStore {
    records: VecDeque<EventRecord>,
    capacity: usize,
    next_seq: u64,
    active: BTreeSet<EventKind>,
}

impl EventStore {
    /// Store with every kind active
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.max(1).min(4096)),
            capacity: capacity.max(1),
            next_seq: 0,
            active: EventKind::ALL.into_iter().collect(),
        }
    }

    pub fn append(&mut self, event: DecodedEvent) -> AppendNotice {
        let seq = self.next_seq;
        self.next_seq += 1;
        let kind = event.kind();
        self.records.push_front(EventRecord { seq, event });
        let evicted = self.records.len() > self.capacity;
        if evicted {
            self.records.pop_back();
        }
        AppendNotice { seq, kind, evicted }
    }

    pub fn set_active(&mut self, kind: EventKind, active: bool) {
        if active {
            self.active.insert(kind);
        } else {
            self.active.remove(&kind);
        }
    }

    /// Flip a kind and return its new state
    pub fn toggle(&mut self, kind: EventKind) -> bool {
        let active = !self.is_active(kind);
        self.set_active(kind, active);
        active
    }

    pub fn is_active(&self, kind: EventKind) -> bool {
        self.active.contains(&kind)
    }

    /// Records of active kinds, newest first. Evaluated lazily on each call.
    pub fn filtered(&self) -> impl Iterator<Item = &EventRecord> + '_ {
        self.records
            .iter()
            .filter(move |record| self.active.contains(&record.event.kind()))
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered().count()
    }

    /// Every stored record, newest first, ignoring the filter
    #[cfg(test)]
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> + '_ {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
