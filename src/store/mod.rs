mod events;

pub use events::{AppendNotice, EventRecord, EventStore, DEFAULT_MAX_STORED_EVENTS};

#[cfg(test)]
pub(crate) use events::tests::event as test_event;
