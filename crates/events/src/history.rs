//! Per-event delivery history.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed `publish` call.
///
/// Notes:
/// - `timestamp` is taken after the subscriber loop finishes.
/// - `duration_ms` covers only the subscriber loop (validation excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry<P> {
    entry_id: Uuid,
    payload: P,
    timestamp: DateTime<Utc>,
    duration_ms: f64,
}

impl<P> HistoryEntry<P> {
    pub fn new(payload: P, timestamp: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            entry_id: Uuid::now_v7(),
            payload,
            timestamp,
            duration_ms: elapsed.as_secs_f64() * 1_000.0,
        }
    }

    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Append-only ring of history entries for a single event.
///
/// With a non-zero capacity the oldest entry is evicted once full; a zero
/// capacity keeps everything.
#[derive(Debug)]
pub(crate) struct HistoryBuffer<P> {
    entries: VecDeque<HistoryEntry<P>>,
    capacity: usize,
}

impl<P> HistoryBuffer<P> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry<P>) {
        if self.capacity > 0 && self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn drain(&mut self) -> Vec<HistoryEntry<P>> {
        self.entries.drain(..).collect()
    }
}

impl<P: Clone> HistoryBuffer<P> {
    pub(crate) fn snapshot(&self) -> Vec<HistoryEntry<P>> {
        self.entries.iter().cloned().collect()
    }
}
