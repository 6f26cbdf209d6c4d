// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-slot event history with watchdog callbacks.
//!
//! Writers are lossy by design: the ring is bounded, overflow drops the
//! oldest record, and a writer that cannot take the lock immediately
//! drops the event rather than stall the decode worker. The UI reads
//! cloned snapshots, never the live ring.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::config::EVENT_RING_CAPACITY;

/// One history record.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Monotonic timestamp (seconds).
    pub timestamp: f64,
    pub source: u32,
    pub target: u32,
    pub text: String,
    /// Decoded position, when the event carried one.
    pub gps: Option<(f64, f64)>,
    /// Display color hint for the slot lights.
    pub color: u8,
    pub alias: Option<String>,
}

impl EventRecord {
    #[must_use]
    pub fn call(timestamp: f64, source: u32, target: u32, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            source,
            target,
            text: text.into(),
            gps: None,
            color: 0,
            alias: None,
        }
    }
}

/// Watchdog invoked with a compact summary when a data call completes.
pub type Watchdog = Box<dyn Fn(&str) + Send + Sync>;

/// Bounded per-slot event history.
pub struct EventLog {
    slots: [Mutex<VecDeque<EventRecord>>; 2],
    watchdog: Option<Watchdog>,
    dropped: std::sync::atomic::AtomicU64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [
                Mutex::new(VecDeque::with_capacity(EVENT_RING_CAPACITY)),
                Mutex::new(VecDeque::with_capacity(EVENT_RING_CAPACITY)),
            ],
            watchdog: None,
            dropped: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Install the data-call completion watchdog.
    pub fn set_watchdog(&mut self, watchdog: Watchdog) {
        self.watchdog = Some(watchdog);
    }

    /// Append a record to a slot's history. Never blocks: if the ring is
    /// contended the record is dropped and counted.
    pub fn push(&self, slot: u8, record: EventRecord) {
        let Some(mut ring) = self.slots[usize::from(slot & 1)].try_lock() else {
            self.dropped
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return;
        };
        if ring.len() == EVENT_RING_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(record);
    }

    /// Clone a slot's history, newest last.
    #[must_use]
    pub fn snapshot(&self, slot: u8) -> Vec<EventRecord> {
        self.slots[usize::from(slot & 1)]
            .lock()
            .iter()
            .cloned()
            .collect()
    }

    /// Records dropped due to writer contention.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Signal a completed data call; the watchdog gets one compact line.
    pub fn data_call_complete(&self, slot: u8, source: u32, target: u32, summary: &str) {
        if let Some(w) = &self.watchdog {
            w(&format!("slot{} {source}->{target} {summary}", slot & 1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_push_and_snapshot_order() {
        let log = EventLog::new();
        for i in 0..5u32 {
            log.push(0, EventRecord::call(f64::from(i), i, 100, "call"));
        }
        let snap = log.snapshot(0);
        assert_eq!(snap.len(), 5);
        assert_eq!(snap[0].source, 0);
        assert_eq!(snap[4].source, 4);
        assert!(log.snapshot(1).is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let log = EventLog::new();
        for i in 0..(EVENT_RING_CAPACITY as u32 + 4) {
            log.push(1, EventRecord::call(0.0, i, 0, "x"));
        }
        let snap = log.snapshot(1);
        assert_eq!(snap.len(), EVENT_RING_CAPACITY);
        assert_eq!(snap[0].source, 4);
    }

    #[test]
    fn test_watchdog_fires_with_summary() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(String::new()));
        let mut log = EventLog::new();
        {
            let count = count.clone();
            let seen = seen.clone();
            log.set_watchdog(Box::new(move |s| {
                count.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = s.to_string();
            }));
        }
        log.data_call_complete(1, 7001, 42, "LRRP 2 tokens");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(&*seen.lock(), "slot1 7001->42 LRRP 2 tokens");
    }

    #[test]
    fn test_slots_are_independent() {
        let log = EventLog::new();
        log.push(0, EventRecord::call(0.0, 1, 2, "a"));
        log.push(1, EventRecord::call(0.0, 3, 4, "b"));
        assert_eq!(log.snapshot(0)[0].text, "a");
        assert_eq!(log.snapshot(1)[0].text, "b");
    }
}
