// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Published receiver state for UI readers.
//!
//! The decode worker is the single writer: it builds a fresh snapshot and
//! swaps it in atomically. Readers load the current `Arc` and can never
//! observe a torn struct; the worker never blocks on a reader.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::frame::call::CallState;

/// Copy-on-publish view of the receiver.
#[derive(Debug, Clone, Default)]
pub struct RxSnapshot {
    /// Display tag of the current sync, empty when scanning.
    pub sync_tag: String,
    /// True while tuned to a voice channel.
    pub on_voice: bool,
    pub cc_freq_hz: u64,
    pub vc_freq_hz: [Option<u64>; 2],
    pub calls: [Option<CallState>; 2],
    pub frames_decoded: u64,
    pub sync_losses: u64,
    /// Most recent deduplicated status line.
    pub status_line: String,
    /// Monotonic timestamp of this publish.
    pub published_at: f64,
}

/// Single-writer snapshot publisher.
pub struct SnapshotPublisher {
    current: ArcSwap<RxSnapshot>,
}

impl SnapshotPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RxSnapshot::default()),
        }
    }

    /// Swap in a new snapshot (decode worker only).
    pub fn publish(&self, snapshot: RxSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Load the current snapshot (any thread).
    #[must_use]
    pub fn load(&self) -> Arc<RxSnapshot> {
        self.current.load_full()
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}
