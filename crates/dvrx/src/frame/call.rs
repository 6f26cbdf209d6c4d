// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call state.
//!
//! Created on a call-start PDU (HDU, LC header, channel assignment) and
//! cleared on the matching release or hangtime expiry. Everything in here
//! is per-slot and owned by the decode worker; the UI sees copies via the
//! engine snapshot.

/// Encryption parameters observed on the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CryptoState {
    pub algid: u8,
    pub keyid: u16,
    /// Message indicator / IV, as received.
    pub mi: Vec<u8>,
    /// Scrambler LFSR seed in effect.
    pub lfsr_seed: u32,
}

/// One in-progress call on a slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallState {
    pub source: u32,
    pub target: u32,
    pub is_group: bool,
    pub is_data: bool,
    pub encrypted: bool,
    pub crypto: CryptoState,
    /// Talker alias, once assembled.
    pub alias: Option<String>,
    /// Last decoded position string (NMEA or LRRP formatted).
    pub gps: Option<String>,
    /// Slot-light text for the UI.
    pub light_text: String,
    /// Monotonic call start.
    pub started_at: f64,
}

/// Per-slot call tracker.
#[derive(Debug, Default)]
pub struct CallTracker {
    slots: [Option<CallState>; 2],
}

impl CallTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a call on a slot, replacing any stale one.
    pub fn start(&mut self, slot: u8, call: CallState) {
        self.slots[usize::from(slot & 1)] = Some(call);
    }

    /// End the call on a slot (TDU/TX_REL/DISC or hangtime expiry).
    pub fn end(&mut self, slot: u8) -> Option<CallState> {
        self.slots[usize::from(slot & 1)].take()
    }

    #[must_use]
    pub fn active(&self, slot: u8) -> Option<&CallState> {
        self.slots[usize::from(slot & 1)].as_ref()
    }

    pub fn active_mut(&mut self, slot: u8) -> Option<&mut CallState> {
        self.slots[usize::from(slot & 1)].as_mut()
    }

    /// Attach an assembled alias to the running call.
    pub fn set_alias(&mut self, slot: u8, alias: &str) {
        if let Some(call) = self.active_mut(slot) {
            call.alias = Some(alias.to_string());
        }
    }
}
