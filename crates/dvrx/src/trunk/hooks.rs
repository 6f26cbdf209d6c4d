// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Control hooks: the seam between the trunk SM and the tuner.
//!
//! The SM never talks to hardware; every retune decision goes through this
//! vtable so tests substitute a recording fake and the embedding
//! application installs the real rigctl/RTL-TCP adapter. Implementations
//! must be non-blocking or offload internally.

/// Tuner and policy-decision callbacks invoked by the trunk SM.
pub trait ControlHooks: Send {
    /// Tune to a granted voice/data channel.
    fn tune_to_freq(&mut self, freq_hz: u64, ted_sps: u32);

    /// Tune to a (candidate) control channel.
    fn tune_to_cc(&mut self, freq_hz: u64, ted_sps: u32);

    /// Return to the current control channel after a voice call ends.
    fn return_to_cc(&mut self);

    /// A grant was refused by the gating rules. Informational; no side
    /// effect is expected.
    fn grant_blocked(&mut self, _reason: &'static str, _target: u32) {}
}

/// No-op hooks for conventional (non-trunked) operation.
#[derive(Debug, Default)]
pub struct NullHooks;

impl ControlHooks for NullHooks {
    fn tune_to_freq(&mut self, _freq_hz: u64, _ted_sps: u32) {}
    fn tune_to_cc(&mut self, _freq_hz: u64, _ted_sps: u32) {}
    fn return_to_cc(&mut self) {}
}

/// Recording fake used across the SM test suites.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    pub tunes: Vec<u64>,
    pub cc_tunes: Vec<u64>,
    pub returns: usize,
    pub blocked: Vec<(&'static str, u32)>,
}

impl RecordingHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of voice-channel tunes to the given frequency.
    #[must_use]
    pub fn tune_count(&self, freq_hz: u64) -> usize {
        self.tunes.iter().filter(|&&f| f == freq_hz).count()
    }
}

impl ControlHooks for RecordingHooks {
    fn tune_to_freq(&mut self, freq_hz: u64, _ted_sps: u32) {
        self.tunes.push(freq_hz);
    }

    fn tune_to_cc(&mut self, freq_hz: u64, _ted_sps: u32) {
        self.cc_tunes.push(freq_hz);
    }

    fn return_to_cc(&mut self) {
        self.returns += 1;
    }

    fn grant_blocked(&mut self, reason: &'static str, target: u32) {
        self.blocked.push((reason, target));
    }
}
