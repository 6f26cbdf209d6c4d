// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver configuration - single source of truth.
//!
//! This module centralizes the timing defaults, table sizes and runtime
//! options. **Never hardcode these elsewhere!**
//!
//! - **Level 1 (Static)**: compile-time constants (frame geometry, ring
//!   sizes, timing defaults)
//! - **Level 2 (Dynamic)**: [`RxOptions`] carrying the per-run settings
//!   (trunking policy, slot preferences, output paths)
//!
//! Option *loading* (config files, CLI) lives in the embedding application;
//! this crate only defines the option set and its defaults.

use std::path::PathBuf;

// =======================================================================
// Trunking timing defaults (seconds)
// =======================================================================

/// Default voice-channel hangtime.
///
/// While tuned to a VC, the SM returns to the CC once no voice sync has
/// been seen for `hangtime + force_release_margin`.
pub const DEFAULT_HANGTIME_S: f64 = 1.0;

/// Default grace period for a granted VC to produce MAC activity or voice
/// sync before the grant is considered dead.
pub const DEFAULT_GRANT_VOICE_TO_S: f64 = 0.5;

/// Default per-(freq,slot) retune backoff after a fruitless grant.
pub const DEFAULT_RETUNE_BACKOFF_S: f64 = 2.0;

/// Default CC-loss grace before hunting starts.
pub const DEFAULT_CC_GRACE_S: f64 = 3.0;

/// Default margin added to hangtime before a force release.
pub const DEFAULT_FORCE_RELEASE_MARGIN_S: f64 = 0.5;

// =======================================================================
// Table and ring sizes
// =======================================================================

/// Identifier table slots per protocol instance (4-bit identifier index).
pub const IDEN_TABLE_SIZE: usize = 16;

/// Patch/regroup table: supergroup slots.
pub const PATCH_SG_SLOTS: usize = 8;

/// Patch/regroup table: workgroup IDs per supergroup.
pub const PATCH_WGIDS_PER_SG: usize = 8;

/// Candidate control-channel ring capacity (deduplicated FIFO).
pub const CC_CANDIDATE_CAPACITY: usize = 16;

/// Per-slot event history ring capacity.
pub const EVENT_RING_CAPACITY: usize = 16;

/// Bounded (freq,slot) -> backoff-deadline map capacity.
pub const BACKOFF_MAP_CAPACITY: usize = 64;

/// Ingest SPSC dibit ring capacity (dibits).
pub const DIBIT_RING_CAPACITY: usize = 65536;

// =======================================================================
// Frequency math units (see IdenTable)
// =======================================================================

/// IDEN base frequency unit in Hz.
pub const IDEN_BASE_UNIT_HZ: u64 = 5;

/// IDEN channel spacing unit in Hz.
pub const IDEN_SPACING_UNIT_HZ: u64 = 125;

/// NXDN DCR fixed channel grid in Hz (no IDEN PDU on DCR systems).
pub const NXDN_DCR_GRID_HZ: u64 = 6250;

/// De-emphasis selection for the analog path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeemphMode {
    #[default]
    Unset,
    Off,
    Us50,
    Us75,
    Nfm,
}

/// Runtime receiver options.
///
/// One instance per run, owned by the decode worker; the UI mutates it only
/// through the engine command queue.
#[derive(Debug, Clone)]
pub struct RxOptions {
    // --- Trunking policy -------------------------------------------------
    /// Master trunking enable.
    pub trunk_enabled: bool,
    /// Follow group voice grants.
    pub tune_group_calls: bool,
    /// Follow individual (private) voice grants.
    pub tune_private_calls: bool,
    /// Follow data channel grants.
    pub tune_data_calls: bool,
    /// Follow encrypted calls (service option bit 0x40).
    pub tune_enc_calls: bool,
    /// Prefer candidate CCs over the primary when hunting.
    pub prefer_candidates: bool,
    /// Allow LCW-signalled retunes while on a voice channel.
    pub lcw_retune: bool,

    // --- Trunking timing -------------------------------------------------
    pub hangtime_s: f64,
    pub grant_voice_to_s: f64,
    pub retune_backoff_s: f64,
    pub cc_grace_s: f64,
    pub force_release_margin_s: f64,

    // --- TDMA slot handling ----------------------------------------------
    /// DMR stereo (both slots) output.
    pub dmr_stereo: bool,
    /// DMR mono (single slot) output.
    pub dmr_mono: bool,
    /// Preferred slot when both are active (0 or 1).
    pub slot_preference: u8,
    /// Slot 1 audio enabled.
    pub slot1_on: bool,
    /// Slot 2 audio enabled.
    pub slot2_on: bool,

    // --- Decode behaviour ------------------------------------------------
    /// Accept CRC-failed PDUs for identification-only fields, tagged
    /// `crc_bad`.
    pub crc_relax: bool,
    /// Verbose payload decoder logging.
    pub payload_verbose: bool,

    // --- Artefact outputs ------------------------------------------------
    /// Directory for per-call MBE parameter dumps (None = disabled).
    pub mbe_out_dir: Option<PathBuf>,
    /// Event log file path (None = disabled).
    pub event_out_file: Option<PathBuf>,
    /// LRRP tab-separated log path (None = disabled).
    pub lrrp_out_file: Option<PathBuf>,

    // --- Analog/audio ancillary ------------------------------------------
    /// Input level warning threshold in dB.
    pub input_warn_db: f64,
    /// Audio low-pass cutoff in Hz (None = off).
    pub audio_lpf_cutoff_hz: Option<u32>,
    /// De-emphasis mode.
    pub deemph_mode: DeemphMode,
}

impl Default for RxOptions {
    fn default() -> Self {
        Self {
            trunk_enabled: true,
            tune_group_calls: true,
            tune_private_calls: false,
            tune_data_calls: false,
            tune_enc_calls: false,
            prefer_candidates: false,
            lcw_retune: false,
            hangtime_s: DEFAULT_HANGTIME_S,
            grant_voice_to_s: DEFAULT_GRANT_VOICE_TO_S,
            retune_backoff_s: DEFAULT_RETUNE_BACKOFF_S,
            cc_grace_s: DEFAULT_CC_GRACE_S,
            force_release_margin_s: DEFAULT_FORCE_RELEASE_MARGIN_S,
            dmr_stereo: true,
            dmr_mono: false,
            slot_preference: 0,
            slot1_on: true,
            slot2_on: true,
            crc_relax: false,
            payload_verbose: false,
            mbe_out_dir: None,
            event_out_file: None,
            lrrp_out_file: None,
            input_warn_db: -60.0,
            audio_lpf_cutoff_hz: None,
            deemph_mode: DeemphMode::Unset,
        }
    }
}

impl RxOptions {
    /// Builder-style toggles used by tests and embedders.
    #[must_use]
    pub fn with_trunking(mut self, on: bool) -> Self {
        self.trunk_enabled = on;
        self
    }

    #[must_use]
    pub fn with_private_calls(mut self, on: bool) -> Self {
        self.tune_private_calls = on;
        self
    }

    #[must_use]
    pub fn with_data_calls(mut self, on: bool) -> Self {
        self.tune_data_calls = on;
        self
    }

    #[must_use]
    pub fn with_enc_calls(mut self, on: bool) -> Self {
        self.tune_enc_calls = on;
        self
    }

    #[must_use]
    pub fn with_hangtime(mut self, seconds: f64) -> Self {
        self.hangtime_s = seconds;
        self
    }

    #[must_use]
    pub fn with_retune_backoff(mut self, seconds: f64) -> Self {
        self.retune_backoff_s = seconds;
        self
    }

    #[must_use]
    pub fn with_grant_voice_timeout(mut self, seconds: f64) -> Self {
        self.grant_voice_to_s = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_groups_only() {
        let opts = RxOptions::default();
        assert!(opts.trunk_enabled);
        assert!(opts.tune_group_calls);
        assert!(!opts.tune_private_calls);
        assert!(!opts.tune_data_calls);
        assert!(!opts.tune_enc_calls);
    }

    #[test]
    fn test_builder_toggles() {
        let opts = RxOptions::default()
            .with_private_calls(true)
            .with_enc_calls(true)
            .with_hangtime(2.5);
        assert!(opts.tune_private_calls);
        assert!(opts.tune_enc_calls);
        assert!((opts.hangtime_s - 2.5).abs() < f64::EPSILON);
    }
}
