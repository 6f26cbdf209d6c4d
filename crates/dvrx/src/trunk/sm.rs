// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trunking state machine: control-channel follower.
//!
//! Consumes typed events from the control-PDU parsers and drives the tuner
//! through the [`ControlHooks`] vtable. All timing is explicit: every
//! event carries the caller's monotonic clock in seconds, which keeps the
//! SM deterministic under test.
//!
//! ```text
//!          on_cc_sync           grant(admitted)
//!  START -----------> on_CC ------------------> tuned_to_VC
//!                      ^  ^                     |
//!       cc_hunt_grace  |  | return_to_cc        | hangtime expiry
//!                      |  +---------------------+ or force_release
//!             hunting <+                        |
//!                      <------------------------+
//!                 CC candidate exhausted / CC sync
//! ```

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::config::{RxOptions, BACKOFF_MAP_CAPACITY};

use super::candidates::CandidateRing;
use super::hooks::ControlHooks;
use super::iden::{ChannelFreq, IdenEntry, IdenTable};
use super::patch::PatchTable;

/// Timing-error-detector samples per symbol handed to the tuner on VC
/// tunes (C4FM voice default).
const VC_TED_SPS: u32 = 10;
/// TED samples per symbol for control channels.
const CC_TED_SPS: u32 = 10;

/// Service options byte (P25 convention; DMR/NXDN map onto it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions(pub u8);

impl ServiceOptions {
    #[must_use]
    pub fn is_emergency(self) -> bool {
        self.0 & 0x80 != 0
    }

    #[must_use]
    pub fn is_encrypted(self) -> bool {
        self.0 & 0x40 != 0
    }

    #[must_use]
    pub fn is_data(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// SM role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    OnControl,
    TunedVoice,
    Hunting,
}

/// Grant class, used by the policy gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantClass {
    Group,
    Individual,
}

/// The trunking state machine.
pub struct TrunkSm {
    opts: RxOptions,
    role: Role,

    /// Primary (first observed) control channel.
    primary_cc_hz: u64,
    /// Control channel currently in use.
    cc_freq_hz: u64,
    /// Per-slot voice channel frequency.
    vc_freq_hz: [Option<u64>; 2],

    last_cc_sync_m: f64,
    last_vc_sync_m: f64,
    last_vc_tune_m: f64,
    /// MAC activity or voice sync seen on any slot since the last tune.
    vc_activity_seen: bool,
    force_release: bool,
    hunt_tried_primary: bool,

    /// (freq, slot) -> monotonic deadline before which regrants are
    /// refused. Bounded by recency: stale entries age out of the cache.
    backoff_until: LruCache<(u64, u8), f64>,

    pub iden: IdenTable,
    pub patches: PatchTable,
    pub candidates: CandidateRing,
    /// Talkgroups locked out for encryption ("DE").
    enc_lockout: Vec<u32>,
}

impl TrunkSm {
    #[must_use]
    pub fn new(opts: RxOptions) -> Self {
        Self {
            opts,
            role: Role::OnControl,
            primary_cc_hz: 0,
            cc_freq_hz: 0,
            vc_freq_hz: [None, None],
            last_cc_sync_m: 0.0,
            last_vc_sync_m: 0.0,
            last_vc_tune_m: 0.0,
            vc_activity_seen: false,
            force_release: false,
            hunt_tried_primary: false,
            backoff_until: LruCache::new(
                NonZeroUsize::new(BACKOFF_MAP_CAPACITY).expect("nonzero capacity"),
            ),
            iden: IdenTable::new(),
            patches: PatchTable::new(),
            candidates: CandidateRing::new(),
            enc_lockout: Vec::new(),
        }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn cc_freq_hz(&self) -> u64 {
        self.cc_freq_hz
    }

    #[must_use]
    pub fn vc_freq_hz(&self, slot: u8) -> Option<u64> {
        self.vc_freq_hz[usize::from(slot & 1)]
    }

    #[must_use]
    pub fn options(&self) -> &RxOptions {
        &self.opts
    }

    pub fn set_force_release(&mut self, on: bool) {
        self.force_release = on;
    }

    // ====================================================================
    // Events
    // ====================================================================

    /// Control channel sync observed on `freq_hz`.
    pub fn on_cc_sync(&mut self, freq_hz: u64, now: f64) {
        self.last_cc_sync_m = now;
        self.hunt_tried_primary = false;
        if self.primary_cc_hz == 0 {
            self.primary_cc_hz = freq_hz;
            log::info!("[trunk] primary CC {freq_hz} Hz");
        }
        if self.cc_freq_hz != freq_hz {
            self.cc_freq_hz = freq_hz;
        }
        if self.role == Role::Hunting {
            self.role = Role::OnControl;
        }
    }

    /// Alternate/adjacent CC learned from a broadcast PDU.
    pub fn on_cc_candidate(&mut self, freq_hz: u64) {
        self.candidates.push(freq_hz);
    }

    /// Group voice/data channel grant.
    pub fn on_group_grant(
        &mut self,
        hooks: &mut dyn ControlHooks,
        channel: u16,
        svc: ServiceOptions,
        dst: u32,
        src: u32,
        now: f64,
    ) {
        self.try_grant(hooks, GrantClass::Group, channel, svc, dst, src, now);
    }

    /// Individual (unit-to-unit) channel grant.
    pub fn on_indiv_grant(
        &mut self,
        hooks: &mut dyn ControlHooks,
        channel: u16,
        svc: ServiceOptions,
        dst: u32,
        src: u32,
        now: f64,
    ) {
        self.try_grant(hooks, GrantClass::Individual, channel, svc, dst, src, now);
    }

    /// MAC activity (P25p2 MAC_ACTIVE / DMR burst with payload) on a slot.
    pub fn on_mac_active(&mut self, _slot: u8, now: f64) {
        if self.role == Role::TunedVoice {
            self.vc_activity_seen = true;
            self.last_vc_sync_m = now;
        }
    }

    /// Voice sync observed on a tuned slot.
    pub fn on_voice_sync(&mut self, _slot: u8, now: f64) {
        if self.role == Role::TunedVoice {
            self.vc_activity_seen = true;
            self.last_vc_sync_m = now;
        }
    }

    /// Explicit channel release (TDU, TX_REL, DISC) on a slot.
    pub fn on_release(&mut self, hooks: &mut dyn ControlHooks, slot: u8, now: f64) {
        let slot_idx = usize::from(slot & 1);
        let Some(freq) = self.vc_freq_hz[slot_idx] else {
            return;
        };
        // A grant that never produced traffic earns its (freq,slot) a
        // backoff so the follower stops bouncing on a dead grant.
        let dt = now - self.last_vc_tune_m;
        if dt >= self.opts.grant_voice_to_s && !self.vc_activity_seen {
            let until = now + self.opts.retune_backoff_s;
            self.backoff_until.put((freq, slot & 1), until);
            log::debug!("[trunk] backoff {freq} Hz slot {slot} until {until:.1}");
        }
        self.vc_freq_hz[slot_idx] = None;
        if self.vc_freq_hz.iter().all(Option::is_none) && self.role == Role::TunedVoice {
            self.return_to_cc(hooks);
        }
    }

    /// Band-plan update from an IDEN/band-plan PDU.
    pub fn on_iden_update(&mut self, iden: u8, entry: IdenEntry) {
        self.iden.update(iden, entry);
    }

    /// MFID90 GRG add: SG gains a WGID.
    pub fn on_patch_add(&mut self, sg: u16, wgid: u16, is_patch: bool) {
        self.patches.add_wgid(sg, wgid, is_patch);
    }

    /// MFID90 GRG delete: WGID leaves the SG.
    pub fn on_patch_delete(&mut self, sg: u16, wgid: u16) {
        self.patches.remove_wgid(sg, wgid);
    }

    /// Mark a talkgroup "DE": encrypted, never to be followed.
    pub fn on_enc_lockout(&mut self, gid: u32) {
        if !self.enc_lockout.contains(&gid) {
            self.enc_lockout.push(gid);
            log::info!("[trunk] talkgroup {gid} locked out (DE)");
        }
    }

    #[must_use]
    pub fn is_locked_out(&self, gid: u32) -> bool {
        self.enc_lockout.contains(&gid)
    }

    /// Periodic timer: hangtime/force-release while tuned, CC-loss hunting
    /// while on control.
    pub fn tick(&mut self, hooks: &mut dyn ControlHooks, now: f64) {
        match self.role {
            Role::TunedVoice => {
                let stale = now - self.last_vc_sync_m;
                if self.force_release
                    || stale > self.opts.hangtime_s + self.opts.force_release_margin_s
                {
                    log::debug!("[trunk] hangtime expired ({stale:.2}s stale), releasing");
                    self.force_release = false;
                    self.return_to_cc(hooks);
                }
            }
            Role::OnControl | Role::Hunting => {
                if self.primary_cc_hz != 0 && now - self.last_cc_sync_m > self.opts.cc_grace_s {
                    self.hunt(hooks, now);
                }
            }
        }
    }

    // ====================================================================
    // Internals
    // ====================================================================

    #[allow(clippy::too_many_arguments)] // grant fields per the PDU
    fn try_grant(
        &mut self,
        hooks: &mut dyn ControlHooks,
        class: GrantClass,
        channel: u16,
        svc: ServiceOptions,
        dst: u32,
        src: u32,
        now: f64,
    ) {
        if !self.opts.trunk_enabled {
            hooks.grant_blocked("trunking disabled", dst);
            return;
        }
        // I1: a retune needs a trusted band plan for the channel.
        let Some(ChannelFreq { freq_hz, slot, .. }) = self.iden.lookup(channel) else {
            hooks.grant_blocked("no trusted iden", dst);
            return;
        };
        // Policy gates.
        let class_ok = match class {
            GrantClass::Group => self.opts.tune_group_calls,
            GrantClass::Individual => self.opts.tune_private_calls,
        };
        if !class_ok {
            hooks.grant_blocked("call class disabled", dst);
            return;
        }
        if svc.is_data() && !self.opts.tune_data_calls {
            hooks.grant_blocked("data calls disabled", dst);
            return;
        }
        if svc.is_encrypted() && !self.opts.tune_enc_calls {
            hooks.grant_blocked("encrypted calls disabled", dst);
            return;
        }
        // I4: a DE-marked group is never followed, whatever the policy.
        if class == GrantClass::Group && self.is_locked_out(dst) {
            hooks.grant_blocked("group locked out", dst);
            return;
        }
        if freq_hz == self.cc_freq_hz {
            hooks.grant_blocked("grant names the control channel", dst);
            return;
        }
        // I3: fresh-release backoff, keyed per (freq, slot) so the other
        // slot of a shared TDMA carrier stays reachable.
        if let Some(&until) = self.backoff_until.peek(&(freq_hz, slot)) {
            if now < until {
                hooks.grant_blocked("backoff", dst);
                return;
            }
        }
        // A second grant while tuned follows only when LCW retunes are
        // allowed or it lands on the carrier we already occupy.
        if self.role == Role::TunedVoice {
            let same_rf = self.vc_freq_hz.iter().flatten().any(|&f| f == freq_hz);
            if !same_rf && !self.opts.lcw_retune {
                hooks.grant_blocked("already on voice channel", dst);
                return;
            }
        }

        self.vc_freq_hz[usize::from(slot & 1)] = Some(freq_hz);
        self.role = Role::TunedVoice;
        self.last_vc_tune_m = now;
        self.last_vc_sync_m = now;
        self.vc_activity_seen = false;
        log::info!(
            "[trunk] grant dst {dst} src {src} ch {channel:#06X} -> {freq_hz} Hz slot {slot}"
        );
        hooks.tune_to_freq(freq_hz, VC_TED_SPS);
    }

    fn return_to_cc(&mut self, hooks: &mut dyn ControlHooks) {
        self.vc_freq_hz = [None, None];
        self.vc_activity_seen = false;
        self.role = Role::OnControl;
        hooks.return_to_cc();
    }

    fn hunt(&mut self, hooks: &mut dyn ControlHooks, now: f64) {
        let target = if self.opts.prefer_candidates || self.hunt_tried_primary {
            self.candidates.pop().unwrap_or(self.primary_cc_hz)
        } else {
            self.hunt_tried_primary = true;
            self.primary_cc_hz
        };
        self.role = Role::Hunting;
        // Replenish grace so the candidate gets a fair listen.
        self.last_cc_sync_m = now;
        self.cc_freq_hz = target;
        log::info!("[trunk] hunting CC at {target} Hz");
        hooks.tune_to_cc(target, CC_TED_SPS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trunk::hooks::RecordingHooks;
    use crate::trunk::iden::Trust;

    fn sm_with_iden() -> TrunkSm {
        let opts = RxOptions::default()
            .with_grant_voice_timeout(0.5)
            .with_retune_backoff(2.0);
        let mut sm = TrunkSm::new(opts);
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        sm.on_iden_update(2, IdenEntry::tdma(170_200_000, 100, Trust::Confirmed));
        sm.on_cc_sync(851_000_000, 0.0);
        sm
    }

    #[test]
    fn test_basic_group_grant_follow() {
        // Spec scenario: IDEN 1, FDMA, channel 0x000A -> 851.125 MHz.
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x00),
            1001,
            1002,
            0.1,
        );
        assert_eq!(hooks.tunes, vec![851_125_000]);
        assert_eq!(sm.role(), Role::TunedVoice);
        assert_eq!(sm.vc_freq_hz(0), Some(851_125_000));
    }

    #[test]
    fn test_retune_backoff_per_slot() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        // TDMA grant channel 3 -> slot 1 @ 851.0125 MHz.
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0003,
            ServiceOptions(0x00),
            500,
            501,
            0.0,
        );
        assert_eq!(hooks.tunes, vec![851_012_500]);

        // 0.6 s with no MAC/voice, then release: slot 1 enters backoff.
        sm.on_release(&mut hooks, 1, 0.6);
        assert_eq!(hooks.returns, 1);

        // Opposite slot on the same RF bypasses the backoff.
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0002,
            ServiceOptions(0x00),
            500,
            501,
            0.7,
        );
        assert_eq!(hooks.tunes, vec![851_012_500, 851_012_500]);

        sm.on_release(&mut hooks, 0, 0.8);

        // Slot 1 again inside the 2 s window: refused.
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0003,
            ServiceOptions(0x00),
            500,
            501,
            1.0,
        );
        assert_eq!(hooks.tunes.len(), 2);
        assert!(hooks.blocked.iter().any(|(r, _)| *r == "backoff"));

        // After the backoff expires the grant goes through again.
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0003,
            ServiceOptions(0x00),
            500,
            501,
            2.7,
        );
        assert_eq!(hooks.tunes.len(), 3);
    }

    #[test]
    fn test_activity_prevents_backoff() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0003,
            ServiceOptions(0x00),
            500,
            501,
            0.0,
        );
        sm.on_voice_sync(1, 0.2);
        sm.on_release(&mut hooks, 1, 0.6);
        // Voice was seen: an immediate regrant is allowed.
        sm.on_group_grant(
            &mut hooks,
            (2 << 12) | 0x0003,
            ServiceOptions(0x00),
            500,
            501,
            0.7,
        );
        assert_eq!(hooks.tunes.len(), 2);
    }

    #[test]
    fn test_policy_gating_matrix() {
        // Private off: individual grant refused.
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        let ch = (1 << 12) | 0x000A;
        sm.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x00), 42, 43, 0.1);
        assert!(hooks.tunes.is_empty());

        // Private on, data off: data-service grant refused.
        let mut sm = TrunkSm::new(
            RxOptions::default()
                .with_private_calls(true)
                .with_data_calls(false),
        );
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        sm.on_cc_sync(851_000_000, 0.0);
        let mut hooks = RecordingHooks::new();
        sm.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x10), 42, 43, 0.1);
        assert!(hooks.tunes.is_empty());

        // Data on, enc off: encrypted grant refused.
        let mut sm = TrunkSm::new(
            RxOptions::default()
                .with_private_calls(true)
                .with_data_calls(true),
        );
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        sm.on_cc_sync(851_000_000, 0.0);
        let mut hooks = RecordingHooks::new();
        sm.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x40), 42, 43, 0.1);
        assert!(hooks.tunes.is_empty());

        // Everything on: encrypted grant follows.
        let mut sm = TrunkSm::new(
            RxOptions::default()
                .with_private_calls(true)
                .with_data_calls(true)
                .with_enc_calls(true),
        );
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        sm.on_cc_sync(851_000_000, 0.0);
        let mut hooks = RecordingHooks::new();
        sm.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x40), 42, 43, 0.1);
        assert_eq!(hooks.tunes.len(), 1);
    }

    #[test]
    fn test_enc_lockout_overrides_policy() {
        let mut sm = TrunkSm::new(RxOptions::default().with_enc_calls(true));
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        sm.on_cc_sync(851_000_000, 0.0);
        sm.on_enc_lockout(1001);
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x40),
            1001,
            9,
            0.1,
        );
        assert!(hooks.tunes.is_empty());
        assert!(hooks.blocked.iter().any(|(r, _)| *r == "group locked out"));
    }

    #[test]
    fn test_untrusted_iden_blocks_grant() {
        let mut sm = TrunkSm::new(RxOptions::default());
        sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Untrusted));
        sm.on_cc_sync(851_000_000, 0.0);
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x00),
            7,
            8,
            0.1,
        );
        assert!(hooks.tunes.is_empty());
        assert!(hooks.blocked.iter().any(|(r, _)| *r == "no trusted iden"));
    }

    #[test]
    fn test_grant_on_cc_frequency_refused() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        // Channel 0 resolves to exactly the CC frequency.
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x0000,
            ServiceOptions(0x00),
            7,
            8,
            0.1,
        );
        assert!(hooks.tunes.is_empty());
    }

    #[test]
    fn test_hangtime_returns_to_cc() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x00),
            1,
            2,
            0.0,
        );
        sm.on_voice_sync(0, 1.0);
        // Inside hangtime: still tuned.
        sm.tick(&mut hooks, 2.0);
        assert_eq!(sm.role(), Role::TunedVoice);
        // Past hangtime (1.0) + margin (0.5): forced back to CC.
        sm.tick(&mut hooks, 2.6);
        assert_eq!(sm.role(), Role::OnControl);
        assert_eq!(hooks.returns, 1);
        assert_eq!(sm.vc_freq_hz(0), None);
    }

    #[test]
    fn test_force_release_is_immediate() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        sm.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x00),
            1,
            2,
            0.0,
        );
        sm.on_voice_sync(0, 0.1);
        sm.set_force_release(true);
        sm.tick(&mut hooks, 0.2);
        assert_eq!(sm.role(), Role::OnControl);
    }

    #[test]
    fn test_cc_hunt_cycles_candidates_then_primary() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        sm.on_cc_candidate(852_000_000);
        sm.on_cc_candidate(853_000_000);

        // CC quiet past grace (3.0 s default): primary is retried first.
        sm.tick(&mut hooks, 4.0);
        assert_eq!(sm.role(), Role::Hunting);
        assert_eq!(hooks.cc_tunes, vec![851_000_000]);

        // Still quiet: candidates drain in FIFO order.
        sm.tick(&mut hooks, 8.0);
        assert_eq!(hooks.cc_tunes, vec![851_000_000, 852_000_000]);
        sm.tick(&mut hooks, 12.0);
        assert_eq!(
            hooks.cc_tunes,
            vec![851_000_000, 852_000_000, 853_000_000]
        );

        // Ring exhausted: back to primary.
        sm.tick(&mut hooks, 16.0);
        assert_eq!(hooks.cc_tunes.last(), Some(&851_000_000));

        // A CC sync ends the hunt.
        sm.on_cc_sync(853_000_000, 16.5);
        assert_eq!(sm.role(), Role::OnControl);
        sm.tick(&mut hooks, 17.0);
        assert_eq!(hooks.cc_tunes.len(), 4);
    }

    #[test]
    fn test_tune_count_monotonic_per_freq() {
        let mut sm = sm_with_iden();
        let mut hooks = RecordingHooks::new();
        let ch = (1 << 12) | 0x000A;
        for i in 0..3 {
            let t = f64::from(i) * 10.0;
            sm.on_group_grant(&mut hooks, ch, ServiceOptions(0x00), 1, 2, t);
            sm.on_voice_sync(0, t + 0.1);
            sm.on_release(&mut hooks, 0, t + 1.0);
        }
        assert_eq!(hooks.tune_count(851_125_000), 3);
    }
}
