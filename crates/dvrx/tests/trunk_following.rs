// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Trunk-follower behaviour at the public API: grant admission, per-slot
// backoff, policy gating and patch table semantics.

use dvrx::config::RxOptions;
use dvrx::trunk::{IdenEntry, RecordingHooks, Role, ServiceOptions, Trust, TrunkSm};

fn sm(opts: RxOptions) -> TrunkSm {
    let mut sm = TrunkSm::new(opts);
    sm.on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
    sm.on_iden_update(2, IdenEntry::tdma(170_200_000, 100, Trust::Confirmed));
    sm.on_cc_sync(851_000_000, 0.0);
    sm
}

#[test]
fn basic_p25p1_grant_follow() {
    // IDEN 1: base 851.000 MHz, 12.5 kHz spacing, FDMA. Channel 0x000A
    // lands 125 kHz up.
    let mut sm = sm(RxOptions::default());
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
}

#[test]
fn retune_backoff_per_slot() {
    let opts = RxOptions::default()
        .with_grant_voice_timeout(0.5)
        .with_retune_backoff(2.0);
    let mut sm = sm(opts);
    let mut hooks = RecordingHooks::new();

    // Grant channel 3 on the TDMA iden: slot 1 at 851.0125 MHz.
    sm.on_group_grant(
        &mut hooks,
        (2 << 12) | 0x0003,
        ServiceOptions(0x00),
        500,
        501,
        0.0,
    );
    assert_eq!(hooks.tunes, vec![851_012_500]);

    // 0.6 s with no MAC/voice activity, then release.
    sm.on_release(&mut hooks, 1, 0.6);

    // Opposite slot on the same RF: not subject to the backoff.
    sm.on_group_grant(
        &mut hooks,
        (2 << 12) | 0x0002,
        ServiceOptions(0x00),
        500,
        501,
        0.65,
    );
    assert_eq!(hooks.tunes.len(), 2);
    sm.on_release(&mut hooks, 0, 0.7);

    // Slot 1 again inside the 2 s backoff: no tune.
    sm.on_group_grant(
        &mut hooks,
        (2 << 12) | 0x0003,
        ServiceOptions(0x00),
        500,
        501,
        1.0,
    );
    assert_eq!(hooks.tunes.len(), 2);
}

#[test]
fn individual_grant_policy_gating() {
    let ch = (1 << 12) | 0x000A;

    // Private calls off: no tune.
    let mut m = sm(RxOptions::default());
    let mut hooks = RecordingHooks::new();
    m.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x00), 42, 43, 0.1);
    assert!(hooks.tunes.is_empty());

    // Private on, data off, data-service grant: no tune.
    let mut m = sm(RxOptions::default().with_private_calls(true));
    let mut hooks = RecordingHooks::new();
    m.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x10), 42, 43, 0.1);
    assert!(hooks.tunes.is_empty());

    // Data on, enc off, encrypted grant: no tune.
    let mut m = sm(RxOptions::default()
        .with_private_calls(true)
        .with_data_calls(true));
    let mut hooks = RecordingHooks::new();
    m.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x40), 42, 43, 0.1);
    assert!(hooks.tunes.is_empty());

    // Everything enabled: encrypted grant follows.
    let mut m = sm(RxOptions::default()
        .with_private_calls(true)
        .with_data_calls(true)
        .with_enc_calls(true));
    let mut hooks = RecordingHooks::new();
    m.on_indiv_grant(&mut hooks, ch, ServiceOptions(0x40), 42, 43, 0.1);
    assert_eq!(hooks.tunes.len(), 1);
}

#[test]
fn grg_add_delete_clear() {
    let mut m = sm(RxOptions::default());
    for wgid in [200, 300, 400] {
        m.on_patch_add(100, wgid, true);
    }
    assert_eq!(m.patches.get(100).unwrap().wgids, vec![200, 300, 400]);

    m.on_patch_delete(100, 300);
    assert_eq!(m.patches.get(100).unwrap().wgids, vec![200, 400]);

    m.patches.clear_sg(100);
    let entry = m.patches.get(100).unwrap();
    assert!(!entry.active);
    assert_eq!(entry.wgids, vec![200, 400]);
}

#[test]
fn patch_add_is_idempotent() {
    let mut m = sm(RxOptions::default());
    m.on_patch_add(100, 200, true);
    let before = m.patches.get(100).unwrap().wgids.len();
    m.on_patch_add(100, 200, true);
    assert_eq!(m.patches.get(100).unwrap().wgids.len(), before);
}

#[test]
fn tune_emitted_exactly_once_per_admitted_grant() {
    let mut m = sm(RxOptions::default());
    let mut hooks = RecordingHooks::new();
    for i in 0..5 {
        let t = f64::from(i) * 10.0;
        m.on_group_grant(
            &mut hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0x00),
            1001,
            1002,
            t,
        );
        m.on_voice_sync(0, t + 0.1);
        m.on_release(&mut hooks, 0, t + 1.0);
    }
    // Monotonic count, one tune per admitted grant, all to one frequency.
    assert_eq!(hooks.tune_count(851_125_000), 5);
    assert_eq!(hooks.tunes.len(), 5);
}

#[test]
fn no_retune_while_backoff_pending() {
    let opts = RxOptions::default()
        .with_grant_voice_timeout(0.2)
        .with_retune_backoff(5.0);
    let mut m = sm(opts);
    let mut hooks = RecordingHooks::new();
    let ch = (2 << 12) | 0x0005; // slot 1

    m.on_group_grant(&mut hooks, ch, ServiceOptions(0x00), 9, 10, 0.0);
    m.on_release(&mut hooks, 1, 0.5); // dead grant -> backoff until 5.5

    for t in [1.0, 2.0, 3.0, 4.0, 5.0] {
        m.on_group_grant(&mut hooks, ch, ServiceOptions(0x00), 9, 10, t);
    }
    assert_eq!(hooks.tunes.len(), 1);

    m.on_group_grant(&mut hooks, ch, ServiceOptions(0x00), 9, 10, 5.6);
    assert_eq!(hooks.tunes.len(), 2);
}

#[test]
fn hangtime_forces_return_to_cc() {
    let mut m = sm(RxOptions::default().with_hangtime(1.0));
    let mut hooks = RecordingHooks::new();
    m.on_group_grant(
        &mut hooks,
        (1 << 12) | 0x000A,
        ServiceOptions(0x00),
        1,
        2,
        0.0,
    );
    m.on_voice_sync(0, 2.0);
    m.tick(&mut hooks, 3.0);
    assert_eq!(m.role(), Role::TunedVoice);
    // Past last_voice + hangtime + margin.
    m.tick(&mut hooks, 3.6);
    assert_eq!(m.role(), Role::OnControl);
    assert_eq!(hooks.returns, 1);
}

#[test]
fn encryption_lockout_beats_policy() {
    let mut m = sm(RxOptions::default().with_enc_calls(true));
    m.on_enc_lockout(1001);
    let mut hooks = RecordingHooks::new();
    m.on_group_grant(
        &mut hooks,
        (1 << 12) | 0x000A,
        ServiceOptions(0x40),
        1001,
        2,
        0.1,
    );
    assert!(hooks.tunes.is_empty());
}
