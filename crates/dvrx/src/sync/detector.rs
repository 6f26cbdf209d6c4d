// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sliding-window sync correlator.

use std::collections::VecDeque;

use crate::bits::Dibit;

use super::patterns::{sync_defs, SYNC_WINDOW_DIBITS};
use super::{Polarity, SyncKind, SyncType};

/// Scans the dibit stream for frame sync patterns in both polarities.
pub struct SyncDetector {
    window: VecDeque<u8>,
    current: Option<SyncType>,
    /// Expanded (kind, tolerance, dibits) per enabled pattern, longest
    /// first. Precomputed so the per-dibit scan never allocates.
    patterns: Vec<(SyncKind, u8, Vec<u8>)>,
}

impl SyncDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::with_filter(|_| true)
    }

    /// Restrict detection to the given protocols.
    #[must_use]
    pub fn with_enabled(kinds: &[SyncKind]) -> Self {
        Self::with_filter(|k| kinds.contains(&k))
    }

    fn with_filter(enabled: impl Fn(SyncKind) -> bool) -> Self {
        Self {
            window: VecDeque::with_capacity(SYNC_WINDOW_DIBITS),
            current: None,
            patterns: sync_defs()
                .iter()
                .filter(|d| enabled(d.kind))
                .map(|d| (d.kind, d.tolerance, d.dibits()))
                .collect(),
        }
    }

    /// Currently published sync, if any.
    #[must_use]
    pub fn current(&self) -> Option<SyncType> {
        self.current
    }

    /// Downstream confirmation failed: drop the published sync so the next
    /// scan is not anchored to a false positive.
    pub fn reject(&mut self) {
        if let Some(s) = self.current.take() {
            log::debug!("[sync] {} failed confirmation, rescanning", s.kind.tag());
        }
    }

    /// Frame completed; keep scanning for the next sync of any kind.
    pub fn release(&mut self) {
        self.current = None;
        self.window.clear();
    }

    /// Feed one dibit. Returns a newly detected sync when the window tail
    /// correlates within tolerance.
    pub fn push(&mut self, dibit: Dibit) -> Option<SyncType> {
        if self.window.len() == SYNC_WINDOW_DIBITS {
            self.window.pop_front();
        }
        self.window.push_back(dibit.bits());

        // Positive polarity across every pattern first: DMR voice syncs
        // are the sign-inverse of the data syncs, and positive-first keeps
        // that classification deterministic.
        for polarity in [Polarity::Positive, Polarity::Inverted] {
            for idx in 0..self.patterns.len() {
                let hit = {
                    let (kind, tolerance, pattern) = &self.patterns[idx];
                    self.matches(pattern, *tolerance, polarity).then_some(*kind)
                };
                if let Some(kind) = hit {
                    let sync = SyncType { kind, polarity };
                    // The window is kept: a short-pattern false positive
                    // mid-way through a longer sync must not eat the
                    // longer pattern's dibits. Confirmation rejects it.
                    self.current = Some(sync);
                    log::debug!(
                        "[sync] {} ({})",
                        kind.tag(),
                        if polarity == Polarity::Inverted {
                            "inverted"
                        } else {
                            "positive"
                        }
                    );
                    return Some(sync);
                }
            }
        }
        None
    }

    fn matches(&self, pattern: &[u8], tolerance: u8, polarity: Polarity) -> bool {
        if self.window.len() < pattern.len() {
            return false;
        }
        let start = self.window.len() - pattern.len();
        let mut distance = 0u32;
        for (i, &p) in pattern.iter().enumerate() {
            let expect = match polarity {
                Polarity::Positive => p,
                Polarity::Inverted => p ^ 0b10,
            };
            distance += u32::from((self.window[start + i] ^ expect).count_ones());
            if distance > u32::from(tolerance) {
                return false;
            }
        }
        true
    }
}

impl Default for SyncDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::patterns::sync_defs;

    fn feed(detector: &mut SyncDetector, dibits: &[u8]) -> Option<SyncType> {
        let mut hit = None;
        for &v in dibits {
            hit = detector.push(Dibit::from_bits(v)).or(hit);
        }
        hit
    }

    fn pattern_of(kind: SyncKind) -> Vec<u8> {
        sync_defs()
            .iter()
            .find(|d| d.kind == kind)
            .unwrap()
            .dibits()
    }

    #[test]
    fn test_detects_p25p1_after_noise() {
        let mut det = SyncDetector::new();
        let mut stream = vec![0u8, 2, 0, 2, 1, 0, 3, 2];
        stream.extend(pattern_of(SyncKind::P25p1));
        let hit = feed(&mut det, &stream).expect("sync found");
        assert_eq!(hit.kind, SyncKind::P25p1);
        assert_eq!(hit.polarity, Polarity::Positive);
    }

    #[test]
    fn test_detects_inverted_nxdn() {
        let mut det = SyncDetector::new();
        let inverted: Vec<u8> = pattern_of(SyncKind::Nxdn).iter().map(|d| d ^ 0b10).collect();
        let hit = feed(&mut det, &inverted).expect("sync found");
        assert_eq!(hit.kind, SyncKind::Nxdn);
        assert_eq!(hit.polarity, Polarity::Inverted);
    }

    #[test]
    fn test_tolerates_bit_errors_within_budget() {
        let mut det = SyncDetector::new();
        let mut pat = pattern_of(SyncKind::DmrBsData);
        // One flipped dibit bit: within the 2-bit tolerance.
        pat[5] ^= 0b01;
        let hit = feed(&mut det, &pat).expect("sync found");
        assert_eq!(hit.kind, SyncKind::DmrBsData);
    }

    #[test]
    fn test_dmr_voice_not_misread_as_inverted_data() {
        let mut det = SyncDetector::new();
        let hit = feed(&mut det, &pattern_of(SyncKind::DmrBsVoice)).expect("sync found");
        assert_eq!(hit.kind, SyncKind::DmrBsVoice);
        assert_eq!(hit.polarity, Polarity::Positive);
    }

    #[test]
    fn test_reject_clears_current() {
        let mut det = SyncDetector::new();
        feed(&mut det, &pattern_of(SyncKind::Nxdn)).expect("sync found");
        assert!(det.current().is_some());
        det.reject();
        assert!(det.current().is_none());
    }

    #[test]
    fn test_no_match_on_random_noise() {
        let mut det = SyncDetector::new();
        // Alternating +1/-1 symbols never match a +-3 sync run of 8+.
        let noise: Vec<u8> = (0..200).map(|i| if i % 2 == 0 { 0 } else { 2 }).collect();
        assert!(feed(&mut det, &noise).is_none());
    }
}
