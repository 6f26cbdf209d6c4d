// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NXDN SACCH superframe assembly.
//!
//! A SACCH message spans four slow-channel segments of 18 bits each. The
//! 2-bit structure field counts down (3 -> segment 1 .. 0 -> final), each
//! segment carries its own CRC-6 verdict, and the full 72-bit message is
//! released only when all four verdicts are good.
//!
//! The assembler also keeps the voice scrambler phase-aligned: segment 1
//! resets the LFSR to the call's key, later segments fast-forward it by
//! four pseudo-frames per elapsed segment so descrambling stays in step
//! even when earlier segments were missed.

use crate::keys::ScramblerLfsr;

/// Segments per superframe.
pub const SACCH_SEGMENTS: usize = 4;
/// Payload bits per segment.
pub const SACCH_SEGMENT_BITS: usize = 18;

/// Superframe assembler state, one per slot.
#[derive(Debug, Default)]
pub struct SacchSuperframe {
    segments: [Option<[u8; SACCH_SEGMENT_BITS]>; SACCH_SEGMENTS],
    crc_ok: [bool; SACCH_SEGMENTS],
}

impl SacchSuperframe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Map the on-air structure field to a segment index.
    /// sf counts down: 3 -> first segment, 0 -> final.
    #[must_use]
    pub fn segment_index(sf: u8) -> usize {
        usize::from(3 - (sf & 0x3))
    }

    /// Feed one 18-bit segment (bit values 0/1) with its CRC-6 verdict.
    /// `scrambler` is re-phased here so the voice path stays aligned.
    /// Returns the 72 assembled bits once all four segments check out.
    pub fn push(
        &mut self,
        sf: u8,
        bits: &[u8; SACCH_SEGMENT_BITS],
        crc_ok: bool,
        scrambler: Option<&mut ScramblerLfsr>,
    ) -> Option<[u8; SACCH_SEGMENTS * SACCH_SEGMENT_BITS]> {
        let idx = Self::segment_index(sf);

        if let Some(lfsr) = scrambler {
            if idx == 0 {
                lfsr.reset();
            } else {
                // Re-phase from the key as if the earlier segments' voice
                // frames had been consumed: four pseudo-frames each.
                lfsr.reset();
                lfsr.advance_frames(4 * idx as u32);
            }
        }

        if idx == 0 {
            // A new superframe begins; stale partial state is dropped.
            self.reset();
        }
        self.segments[idx] = Some(*bits);
        self.crc_ok[idx] = crc_ok;

        if idx != SACCH_SEGMENTS - 1 {
            return None;
        }
        if !(self.segments.iter().all(Option::is_some) && self.crc_ok.iter().all(|&ok| ok)) {
            log::debug!("[sacch] superframe incomplete or CRC-bad, dropped");
            self.reset();
            return None;
        }
        let mut out = [0u8; SACCH_SEGMENTS * SACCH_SEGMENT_BITS];
        for (i, seg) in self.segments.iter().enumerate() {
            out[i * SACCH_SEGMENT_BITS..(i + 1) * SACCH_SEGMENT_BITS]
                .copy_from_slice(&seg.expect("checked above"));
        }
        self.reset();
        Some(out)
    }
}
