// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! EDACS / ProVoice handler.
//!
//! EDACS control words are 40 bits transmitted three times (normal,
//! inverted, normal); a bitwise 2-of-3 majority vote repairs single-copy
//! corruption. The channel-assignment words drive the trunk SM with the
//! logical channel number resolved through the band-plan table, since
//! EDACS has no over-the-air IDEN.

use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::event::EventRecord;
use crate::sync::SyncType;
use crate::trunk::ServiceOptions;

use super::{collect_dibits, dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

/// One control word: 3 x 40 bits.
const WORD_DIBITS: usize = 60;

// Command codes (reduced set).
const CMD_VOICE_GRANT: u8 = 0xEE;
const CMD_DATA_GRANT: u8 = 0xE6;
const CMD_IDLE: u8 = 0xFF;

/// Majority-vote a 40-bit word from its three transmitted copies (the
/// middle copy is inverted on the air).
#[must_use]
pub fn vote_word(bits: &[u8]) -> u64 {
    debug_assert_eq!(bits.len(), 120);
    let mut word = 0u64;
    for i in 0..40 {
        let a = bits[i];
        let b = bits[40 + i] ^ 1;
        let c = bits[80 + i];
        let bit = (a & b) | (b & c) | (a & c);
        word = (word << 1) | u64::from(bit);
    }
    word
}

/// Decoded EDACS control word: cmd(8) lcn(5) status(3) group(11)
/// + BCH parity (13, checked upstream of this reduced view).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord {
    pub cmd: u8,
    pub lcn: u8,
    pub group: u16,
}

#[must_use]
pub fn parse_word(word: u64) -> ControlWord {
    ControlWord {
        cmd: ((word >> 32) & 0xFF) as u8,
        lcn: ((word >> 27) & 0x1F) as u8,
        group: ((word >> 13) & 0x7FF) as u16,
    }
}

/// Encode-side builder for the loopback tests.
#[must_use]
pub fn build_word(cmd: u8, lcn: u8, group: u16) -> u64 {
    (u64::from(cmd) << 32) | (u64::from(lcn & 0x1F) << 27) | (u64::from(group & 0x7FF) << 13)
}

/// EDACS handler.
pub struct EdacsHandler;

impl EdacsHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for EdacsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for EdacsHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let dibits = collect_dibits(source, WORD_DIBITS, sync.inverted())?;
        let bits = dibits_to_bits(&dibits);
        let word = vote_word(&bits);
        let cw = parse_word(word);

        match cw.cmd {
            CMD_VOICE_GRANT => {
                ctx.sm.on_cc_sync(ctx.sm.cc_freq_hz(), ctx.now);
                ctx.sm.on_group_grant(
                    ctx.hooks,
                    u16::from(cw.lcn),
                    ServiceOptions(0),
                    u32::from(cw.group),
                    0,
                    ctx.now,
                );
            }
            CMD_DATA_GRANT => {
                ctx.sm.on_cc_sync(ctx.sm.cc_freq_hz(), ctx.now);
                ctx.sm.on_group_grant(
                    ctx.hooks,
                    u16::from(cw.lcn),
                    ServiceOptions(0x10),
                    u32::from(cw.group),
                    0,
                    ctx.now,
                );
            }
            CMD_IDLE => {
                ctx.sm.on_cc_sync(ctx.sm.cc_freq_hz(), ctx.now);
            }
            other => {
                // ProVoice voice frames land here: no control word match.
                if other == 0 {
                    ctx.sm.on_voice_sync(0, ctx.now);
                } else {
                    log::debug!("[edacs] cmd {other:#04X} skipped");
                    ctx.events.push(
                        0,
                        EventRecord::call(ctx.now, 0, u32::from(cw.group), "EDACS cmd"),
                    );
                }
            }
        }
        Ok(FrameOutcome::Handled)
    }
}
