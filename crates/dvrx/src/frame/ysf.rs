// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YSF (System Fusion) frame handler.
//!
//! Every YSF frame leads with the FICH: four Golay(24,12) words carrying
//! 48 bits of frame information (frame type, channel mode, block/frame
//! counters) closed by a CCITT CRC-16. The FICH doubles as the sync
//! confirmation. Voice/data channel content rides behind it for the
//! external codec.

use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::event::EventRecord;
use crate::fec::{crc, golay};
use crate::sync::SyncType;

use super::{collect_dibits, dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

/// Post-sync frame dibits.
const FRAME_DIBITS: usize = 220;
/// FICH region: 4 Golay(24,12) words.
const FICH_DIBITS: usize = 48;

/// Frame information channel content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fich {
    /// 0 = header, 1 = communication, 2 = terminator, 3 = test.
    pub frame_info: u8,
    /// 0 = V/D mode 1, 1 = data FR, 2 = V/D mode 2, 3 = voice FR.
    pub channel_mode: u8,
    pub block_number: u8,
    pub block_total: u8,
    pub frame_number: u8,
    pub frame_total: u8,
}

/// Decode the FICH from its 96 coded bits. `None` when Golay correction
/// fails or the CRC disagrees.
#[must_use]
pub fn decode_fich(bits: &[u8]) -> Option<Fich> {
    debug_assert_eq!(bits.len(), 96);
    let mut data = 0u64;
    for word_bits in bits.chunks(24) {
        let mut w = 0u32;
        for &b in word_bits {
            w = (w << 1) | u32::from(b);
        }
        let (d, _errs) = golay::decode24(w)?;
        data = (data << 12) | u64::from(d);
    }
    // 48 bits: fields(32) + crc16(16).
    let fields = (data >> 16) as u32;
    let wire_crc = (data & 0xFFFF) as u16;
    let calc = crc::crc_msb_bytes(&crc::CRC16_CCITT, &fields.to_be_bytes()) as u16;
    if calc != wire_crc {
        return None;
    }
    Some(Fich {
        frame_info: ((fields >> 30) & 0x3) as u8,
        channel_mode: ((fields >> 28) & 0x3) as u8,
        block_number: ((fields >> 25) & 0x7) as u8,
        block_total: ((fields >> 22) & 0x7) as u8,
        frame_number: ((fields >> 19) & 0x7) as u8,
        frame_total: ((fields >> 16) & 0x7) as u8,
    })
}

/// Encode a FICH (loopback tests).
#[must_use]
pub fn encode_fich(fich: &Fich) -> Vec<u8> {
    let fields: u32 = (u32::from(fich.frame_info) << 30)
        | (u32::from(fich.channel_mode) << 28)
        | (u32::from(fich.block_number) << 25)
        | (u32::from(fich.block_total) << 22)
        | (u32::from(fich.frame_number) << 19)
        | (u32::from(fich.frame_total) << 16);
    let crc16 = crc::crc_msb_bytes(&crc::CRC16_CCITT, &fields.to_be_bytes()) as u16;
    let data = (u64::from(fields) << 16) | u64::from(crc16);
    let mut bits = Vec::with_capacity(96);
    for i in 0..4 {
        let d = ((data >> (36 - 12 * i)) & 0xFFF) as u16;
        let cw = golay::encode24(d);
        for j in (0..24).rev() {
            bits.push(((cw >> j) & 1) as u8);
        }
    }
    bits
}

/// YSF handler.
pub struct YsfHandler;

impl YsfHandler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for YsfHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for YsfHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let dibits = collect_dibits(source, FRAME_DIBITS, sync.inverted())?;
        let fich_bits = dibits_to_bits(&dibits[..FICH_DIBITS]);
        let Some(fich) = decode_fich(&fich_bits) else {
            return Ok(FrameOutcome::ConfirmFailed);
        };
        log::debug!(
            "[ysf] FI {} CM {} FN {}/{}",
            fich.frame_info,
            fich.channel_mode,
            fich.frame_number,
            fich.frame_total
        );
        match fich.frame_info {
            // Header starts a call, terminator ends it.
            0 => {
                ctx.sm.on_voice_sync(0, ctx.now);
                ctx.calls.start(
                    0,
                    crate::frame::call::CallState {
                        is_group: true,
                        started_at: ctx.now,
                        ..Default::default()
                    },
                );
                ctx.events
                    .push(0, EventRecord::call(ctx.now, 0, 0, "YSF call start"));
            }
            2 => {
                ctx.sm.on_release(ctx.hooks, 0, ctx.now);
                ctx.payloads.reset_call(0);
                ctx.calls.end(0);
            }
            _ => {
                ctx.sm.on_voice_sync(0, ctx.now);
            }
        }
        Ok(FrameOutcome::Handled)
    }
}
