// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dPMR frame handler.
//!
//! The four frame syncs key the frame position: FS1 opens a header
//! frame, FS2 continues a superframe, FS3 closes a transmission, FS4
//! marks the data variant. The control channel field rides the K=5
//! convolutional code with a CRC-7 close; everything else is AMBE
//! payload for the external codec.

use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::event::EventRecord;
use crate::fec::crc;
use crate::fec::viterbi::{self, SoftBit};
use crate::sync::{SyncKind, SyncType};

use super::{collect_dibits, dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

/// Post-sync frame dibits.
const FRAME_DIBITS: usize = 192;
/// Control channel field: 96 coded bits.
const CCH_DIBITS: usize = 48;
/// CCH info bits: msg(37) + crc7(7).
const CCH_INFO_BITS: usize = 44;

/// Decoded dPMR control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlField {
    /// Communication mode / call type.
    pub mode: u8,
    pub dst_id: u32,
    pub src_id: u32,
}

/// Decode the CCH: conv decode then CRC-7.
#[must_use]
pub fn decode_cch(bits: &[u8]) -> Option<ControlField> {
    let soft: Vec<SoftBit> = bits.iter().map(|&b| SoftBit::hard(b)).collect();
    let (info, _metric) = viterbi::decode_soft(&viterbi::NXDN_CHANNEL, &soft, CCH_INFO_BITS, true);
    let packed = crate::bits::pack_bits(&info);
    let wire_crc = info[37..44].iter().fold(0u32, |a, &b| (a << 1) | u32::from(b));
    let calc = crc::crc_msb(&crc::CRC7_SCCH, &packed, 37);
    if calc != wire_crc {
        return None;
    }
    // msg(37): mode(5) dst(16) src(16).
    let mode = (crate::bits::get_bits(&packed, 0, 5)) as u8;
    let dst_id = crate::bits::get_bits(&packed, 5, 16);
    let src_id = crate::bits::get_bits(&packed, 21, 16);
    Some(ControlField {
        mode,
        dst_id,
        src_id,
    })
}

/// Encode a CCH (loopback tests).
#[must_use]
pub fn encode_cch(field: &ControlField) -> Vec<u8> {
    let mut bits = Vec::with_capacity(CCH_INFO_BITS);
    let push_bits = |bits: &mut Vec<u8>, v: u32, n: usize| {
        for i in (0..n).rev() {
            bits.push(((v >> i) & 1) as u8);
        }
    };
    push_bits(&mut bits, u32::from(field.mode & 0x1F), 5);
    push_bits(&mut bits, field.dst_id, 16);
    push_bits(&mut bits, field.src_id, 16);
    let packed = crate::bits::pack_bits(&bits);
    let crc7 = crc::crc_msb(&crc::CRC7_SCCH, &packed, 37);
    push_bits(&mut bits, crc7, 7);
    viterbi::encode(&viterbi::NXDN_CHANNEL, &bits, true)
}

/// dPMR handler.
pub struct DpmrHandler {
    current_dst: u32,
}

impl DpmrHandler {
    #[must_use]
    pub fn new() -> Self {
        Self { current_dst: 0 }
    }

    /// Destination of the call in progress (0 when idle).
    #[must_use]
    pub fn current_dst(&self) -> u32 {
        self.current_dst
    }
}

impl Default for DpmrHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for DpmrHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let dibits = collect_dibits(source, FRAME_DIBITS, sync.inverted())?;

        match sync.kind {
            SyncKind::DpmrFs1 | SyncKind::DpmrFs4 => {
                // Header / data-header frame: CCH leads.
                let cch_bits = dibits_to_bits(&dibits[..CCH_DIBITS]);
                let Some(field) = decode_cch(&cch_bits) else {
                    return Ok(FrameOutcome::ConfirmFailed);
                };
                self.current_dst = field.dst_id;
                ctx.calls.start(
                    0,
                    crate::frame::call::CallState {
                        source: field.src_id,
                        target: field.dst_id,
                        is_group: field.mode & 0x1 == 0,
                        is_data: sync.kind == SyncKind::DpmrFs4,
                        started_at: ctx.now,
                        ..Default::default()
                    },
                );
                log::debug!(
                    "[dpmr] header mode {} {} -> {}",
                    field.mode,
                    field.src_id,
                    field.dst_id
                );
                ctx.events.push(
                    0,
                    EventRecord::call(
                        ctx.now,
                        field.src_id,
                        field.dst_id,
                        format!("dPMR mode {}", field.mode),
                    ),
                );
                ctx.sm.on_voice_sync(0, ctx.now);
            }
            SyncKind::DpmrFs3 => {
                // End frame.
                ctx.sm.on_release(ctx.hooks, 0, ctx.now);
                ctx.payloads.reset_call(0);
                ctx.calls.end(0);
                self.current_dst = 0;
            }
            _ => {
                // Superframe continuation: voice payload.
                ctx.sm.on_voice_sync(0, ctx.now);
            }
        }
        Ok(FrameOutcome::Handled)
    }
}
