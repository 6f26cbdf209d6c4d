// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! P25 Phase 2 (TDMA/HDQPSK) MAC VPDU handling.
//!
//! Phase 2 control rides MAC messages inside FACCH/SACCH/LCCH channels.
//! Message lengths for known opcodes come from the standard; for unknown
//! opcodes the length is derived from the MCO field (low 6 bits of the
//! opcode byte) as `len_b = clamp(mco - 1, 0, 16)` with the remainder of
//! the channel capacity as `len_c`. Unknown opcodes are skipped by
//! length, never interpreted.

use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::fec::crc;
use crate::sync::SyncType;
use crate::trunk::ServiceOptions;

use super::{collect_dibits, dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

/// MAC channel kind carrying a VPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XchKind {
    Facch,
    Sacch,
    Lcch,
}

impl XchKind {
    /// Octet capacity of one VPDU on this channel.
    #[must_use]
    pub fn capacity(self) -> usize {
        match self {
            Self::Facch => 16,
            Self::Sacch | Self::Lcch => 19,
        }
    }
}

/// One parsed MAC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacMessage {
    pub opcode: u8,
    pub body: Vec<u8>,
    /// Derived message length (B-portion).
    pub len_b: usize,
    /// Remaining channel capacity (C-portion).
    pub len_c: usize,
    pub slot: u8,
    /// True when the length came from the MCO fallback rather than the
    /// known-opcode table.
    pub mco_derived: bool,
}

// MAC opcodes with table-known lengths.
const MAC_NULL: u8 = 0x00;
const MAC_PTT: u8 = 0x01;
const MAC_END_PTT: u8 = 0x02;
const MAC_ACTIVE: u8 = 0x21;
const MAC_GRP_GRANT: u8 = 0x40;
const MAC_GRP_GRANT_UPDT: u8 = 0x42;
const MAC_UU_GRANT: u8 = 0x44;

/// Known-opcode body lengths (octets after the opcode byte).
fn known_len(opcode: u8) -> Option<usize> {
    match opcode {
        MAC_NULL => Some(0),
        MAC_PTT | MAC_END_PTT => Some(7),
        MAC_ACTIVE => Some(2),
        MAC_GRP_GRANT => Some(8),
        MAC_GRP_GRANT_UPDT => Some(8),
        MAC_UU_GRANT => Some(8),
        _ => None,
    }
}

/// Parse the MAC messages of one VPDU. Byte-length-bounded: a message
/// that does not fit ends the walk with no state mutated.
#[must_use]
pub fn parse_vpdu(xch: XchKind, bytes: &[u8], slot: u8) -> Vec<MacMessage> {
    let capacity = xch.capacity();
    let window = &bytes[..bytes.len().min(capacity)];
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < window.len() {
        let opcode = window[pos];
        pos += 1;
        if opcode == MAC_NULL {
            break;
        }
        let (len_b, mco_derived) = match known_len(opcode) {
            Some(n) => (n, false),
            None => {
                // MCO fallback; MCO=0 clamps to zero, it must not wrap.
                let mco = usize::from(opcode & 0x3F);
                (mco.saturating_sub(1).min(16), true)
            }
        };
        let len_c = capacity.saturating_sub(len_b.min(capacity));
        if window.len() - pos < len_b {
            // Short message: abandon the remainder, keep what parsed.
            break;
        }
        out.push(MacMessage {
            opcode,
            body: window[pos..pos + len_b].to_vec(),
            len_b,
            len_c,
            slot,
            mco_derived,
        });
        pos += len_b;
    }
    out
}

/// Burst dibits after the Phase 2 sync (reduced ISCH+payload view).
const BURST_DIBITS: usize = 156;

/// P25 Phase 2 handler. The burst descriptor carries the slot, so no
/// cross-burst state is needed here.
pub struct P25p2Handler;

impl P25p2Handler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn apply_mac(&mut self, ctx: &mut FrameContext<'_>, msg: &MacMessage) {
        match msg.opcode {
            MAC_ACTIVE => ctx.sm.on_mac_active(msg.slot, ctx.now),
            MAC_PTT => {
                ctx.sm.on_voice_sync(msg.slot, ctx.now);
                // PTT body: group(16) source(24) and padding.
                let grp = u32::from(u16::from_be_bytes([msg.body[0], msg.body[1]]));
                let src = (u32::from(msg.body[2]) << 16)
                    | (u32::from(msg.body[3]) << 8)
                    | u32::from(msg.body[4]);
                ctx.calls.start(
                    msg.slot,
                    crate::frame::call::CallState {
                        source: src,
                        target: grp,
                        is_group: true,
                        started_at: ctx.now,
                        ..Default::default()
                    },
                );
            }
            MAC_END_PTT => {
                ctx.sm.on_release(ctx.hooks, msg.slot, ctx.now);
                ctx.payloads.reset_call(msg.slot);
                ctx.calls.end(msg.slot);
            }
            MAC_GRP_GRANT => {
                let svc = msg.body[0];
                let ch = u16::from_be_bytes([msg.body[1], msg.body[2]]);
                let grp = u32::from(u16::from_be_bytes([msg.body[3], msg.body[4]]));
                let src = (u32::from(msg.body[5]) << 16)
                    | (u32::from(msg.body[6]) << 8)
                    | u32::from(msg.body[7]);
                ctx.sm
                    .on_group_grant(ctx.hooks, ch, ServiceOptions(svc), grp, src, ctx.now);
            }
            MAC_GRP_GRANT_UPDT => {
                for pair in 0..2 {
                    let off = pair * 4;
                    let ch = u16::from_be_bytes([msg.body[off], msg.body[off + 1]]);
                    let grp =
                        u32::from(u16::from_be_bytes([msg.body[off + 2], msg.body[off + 3]]));
                    if ch != 0 && grp != 0 {
                        ctx.sm
                            .on_group_grant(ctx.hooks, ch, ServiceOptions(0), grp, 0, ctx.now);
                    }
                }
            }
            MAC_UU_GRANT => {
                let ch = u16::from_be_bytes([msg.body[0], msg.body[1]]);
                let dst = (u32::from(msg.body[2]) << 16)
                    | (u32::from(msg.body[3]) << 8)
                    | u32::from(msg.body[4]);
                let src = (u32::from(msg.body[5]) << 16)
                    | (u32::from(msg.body[6]) << 8)
                    | u32::from(msg.body[7]);
                ctx.sm
                    .on_indiv_grant(ctx.hooks, ch, ServiceOptions(0), dst, src, ctx.now);
            }
            other => {
                log::debug!(
                    "[p25p2] unknown MAC opcode {other:#04X} lenB {} lenC {}, skipped",
                    msg.len_b,
                    msg.len_c
                );
            }
        }
    }
}

impl Default for P25p2Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for P25p2Handler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let dibits = collect_dibits(source, BURST_DIBITS, sync.inverted())?;
        let bits = dibits_to_bits(&dibits);
        let bytes = crate::bits::pack_bits(&bits);

        // Burst descriptor: kind + slot + CRC-7 over the descriptor pair.
        let kind = bytes[0] >> 4;
        let slot = bytes[0] & 0x01;
        let desc_crc = bytes[1] & 0x7F;
        let calc = crc::crc_msb(&crc::CRC7_SCCH, &bytes[..1], 8) as u8;
        if calc != desc_crc {
            // The descriptor is the Phase 2 confirmation field.
            return Ok(FrameOutcome::ConfirmFailed);
        }

        match kind {
            // Voice burst: keep the SM's hangtime fed.
            0x0 => {
                ctx.sm.on_voice_sync(slot, ctx.now);
            }
            // FACCH / SACCH / LCCH MAC bursts.
            0x1 | 0x2 | 0x3 => {
                let xch = match kind {
                    0x1 => XchKind::Facch,
                    0x2 => XchKind::Sacch,
                    _ => XchKind::Lcch,
                };
                for msg in parse_vpdu(xch, &bytes[2..], slot) {
                    self.apply_mac(ctx, &msg);
                }
            }
            other => {
                log::debug!("[p25p2] unknown burst kind {other:#03X}, skipped");
            }
        }
        Ok(FrameOutcome::Handled)
    }
}
