// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! P25 Phase 1 (FDMA) frame handler.
//!
//! Frame = 24-dibit sync + 32-dibit NID + DUID-dependent body, with a
//! status dibit injected after every 35 transmitted dibits. The NID is a
//! BCH(63,16) codeword carrying NAC + DUID; a failed NID decode fails
//! sync confirmation. TSBKs ride the 1/2-rate dibit trellis, MPDUs mix a
//! 1/2-rate header with 3/4-rate data blocks.

use crate::bits::{get_bits, get_bits64, pack_bits, Dibit};
use crate::dibit::DibitSource;
use crate::error::{DecodeError, DecodeResult};
use crate::event::EventRecord;
use crate::fec::{bch, crc, trellis};
use crate::trunk::{IdenEntry, ServiceOptions, Trust};

use super::{dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

// DUIDs (TIA-102.BAAA).
pub const DUID_HDU: u8 = 0x0;
pub const DUID_TDU: u8 = 0x3;
pub const DUID_LDU1: u8 = 0x5;
pub const DUID_TSBK: u8 = 0x7;
pub const DUID_LDU2: u8 = 0xA;
pub const DUID_MPDU: u8 = 0xC;
pub const DUID_TDULC: u8 = 0xF;

// TSBK opcodes handled; everything else is skipped, never guessed.
const OSP_GRP_V_CH_GRANT: u8 = 0x00;
const OSP_GRP_V_CH_GRANT_UPDT: u8 = 0x02;
const OSP_UU_V_CH_GRANT: u8 = 0x04;
const OSP_IDEN_UP_TDMA: u8 = 0x33;
const OSP_IDEN_UP_VU: u8 = 0x34;
const OSP_SCCB: u8 = 0x39;
const OSP_RFSS_STS_BCST: u8 = 0x3A;
const OSP_NET_STS_BCST: u8 = 0x3B;
const OSP_IDEN_UP: u8 = 0x3D;
// Motorola (MFID 0x90) group regroup.
const MFID_MOTOROLA: u8 = 0x90;
const MOT_GRG_ADD: u8 = 0x00;
const MOT_GRG_DEL: u8 = 0x01;

/// Dibits between status symbols.
const STATUS_INTERVAL: usize = 35;
/// Dibits of sync already consumed before the handler runs.
const SYNC_DIBITS: usize = 24;
/// NID: 63-bit BCH codeword + 1 parity/pad bit.
const NID_DIBITS: usize = 32;
/// One trellis-coded block (196 bits).
const BLOCK_DIBITS: usize = 98;

/// Reads frame dibits while discarding the interleaved status symbols.
/// Position counting starts at the frame head (sync included), so the
/// first status dibit falls right after dibit 34.
struct StatusFilter {
    pos: usize,
}

impl StatusFilter {
    fn after_sync() -> Self {
        Self { pos: SYNC_DIBITS }
    }

    fn next(&mut self, source: &mut dyn DibitSource, inverted: bool) -> DecodeResult<Dibit> {
        loop {
            let d = source.next_dibit()?;
            let is_status = self.pos % (STATUS_INTERVAL + 1) == STATUS_INTERVAL;
            self.pos += 1;
            if !is_status {
                return Ok(if inverted { d.inverted() } else { d });
            }
        }
    }

    fn take(
        &mut self,
        source: &mut dyn DibitSource,
        n: usize,
        inverted: bool,
    ) -> DecodeResult<Vec<Dibit>> {
        (0..n).map(|_| self.next(source, inverted)).collect()
    }
}

/// P25 Phase 1 handler state.
pub struct P25p1Handler {
    /// NID decodes that needed BCH correction.
    pub header_error_count: u64,
    /// Last decoded NAC.
    pub nac: u16,
}

impl P25p1Handler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            header_error_count: 0,
            nac: 0,
        }
    }

    fn decode_nid(
        &mut self,
        filter: &mut StatusFilter,
        source: &mut dyn DibitSource,
        inverted: bool,
    ) -> DecodeResult<Option<(u16, u8)>> {
        let dibits = filter.take(source, NID_DIBITS, inverted)?;
        let bits = dibits_to_bits(&dibits);
        let word = get_bits64(&pack_bits(&bits), 0, 63);
        match bch::decode(word) {
            Some((data, errs)) => {
                if errs > 0 {
                    self.header_error_count += 1;
                }
                let nac = data >> 4;
                let duid = (data & 0xF) as u8;
                self.nac = nac;
                Ok(Some((nac, duid)))
            }
            None => Ok(None),
        }
    }

    fn read_trellis_block_12(
        filter: &mut StatusFilter,
        source: &mut dyn DibitSource,
        inverted: bool,
    ) -> DecodeResult<[u8; 12]> {
        let dibits = filter.take(source, BLOCK_DIBITS, inverted)?;
        let (symbols, _metric) = trellis::decode_12(&dibits);
        // 49 decoded dibits: 48 payload + flush.
        let mut bits = Vec::with_capacity(96);
        for &s in symbols.iter().take(48) {
            bits.push((s >> 1) & 1);
            bits.push(s & 1);
        }
        let bytes = pack_bits(&bits);
        let mut out = [0u8; 12];
        out.copy_from_slice(&bytes[..12]);
        Ok(out)
    }

    fn read_trellis_block_34(
        filter: &mut StatusFilter,
        source: &mut dyn DibitSource,
        inverted: bool,
    ) -> DecodeResult<[u8; 18]> {
        let dibits = filter.take(source, BLOCK_DIBITS, inverted)?;
        let (symbols, _metric) = trellis::decode_34(&dibits);
        // 49 decoded tribits: 48 payload + flush.
        let mut bits = Vec::with_capacity(144);
        for &s in symbols.iter().take(48) {
            bits.push((s >> 2) & 1);
            bits.push((s >> 1) & 1);
            bits.push(s & 1);
        }
        let bytes = pack_bits(&bits);
        let mut out = [0u8; 18];
        out.copy_from_slice(&bytes[..18]);
        Ok(out)
    }

    fn handle_tsbk_stream(
        &mut self,
        ctx: &mut FrameContext<'_>,
        filter: &mut StatusFilter,
        source: &mut dyn DibitSource,
        inverted: bool,
    ) -> DecodeResult<()> {
        // Up to three TSBKs per frame; the LB flag ends the chain.
        for _ in 0..3 {
            let block = Self::read_trellis_block_12(filter, source, inverted)?;
            let wire_crc = u16::from_be_bytes([block[10], block[11]]);
            let calc = crc::crc_msb_bytes(&crc::CRC16_CCITT, &block[..10]) as u16;
            if calc != wire_crc {
                if ctx.opts.crc_relax {
                    log::debug!("[p25p1] TSBK CRC bad, accepted under relaxed policy");
                    apply_tsbk(ctx, &block, true);
                } else {
                    log::debug!("[p25p1] TSBK CRC bad ({calc:#06X} != {wire_crc:#06X})");
                    return Err(DecodeError::BitError { stage: "p25p1/tsbk" });
                }
            } else {
                apply_tsbk(ctx, &block, false);
            }
            let last_block = block[0] & 0x80 != 0;
            if last_block {
                break;
            }
        }
        Ok(())
    }

    fn handle_mpdu(
        &mut self,
        ctx: &mut FrameContext<'_>,
        filter: &mut StatusFilter,
        source: &mut dyn DibitSource,
        inverted: bool,
    ) -> DecodeResult<()> {
        let header = Self::read_trellis_block_12(filter, source, inverted)?;
        // Header: A/N+IO+fmt(5) | SAP(6) | MFID | LLID(24) | FMF+btf(7) |
        // pad | syn+seq | hcrc(16). Only what the assembler needs is read.
        let sap = header[1] & 0x3F;
        let blocks = usize::from(header[6] & 0x7F);
        if blocks == 0 || blocks > 32 {
            return Ok(());
        }
        let mut assembled = Vec::with_capacity(blocks * 18);
        for _ in 0..blocks {
            let block = Self::read_trellis_block_34(filter, source, inverted)?;
            assembled.extend_from_slice(&block);
        }
        // Confirmed data ends with a 4-byte CRC-32 over the payload.
        if assembled.len() >= 4 {
            let body_len = assembled.len() - 4;
            let wire = u32::from_be_bytes([
                assembled[body_len],
                assembled[body_len + 1],
                assembled[body_len + 2],
                assembled[body_len + 3],
            ]);
            let calc = crc::crc_msb_bytes(&crc::CRC32_ARIB, &assembled[..body_len]);
            if calc != wire && !ctx.opts.crc_relax {
                return Err(DecodeError::BitError { stage: "p25p1/mpdu" });
            }
            assembled.truncate(body_len);
        }
        log::debug!("[p25p1] MPDU sap {sap:#04X}, {blocks} blocks");
        // SAP 0x04 is packet data (IP).
        if sap == 0x04 {
            for event in ctx.payloads.handle_ip(&assembled) {
                record_payload_event(ctx, 0, &event);
            }
            ctx.events
                .data_call_complete(0, 0, 0, &format!("MPDU {} bytes", assembled.len()));
        }
        Ok(())
    }
}

impl Default for P25p1Handler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for P25p1Handler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: crate::sync::SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let inverted = sync.inverted();
        let mut filter = StatusFilter::after_sync();
        let Some((nac, duid)) = self.decode_nid(&mut filter, source, inverted)? else {
            return Ok(FrameOutcome::ConfirmFailed);
        };
        log::debug!("[p25p1] NAC {nac:#05X} DUID {duid:#03X}");

        match duid {
            DUID_TSBK => {
                // A trunking CC is alive on this frequency.
                ctx.sm.on_cc_sync(ctx.sm.cc_freq_hz(), ctx.now);
                self.handle_tsbk_stream(ctx, &mut filter, source, inverted)?;
            }
            DUID_MPDU => {
                self.handle_mpdu(ctx, &mut filter, source, inverted)?;
            }
            DUID_HDU => {
                ctx.sm.on_voice_sync(0, ctx.now);
                ctx.calls.start(
                    0,
                    crate::frame::call::CallState {
                        is_group: true,
                        started_at: ctx.now,
                        light_text: format!("NAC {nac:#05X}"),
                        ..Default::default()
                    },
                );
            }
            DUID_LDU1 | DUID_LDU2 => {
                ctx.sm.on_voice_sync(0, ctx.now);
                // Voice superframe body (IMBE + link control) belongs to
                // the external MBE path; consume and release it.
            }
            DUID_TDU | DUID_TDULC => {
                ctx.sm.on_release(ctx.hooks, 0, ctx.now);
                ctx.payloads.reset_call(0);
                ctx.calls.end(0);
            }
            other => {
                log::debug!("[p25p1] unhandled DUID {other:#03X}, skipped");
            }
        }
        Ok(FrameOutcome::Handled)
    }
}

/// Apply one verified TSBK to the trunk SM.
fn apply_tsbk(ctx: &mut FrameContext<'_>, block: &[u8; 12], crc_bad: bool) {
    let opcode = block[0] & 0x3F;
    let mfid = block[1];
    let args = &block[2..10];

    if crc_bad {
        // Relaxed acceptance is identification-only: no SM mutation.
        log::debug!("[p25p1] TSBK opcode {opcode:#04X} tagged crc_bad, not applied");
        return;
    }

    if mfid == MFID_MOTOROLA {
        apply_mot_grg(ctx, opcode, args);
        return;
    }

    match opcode {
        OSP_GRP_V_CH_GRANT => {
            let svc = args[0];
            let ch = u16::from_be_bytes([args[1], args[2]]);
            let grp = u32::from(u16::from_be_bytes([args[3], args[4]]));
            let src = get_bits(args, 40, 24);
            ctx.sm
                .on_group_grant(ctx.hooks, ch, ServiceOptions(svc), grp, src, ctx.now);
        }
        OSP_GRP_V_CH_GRANT_UPDT => {
            // Two (channel, group) pairs, no service options.
            for pair in 0..2 {
                let off = pair * 4;
                let ch = u16::from_be_bytes([args[off], args[off + 1]]);
                let grp = u32::from(u16::from_be_bytes([args[off + 2], args[off + 3]]));
                if ch != 0 && grp != 0 {
                    ctx.sm
                        .on_group_grant(ctx.hooks, ch, ServiceOptions(0), grp, 0, ctx.now);
                }
            }
        }
        OSP_UU_V_CH_GRANT => {
            let ch = u16::from_be_bytes([args[0], args[1]]);
            let dst = get_bits(args, 16, 24);
            let src = get_bits(args, 40, 24);
            ctx.sm
                .on_indiv_grant(ctx.hooks, ch, ServiceOptions(0), dst, src, ctx.now);
        }
        OSP_IDEN_UP | OSP_IDEN_UP_VU => {
            // iden(4) bw(9) tx_offset(9) spacing(10) base(32).
            let iden = (get_bits(args, 0, 4)) as u8;
            let bw = get_bits(args, 4, 9);
            let tx_off = get_bits(args, 13, 9);
            let spacing = get_bits(args, 22, 10);
            let base = get_bits(args, 32, 32);
            let entry = IdenEntry {
                iden_type: 1,
                base_units: base,
                spacing_units: spacing,
                bandwidth_hz: bw * 125,
                tx_offset_hz: i64::from(tx_off) * 250_000,
                tdma_denom: 1,
                trust: Trust::Provisional,
            };
            ctx.sm.on_iden_update(iden, entry);
        }
        OSP_IDEN_UP_TDMA => {
            // iden(4) channel_type(4) tx_offset(14) spacing(10) base(32).
            let iden = (get_bits(args, 0, 4)) as u8;
            let channel_type = get_bits(args, 4, 4);
            let spacing = get_bits(args, 22, 10);
            let base = get_bits(args, 32, 32);
            let denom = if channel_type == 3 { 2 } else { 1 };
            let entry = IdenEntry {
                iden_type: channel_type as u8,
                base_units: base,
                spacing_units: spacing,
                bandwidth_hz: 12_500,
                tx_offset_hz: 0,
                tdma_denom: denom,
                trust: Trust::Provisional,
            };
            ctx.sm.on_iden_update(iden, entry);
        }
        OSP_SCCB | OSP_RFSS_STS_BCST | OSP_NET_STS_BCST => {
            // Alternate/adjacent CC channel in the tail of the broadcast.
            let ch = u16::from_be_bytes([args[4], args[5]]);
            if let Some(freq) = ctx.sm.iden.lookup(ch) {
                ctx.sm.on_cc_candidate(freq.freq_hz);
            }
        }
        other => {
            log::debug!("[p25p1] unknown TSBK opcode {other:#04X} mfid {mfid:#04X}, skipped");
        }
    }
}

/// Motorola group-regroup (patch/simulselect) TSBKs.
fn apply_mot_grg(ctx: &mut FrameContext<'_>, opcode: u8, args: &[u8]) {
    // options: 0x80 = active, 0x40 = two-way patch.
    let options = args[0];
    let sg = u16::from_be_bytes([args[1], args[2]]);
    let ga1 = u16::from_be_bytes([args[3], args[4]]);
    let ga2 = u16::from_be_bytes([args[5], args[6]]);
    match opcode {
        MOT_GRG_ADD => {
            let is_patch = options & 0x40 != 0;
            for ga in [ga1, ga2] {
                if ga != 0 {
                    ctx.sm.on_patch_add(sg, ga, is_patch);
                }
            }
            if options & 0x80 == 0 {
                ctx.sm.patches.clear_sg(sg);
            }
        }
        MOT_GRG_DEL => {
            for ga in [ga1, ga2] {
                if ga != 0 {
                    ctx.sm.on_patch_delete(sg, ga);
                }
            }
        }
        other => {
            log::debug!("[p25p1] unknown MFID90 opcode {other:#04X}, skipped");
        }
    }
}

fn record_payload_event(ctx: &mut FrameContext<'_>, slot: u8, event: &crate::payload::PayloadEvent) {
    use crate::payload::PayloadEvent;
    let record = match event {
        PayloadEvent::Location(r) => {
            let mut rec = EventRecord::call(ctx.now, 0, 0, "LRRP");
            rec.gps = r.lat_deg.zip(r.lon_deg);
            rec
        }
        PayloadEvent::NmeaLocation(p) => {
            let mut rec = EventRecord::call(ctx.now, 0, 0, "LOCN");
            rec.gps = Some((p.lat_deg, p.lon_deg));
            rec
        }
        PayloadEvent::Text(t) => EventRecord::call(ctx.now, 0, 0, format!("TMS: {}", t.text)),
        PayloadEvent::Alias(a) => {
            let mut rec = EventRecord::call(ctx.now, 0, 0, "alias");
            rec.alias = Some(a.clone());
            rec
        }
        PayloadEvent::Presence { device } => {
            EventRecord::call(ctx.now, 0, 0, format!("ARS: {device}"))
        }
        PayloadEvent::Opaque { service, len } => {
            EventRecord::call(ctx.now, 0, 0, format!("{service:?}: {len} bytes"))
        }
    };
    ctx.events.push(slot, record);
}

// ========================================================================
// Test-side frame builders
// ========================================================================

#[cfg(test)]
pub(crate) mod build {
    use super::*;
    use crate::bits::unpack_bits;

    /// Insert status dibits (value 0b01) at the on-air schedule, assuming
    /// the stream starts right after the 24-dibit sync.
    pub fn with_status_dibits(frame_dibits: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut pos = SYNC_DIBITS;
        let mut it = frame_dibits.iter();
        let mut pending: Option<u8> = it.next().copied();
        while let Some(d) = pending {
            if pos % (STATUS_INTERVAL + 1) == STATUS_INTERVAL {
                out.push(0b01);
            } else {
                out.push(d);
                pending = it.next().copied();
            }
            pos += 1;
        }
        out
    }

    /// NID dibits for a NAC/DUID pair.
    pub fn nid_dibits(nac: u16, duid: u8) -> Vec<u8> {
        let word = bch::encode((nac << 4) | u16::from(duid));
        // 63 codeword bits + 1 pad bit.
        let mut dibits = Vec::with_capacity(NID_DIBITS);
        let bits64 = word << 1;
        for i in 0..NID_DIBITS {
            dibits.push(((bits64 >> (62 - 2 * i)) & 0x3) as u8);
        }
        dibits
    }

    /// Trellis-encode a 12-byte TSBK into 98 on-air dibits.
    pub fn tsbk_dibits(block: &[u8; 12]) -> Vec<u8> {
        let bits = unpack_bits(block, 96);
        let mut symbols: Vec<u8> = bits.chunks(2).map(|c| (c[0] << 1) | c[1]).collect();
        symbols.push(0); // flush
        trellis::encode_12(&symbols)
    }

    /// Build a TSBK with a valid CRC.
    pub fn tsbk_block(opcode: u8, mfid: u8, args: &[u8; 8], last: bool) -> [u8; 12] {
        let mut block = [0u8; 12];
        block[0] = (opcode & 0x3F) | if last { 0x80 } else { 0x00 };
        block[1] = mfid;
        block[2..10].copy_from_slice(args);
        let c = crc::crc_msb_bytes(&crc::CRC16_CCITT, &block[..10]) as u16;
        block[10..12].copy_from_slice(&c.to_be_bytes());
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dibit::VecDibitSource;
    use crate::frame::testutil::TestCtx;
    use crate::sync::{SyncKind, SyncType};
    use crate::trunk::{IdenEntry, Trust};

    fn grant_args(svc: u8, ch: u16, grp: u16, src: u32) -> [u8; 8] {
        let mut args = [0u8; 8];
        args[0] = svc;
        args[1..3].copy_from_slice(&ch.to_be_bytes());
        args[3..5].copy_from_slice(&grp.to_be_bytes());
        args[5] = (src >> 16) as u8;
        args[6] = (src >> 8) as u8;
        args[7] = src as u8;
        args
    }

    fn run_frame(tc: &mut TestCtx, dibits: &[u8]) -> FrameOutcome {
        let mut handler = P25p1Handler::new();
        let mut src = VecDibitSource::from_values(dibits);
        let mut ctx = tc.ctx(0.1);
        handler
            .handle(&mut ctx, SyncType::positive(SyncKind::P25p1), &mut src)
            .expect("frame handled")
    }

    #[test]
    fn test_nid_failure_fails_confirmation() {
        let mut tc = TestCtx::new();
        // 32 dibits of noise: far outside the BCH decoding radius.
        let noise: Vec<u8> = (0..40).map(|i| (i % 4) as u8).collect();
        let outcome = run_frame(&mut tc, &build::with_status_dibits(&noise));
        assert_eq!(outcome, FrameOutcome::ConfirmFailed);
    }

    #[test]
    fn test_tsbk_group_grant_end_to_end() {
        let mut tc = TestCtx::new();
        tc.sm
            .on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        tc.sm.on_cc_sync(851_000_000, 0.0);

        let block = build::tsbk_block(
            OSP_GRP_V_CH_GRANT,
            0,
            &grant_args(0x00, (1 << 12) | 0x000A, 1001, 1002),
            true,
        );
        let mut dibits = build::nid_dibits(0x293, DUID_TSBK);
        dibits.extend(build::tsbk_dibits(&block));

        let outcome = run_frame(&mut tc, &build::with_status_dibits(&dibits));
        assert_eq!(outcome, FrameOutcome::Handled);
        assert_eq!(tc.hooks.tunes, vec![851_125_000]);
    }

    #[test]
    fn test_tsbk_crc_corruption_is_bit_error() {
        let mut tc = TestCtx::new();
        tc.sm
            .on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        tc.sm.on_cc_sync(851_000_000, 0.0);

        let mut block = build::tsbk_block(
            OSP_GRP_V_CH_GRANT,
            0,
            &grant_args(0x00, (1 << 12) | 0x000A, 1001, 1002),
            true,
        );
        // Corrupt a payload byte after CRC computation.
        block[5] ^= 0xFF;
        let mut dibits = build::nid_dibits(0x293, DUID_TSBK);
        dibits.extend(build::tsbk_dibits(&block));

        let mut handler = P25p1Handler::new();
        let mut src = VecDibitSource::from_values(&build::with_status_dibits(&dibits));
        let mut ctx = tc.ctx(0.1);
        let result = handler.handle(&mut ctx, SyncType::positive(SyncKind::P25p1), &mut src);
        assert!(matches!(
            result,
            Err(DecodeError::BitError { stage: "p25p1/tsbk" })
        ));
        assert!(tc.hooks.tunes.is_empty());
    }

    #[test]
    fn test_iden_then_grant_sequence() {
        let mut tc = TestCtx::new();
        tc.sm.on_cc_sync(851_000_000, 0.0);

        // IDEN_UP: iden 1, bw 0x64, offset 0, spacing 100, base 170200000.
        let mut args = [0u8; 8];
        let fields: u64 = (1u64 << 60)
            | (0x64u64 << 51)
            | (0u64 << 42)
            | (100u64 << 32)
            | 170_200_000u64;
        args.copy_from_slice(&fields.to_be_bytes());
        let iden_block = build::tsbk_block(OSP_IDEN_UP, 0, &args, true);

        let mut dibits = build::nid_dibits(0x293, DUID_TSBK);
        dibits.extend(build::tsbk_dibits(&iden_block));
        run_frame(&mut tc, &build::with_status_dibits(&dibits));

        // Grant through the just-learned (provisional) band plan.
        let grant = build::tsbk_block(
            OSP_GRP_V_CH_GRANT,
            0,
            &grant_args(0x00, (1 << 12) | 0x000A, 1001, 1002),
            true,
        );
        let mut dibits2 = build::nid_dibits(0x293, DUID_TSBK);
        dibits2.extend(build::tsbk_dibits(&grant));
        run_frame(&mut tc, &build::with_status_dibits(&dibits2));
        assert_eq!(tc.hooks.tunes, vec![851_125_000]);
    }

    #[test]
    fn test_mot_grg_add_and_delete() {
        let mut tc = TestCtx::new();
        tc.sm.on_cc_sync(851_000_000, 0.0);

        let mut add = |ga1: u16, ga2: u16| {
            let mut args = [0u8; 8];
            args[0] = 0xC0; // active + patch
            args[1..3].copy_from_slice(&100u16.to_be_bytes());
            args[3..5].copy_from_slice(&ga1.to_be_bytes());
            args[5..7].copy_from_slice(&ga2.to_be_bytes());
            let block = build::tsbk_block(MOT_GRG_ADD, MFID_MOTOROLA, &args, true);
            let mut dibits = build::nid_dibits(0x293, DUID_TSBK);
            dibits.extend(build::tsbk_dibits(&block));
            run_frame(&mut tc, &build::with_status_dibits(&dibits));
        };
        add(200, 300);
        add(400, 0);
        assert_eq!(tc.sm.patches.get(100).unwrap().wgids, vec![200, 300, 400]);

        // Delete GA2=300.
        let mut args = [0u8; 8];
        args[1..3].copy_from_slice(&100u16.to_be_bytes());
        args[3..5].copy_from_slice(&300u16.to_be_bytes());
        let block = build::tsbk_block(MOT_GRG_DEL, MFID_MOTOROLA, &args, true);
        let mut dibits = build::nid_dibits(0x293, DUID_TSBK);
        dibits.extend(build::tsbk_dibits(&block));
        run_frame(&mut tc, &build::with_status_dibits(&dibits));
        assert_eq!(tc.sm.patches.get(100).unwrap().wgids, vec![200, 400]);
    }

    #[test]
    fn test_tdu_releases_call() {
        let mut tc = TestCtx::new();
        tc.sm
            .on_iden_update(1, IdenEntry::fdma(170_200_000, 100, Trust::Confirmed));
        tc.sm.on_cc_sync(851_000_000, 0.0);
        tc.sm.on_group_grant(
            &mut tc.hooks,
            (1 << 12) | 0x000A,
            ServiceOptions(0),
            1001,
            1002,
            0.0,
        );
        assert_eq!(tc.sm.role(), crate::trunk::Role::TunedVoice);

        let dibits = build::nid_dibits(0x293, DUID_TDU);
        run_frame(&mut tc, &build::with_status_dibits(&dibits));
        assert_eq!(tc.sm.role(), crate::trunk::Role::OnControl);
    }
}
