// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NXDN (4800/9600 and DCR) frame handler.
//!
//! Post-sync frame: 8 LICH dibits (one LICH bit per symbol sign), a
//! 30-dibit SACCH field, and a 144-dibit content region whose meaning the
//! LICH selects (VCH voice, FACCH, UDCH, or the RCCH CAC on trunked
//! control channels). The LICH parity is the sync confirmation; an
//! unknown LICH more than one bit away from every known value rejects
//! the frame.
//!
//! Channel coding: all NXDN control fields ride the K=5 rate-1/2
//! convolutional code; CRC-6 (SACCH), CRC-12 (FACCH), CRC-15 (UDCH) and
//! CRC-16-CAC close each field.

use crate::bits::Dibit;
use crate::dibit::DibitSource;
use crate::error::{DecodeError, DecodeResult};
use crate::event::EventRecord;
use crate::fec::viterbi::{self, SoftBit};
use crate::fec::crc;
use crate::sync::SyncType;
use crate::trunk::ServiceOptions;

use super::{collect_dibits, dibits_to_bits, FrameContext, FrameHandler, FrameOutcome};

/// Post-sync dibits (192 minus the 10-symbol FSW).
const FRAME_DIBITS: usize = 182;
const LICH_DIBITS: usize = 8;
const SACCH_DIBITS: usize = 30;
const CONTENT_DIBITS: usize = 144;

/// RF channel type from LICH bits 6..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfChannel {
    /// Trunked control channel.
    Rcch,
    /// Traffic channel.
    Rtch,
    /// Direct/conventional channel.
    Rdch,
    /// Second traffic channel variant.
    Rtch2,
}

/// Functional content selected by LICH bits 4..1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    SacchVoice,
    SacchFacch,
    Udch,
    Cac,
    Idle,
}

/// Decoded LICH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lich {
    pub rf: RfChannel,
    pub function: Function,
    pub inbound: bool,
    /// Corrected bit count (0 or 1).
    pub errors: u32,
}

/// DCR signature LICH values (fixed wide-parity encodings).
const DCR_SIGNATURES: [(u8, Function); 3] = [
    (0x46, Function::SacchVoice),
    (0x48, Function::Udch),
    (0x4A, Function::SacchFacch),
];

/// Every valid LICH byte with its decoded meaning.
fn lich_table() -> &'static [(u8, RfChannel, Function, bool)] {
    static TABLE: std::sync::OnceLock<Vec<(u8, RfChannel, Function, bool)>> =
        std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::new();
        for rf in [
            RfChannel::Rcch,
            RfChannel::Rtch,
            RfChannel::Rdch,
            RfChannel::Rtch2,
        ] {
            for function in [
                Function::SacchVoice,
                Function::SacchFacch,
                Function::Udch,
                Function::Cac,
                Function::Idle,
            ] {
                for inbound in [false, true] {
                    table.push((encode_lich(rf, function, inbound), rf, function, inbound));
                }
            }
        }
        for (byte, function) in DCR_SIGNATURES {
            table.push((byte, RfChannel::Rdch, function, false));
        }
        table
    })
}

/// Decode a LICH byte against the table of known values.
///
/// Exact hits decode directly; otherwise a single-bit repair is accepted
/// only when exactly one known value sits at distance 1 (an ambiguous
/// neighborhood, like 0x42 between two DCR signatures, rejects).
#[must_use]
pub fn decode_lich(byte: u8) -> Option<Lich> {
    let table = lich_table();
    if let Some(&(_, rf, function, inbound)) = table.iter().find(|(b, ..)| *b == byte) {
        return Some(Lich {
            rf,
            function,
            inbound,
            errors: 0,
        });
    }
    let mut candidates = table
        .iter()
        .filter(|(b, ..)| (b ^ byte).count_ones() == 1);
    match (candidates.next(), candidates.next()) {
        (Some(&(_, rf, function, inbound)), None) => Some(Lich {
            rf,
            function,
            inbound,
            errors: 1,
        }),
        _ => None,
    }
}

/// Build a LICH byte (encode side, used by tests and the builders).
#[must_use]
pub fn encode_lich(rf: RfChannel, function: Function, inbound: bool) -> u8 {
    let rf_bits = match rf {
        RfChannel::Rcch => 0b00u8,
        RfChannel::Rtch => 0b01,
        RfChannel::Rdch => 0b10,
        RfChannel::Rtch2 => 0b11,
    };
    let f_bits = match function {
        Function::SacchVoice => 0x0u8,
        Function::SacchFacch => 0x1,
        Function::Udch => 0x2,
        Function::Cac => 0x8,
        Function::Idle => 0xF,
    };
    let mut byte = (rf_bits << 5) | (f_bits << 1) | u8::from(inbound);
    let parity = ((byte >> 3) & 0xF).count_ones() % 2;
    byte |= (parity as u8) << 7;
    byte
}

fn conv_decode(bits: &[u8], info_len: usize) -> (Vec<u8>, u32) {
    let soft: Vec<SoftBit> = bits.iter().map(|&b| SoftBit::hard(b)).collect();
    viterbi::decode_soft(&viterbi::NXDN_CHANNEL, &soft, info_len, true)
}

fn bits_to_u32(bits: &[u8]) -> u32 {
    bits.iter().fold(0, |acc, &b| (acc << 1) | u32::from(b))
}

/// NXDN handler.
pub struct NxdnHandler {
    /// Voice slot is always 0 on FDMA NXDN.
    ran: u8,
}

impl NxdnHandler {
    #[must_use]
    pub fn new() -> Self {
        Self { ran: 0 }
    }

    /// Radio access number of the last CAC message.
    #[must_use]
    pub fn ran(&self) -> u8 {
        self.ran
    }

    /// SACCH field: 60 coded bits -> 26 info = sf(2) + msg(18) + crc6(6).
    fn handle_sacch(&mut self, ctx: &mut FrameContext<'_>, dibits: &[Dibit]) {
        let coded = dibits_to_bits(dibits);
        let (info, _metric) = conv_decode(&coded, 26);
        let sf = (info[0] << 1) | info[1];
        let msg: [u8; 18] = info[2..20].try_into().expect("18 msg bits");
        let wire_crc = bits_to_u32(&info[20..26]);
        let packed = crate::bits::pack_bits(&info[..20]);
        let calc = crc::crc_msb(&crc::CRC6_SACCH, &packed, 20);
        let crc_ok = calc == wire_crc;

        if let Some(full) = ctx.payloads.sacch[0].push(sf, &msg, crc_ok, None) {
            let head = bits_to_u32(&full[..16]);
            log::debug!("[nxdn] SACCH superframe complete, head {head:#06X}");
            ctx.events.push(
                0,
                EventRecord::call(ctx.now, 0, 0, format!("SACCH SF {head:#06X}")),
            );
        }
    }

    /// RCCH CAC: 288 coded bits -> 140 info = msg(124) + crc16(16).
    fn handle_cac(&mut self, ctx: &mut FrameContext<'_>, dibits: &[Dibit]) -> DecodeResult<()> {
        let coded = dibits_to_bits(dibits);
        let (info, _metric) = conv_decode(&coded, 140);
        let wire_crc = bits_to_u32(&info[124..140]);
        let packed = crate::bits::pack_bits(&info[..124]);
        let calc = crc::crc_msb(&crc::CRC16_CAC, &packed, 124);
        if calc != wire_crc {
            if !ctx.opts.crc_relax {
                return Err(DecodeError::BitError { stage: "nxdn/cac" });
            }
            log::debug!("[nxdn] CAC crc_bad accepted (relaxed), not applied");
            return Ok(());
        }
        // CAC message: opcode(8) ran(6 in the head byte pair) fields.
        let bytes = packed;
        let opcode = bytes[0];
        self.ran = bytes[1] & 0x3F;
        match opcode {
            // VCALL_ASSGN: svc(8) ch(16) dst(16) src(16).
            0x01 => {
                let svc = bytes[2];
                let ch = u16::from_be_bytes([bytes[3], bytes[4]]);
                let dst = u32::from(u16::from_be_bytes([bytes[5], bytes[6]]));
                let src = u32::from(u16::from_be_bytes([bytes[7], bytes[8]]));
                ctx.sm
                    .on_group_grant(ctx.hooks, ch, ServiceOptions(svc), dst, src, ctx.now);
            }
            // DCALL_ASSGN: same shape, data service.
            0x02 => {
                let ch = u16::from_be_bytes([bytes[3], bytes[4]]);
                let dst = u32::from(u16::from_be_bytes([bytes[5], bytes[6]]));
                let src = u32::from(u16::from_be_bytes([bytes[7], bytes[8]]));
                ctx.sm
                    .on_group_grant(ctx.hooks, ch, ServiceOptions(0x10), dst, src, ctx.now);
            }
            // SITE_INFO: adjacent-site channel for CC hunting.
            0x0A => {
                let ch = u16::from_be_bytes([bytes[3], bytes[4]]);
                if let Some(freq) = ctx.sm.iden.lookup(ch) {
                    ctx.sm.on_cc_candidate(freq.freq_hz);
                }
            }
            other => {
                log::debug!("[nxdn] CAC opcode {other:#04X}, skipped");
            }
        }
        Ok(())
    }

    /// FACCH1 halves: 144 coded bits each -> 68 info = msg(56) + crc12(12).
    fn handle_facch(&mut self, ctx: &mut FrameContext<'_>, dibits: &[Dibit]) {
        for half in dibits.chunks(CONTENT_DIBITS / 2) {
            let coded = dibits_to_bits(half);
            let (info, _metric) = conv_decode(&coded, 68);
            let wire_crc = bits_to_u32(&info[56..68]);
            let packed = crate::bits::pack_bits(&info[..56]);
            let calc = crc::crc_msb(&crc::CRC12_FACCH, &packed, 56);
            if calc != wire_crc {
                log::debug!("[nxdn] FACCH1 CRC bad, half dropped");
                continue;
            }
            let opcode = packed[0];
            match opcode {
                // TX_REL ends the call.
                0x08 => {
                    ctx.sm.on_release(ctx.hooks, 0, ctx.now);
                    ctx.payloads.reset_call(0);
                }
                other => {
                    log::debug!("[nxdn] FACCH1 opcode {other:#04X}, noted");
                    ctx.sm.on_mac_active(0, ctx.now);
                }
            }
        }
    }

    /// UDCH: 288 coded bits -> 140 info = msg(125) + crc15(15).
    fn handle_udch(&mut self, ctx: &mut FrameContext<'_>, dibits: &[Dibit]) {
        let coded = dibits_to_bits(dibits);
        let (info, _metric) = conv_decode(&coded, 140);
        let wire_crc = bits_to_u32(&info[125..140]);
        let packed = crate::bits::pack_bits(&info[..125]);
        let calc = crc::crc_msb(&crc::CRC15_UDCH, &packed, 125);
        if calc != wire_crc {
            log::debug!("[nxdn] UDCH CRC bad, dropped");
            return;
        }
        // UDCH user data feeds the IP tunnel decoder.
        for event in ctx.payloads.handle_ip(&packed) {
            if let crate::payload::PayloadEvent::Location(r) = &event {
                let mut rec = EventRecord::call(ctx.now, 0, 0, "LRRP");
                rec.gps = r.lat_deg.zip(r.lon_deg);
                ctx.events.push(0, rec);
            }
        }
    }
}

impl Default for NxdnHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for NxdnHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let dibits = collect_dibits(source, FRAME_DIBITS, sync.inverted())?;

        // LICH: one bit per symbol sign.
        let mut lich_byte = 0u8;
        for d in &dibits[..LICH_DIBITS] {
            lich_byte = (lich_byte << 1) | d.high_bit();
        }
        let Some(lich) = decode_lich(lich_byte) else {
            log::debug!("[nxdn] LICH {lich_byte:#04X} rejected");
            return Ok(FrameOutcome::ConfirmFailed);
        };

        let sacch = &dibits[LICH_DIBITS..LICH_DIBITS + SACCH_DIBITS];
        let content = &dibits[LICH_DIBITS + SACCH_DIBITS..];
        debug_assert_eq!(content.len(), CONTENT_DIBITS);

        if lich.rf == RfChannel::Rcch {
            ctx.sm.on_cc_sync(ctx.sm.cc_freq_hz(), ctx.now);
        }

        match lich.function {
            Function::Cac => self.handle_cac(ctx, content)?,
            Function::SacchVoice => {
                ctx.sm.on_voice_sync(0, ctx.now);
                self.handle_sacch(ctx, sacch);
            }
            Function::SacchFacch => {
                self.handle_sacch(ctx, sacch);
                self.handle_facch(ctx, content);
            }
            Function::Udch => self.handle_udch(ctx, content),
            Function::Idle => {}
        }
        Ok(FrameOutcome::Handled)
    }
}

// ========================================================================
// Test-side frame builders
// ========================================================================
