// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! D-STAR frame handler.
//!
//! The radio header is 660 coded bits: a 7-bit PN scrambler
//! (x^7 + x^4 + 1, seed 0b0000111, period 127), a 24-column block
//! interleaver, a K=3 rate-1/2 convolutional code (generators 7/5 octal)
//! decoded by traceback from the minimum-metric end state, and a
//! CRC-16/X.25 over the first 312 info bits. Voice frames carry AMBE data
//! for the external codec; here they only feed call timing.

use crate::bits::pack_bits;
use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::event::EventRecord;
use crate::fec::crc;
use crate::fec::viterbi::{self, SoftBit};
use crate::sync::{SyncKind, SyncType};

use super::{collect_dibits, FrameContext, FrameHandler, FrameOutcome};

/// Coded header bits on the air.
pub const HEADER_CODED_BITS: usize = 660;
/// Info bits out of the decoder (328 used + 2 pad).
pub const HEADER_INFO_BITS: usize = 330;
/// Bits covered by the CRC (39 octets of header fields).
const CRC_SPAN_BITS: usize = 312;
/// Interleaver geometry: 24 columns, 28 rows, last 12 cells unused.
const ILV_COLS: usize = 24;
const ILV_ROWS: usize = 28;

/// Voice frame dibits following a voice sync.
const VOICE_FRAME_DIBITS: usize = 72;

/// PN descrambler, x^7 + x^4 + 1.
pub struct Pn7 {
    state: u8,
}

impl Pn7 {
    #[must_use]
    pub fn new() -> Self {
        Self { state: 0b000_0111 }
    }

    fn next_bit(&mut self) -> u8 {
        let out = (self.state >> 6) & 1;
        let feedback = ((self.state >> 6) ^ (self.state >> 3)) & 1;
        self.state = ((self.state << 1) | feedback) & 0x7F;
        out
    }

    /// XOR the PN sequence over a bit slice.
    pub fn apply(&mut self, bits: &mut [u8]) {
        for b in bits {
            *b ^= self.next_bit();
        }
    }
}

impl Default for Pn7 {
    fn default() -> Self {
        Self::new()
    }
}

/// Deinterleave 660 coded bits (24-column block interleaver).
#[must_use]
pub fn deinterleave(bits: &[u8; HEADER_CODED_BITS]) -> [u8; HEADER_CODED_BITS] {
    let mut out = [0u8; HEADER_CODED_BITS];
    let mut wire = 0usize;
    // TX reads the matrix column-major; cells beyond 660 (row-major
    // numbering) do not exist.
    for col in 0..ILV_COLS {
        for row in 0..ILV_ROWS {
            let cell = row * ILV_COLS + col;
            if cell < HEADER_CODED_BITS {
                out[cell] = bits[wire];
                wire += 1;
            }
        }
    }
    out
}

/// Interleave (encode side; exact inverse of [`deinterleave`]).
#[must_use]
pub fn interleave(bits: &[u8; HEADER_CODED_BITS]) -> [u8; HEADER_CODED_BITS] {
    let mut out = [0u8; HEADER_CODED_BITS];
    let mut wire = 0usize;
    for col in 0..ILV_COLS {
        for row in 0..ILV_ROWS {
            let cell = row * ILV_COLS + col;
            if cell < HEADER_CODED_BITS {
                out[wire] = bits[cell];
                wire += 1;
            }
        }
    }
    out
}

/// Decoded D-STAR header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstarHeader {
    pub flags: [u8; 3],
    pub rpt2: String,
    pub rpt1: String,
    pub urcall: String,
    pub mycall: String,
    pub suffix: String,
}

fn callsign(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Run the full header pipeline over 660 received bits (soft weights
/// allowed via the Q16 path upstream). Returns `None` on CRC failure.
#[must_use]
pub fn decode_header(coded: &[u8; HEADER_CODED_BITS]) -> Option<DstarHeader> {
    let mut bits = *coded;
    Pn7::new().apply(&mut bits);
    let deint = deinterleave(&bits);
    let soft: Vec<SoftBit> = deint.iter().map(|&b| SoftBit::hard(b)).collect();
    let (info, _metric) =
        viterbi::decode_soft(&viterbi::DSTAR_HEADER, &soft, HEADER_INFO_BITS, false);

    let bytes = pack_bits(&info);
    let wire_crc = u16::from_le_bytes([bytes[39], bytes[40]]);
    let calc = crc::crc16_x25(&bytes[..CRC_SPAN_BITS / 8]);
    if calc != wire_crc {
        log::debug!("[dstar] header CRC mismatch ({calc:#06X} != {wire_crc:#06X})");
        return None;
    }
    Some(DstarHeader {
        flags: [bytes[0], bytes[1], bytes[2]],
        rpt2: callsign(&bytes[3..11]),
        rpt1: callsign(&bytes[11..19]),
        urcall: callsign(&bytes[19..27]),
        mycall: callsign(&bytes[27..35]),
        suffix: callsign(&bytes[35..39]),
    })
}

/// Encode-side pipeline (used by the loopback tests and the BER tool).
#[must_use]
pub fn encode_header(header: &DstarHeader) -> [u8; HEADER_CODED_BITS] {
    let mut bytes = [0u8; 42];
    bytes[..3].copy_from_slice(&header.flags);
    let put = |dst: &mut [u8], s: &str| {
        for (i, slot) in dst.iter_mut().enumerate() {
            *slot = s.as_bytes().get(i).copied().unwrap_or(b' ');
        }
    };
    put(&mut bytes[3..11], &header.rpt2);
    put(&mut bytes[11..19], &header.rpt1);
    put(&mut bytes[19..27], &header.urcall);
    put(&mut bytes[27..35], &header.mycall);
    put(&mut bytes[35..39], &header.suffix);
    let c = crc::crc16_x25(&bytes[..39]);
    bytes[39..41].copy_from_slice(&c.to_le_bytes());

    let info = crate::bits::unpack_bits(&bytes, HEADER_INFO_BITS);
    let coded = viterbi::encode(&viterbi::DSTAR_HEADER, &info, false);
    let mut arr = [0u8; HEADER_CODED_BITS];
    arr.copy_from_slice(&coded);
    let inter = interleave(&arr);
    let mut wire = inter;
    Pn7::new().apply(&mut wire);
    wire
}

/// D-STAR handler.
pub struct DstarHandler {
    /// Header of the call in progress.
    current: Option<DstarHeader>,
}

impl DstarHandler {
    #[must_use]
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Header of the call in progress.
    #[must_use]
    pub fn current(&self) -> Option<&DstarHeader> {
        self.current.as_ref()
    }
}

impl Default for DstarHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for DstarHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        match sync.kind {
            SyncKind::DstarHeader => {
                let dibits = collect_dibits(source, HEADER_CODED_BITS, sync.inverted())?;
                let mut coded = [0u8; HEADER_CODED_BITS];
                for (slot, d) in coded.iter_mut().zip(&dibits) {
                    *slot = d.high_bit();
                }
                let Some(header) = decode_header(&coded) else {
                    return Ok(FrameOutcome::ConfirmFailed);
                };
                log::info!(
                    "[dstar] header MY {} UR {} via {}",
                    header.mycall,
                    header.urcall,
                    header.rpt1
                );
                ctx.events.push(
                    0,
                    EventRecord::call(
                        ctx.now,
                        0,
                        0,
                        format!("DSTAR {} > {}", header.mycall, header.urcall),
                    ),
                );
                ctx.calls.start(
                    0,
                    crate::frame::call::CallState {
                        alias: Some(header.mycall.clone()),
                        started_at: ctx.now,
                        light_text: format!("UR {}", header.urcall),
                        ..Default::default()
                    },
                );
                self.current = Some(header);
                ctx.sm.on_voice_sync(0, ctx.now);
            }
            _ => {
                // Voice frame: AMBE payload for the external codec.
                let _ = collect_dibits(source, VOICE_FRAME_DIBITS, sync.inverted())?;
                ctx.sm.on_voice_sync(0, ctx.now);
            }
        }
        Ok(FrameOutcome::Handled)
    }
}
