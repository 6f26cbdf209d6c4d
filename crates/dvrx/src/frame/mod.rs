// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Frame dispatch and per-protocol handlers.
//!
//! Every handler follows the same six-stage contract: collect the
//! protocol's dibit count, descramble, deinterleave, depuncture,
//! soft-decode, and verify the payload CRC before any field leaves the
//! module. The dispatcher itself is pure routing: it owns no protocol
//! state and simply selects the handler for the detected sync kind.

pub mod call;
pub mod dmr;
pub mod dpmr;
pub mod dstar;
pub mod edacs;
pub mod m17;
pub mod nxdn;
pub mod p25p1;
pub mod p25p2;
pub mod x2tdma;
pub mod ysf;

use crate::bits::Dibit;
use crate::config::RxOptions;
use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::event::EventLog;
use crate::payload::PayloadDecoder;
use crate::sync::{SyncKind, SyncType};
use crate::trunk::{ControlHooks, TrunkSm};

/// Shared mutable context handed to a handler for one frame.
pub struct FrameContext<'a> {
    pub opts: &'a RxOptions,
    pub sm: &'a mut TrunkSm,
    pub hooks: &'a mut dyn ControlHooks,
    pub events: &'a EventLog,
    pub payloads: &'a mut PayloadDecoder,
    pub calls: &'a mut call::CallTracker,
    /// Monotonic time in seconds.
    pub now: f64,
}

/// Handler verdict for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame consumed; sync stays published.
    Handled,
    /// The first post-sync integrity check failed; the detector must
    /// reset to none and rescan.
    ConfirmFailed,
}

/// One protocol frame handler.
pub trait FrameHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome>;
}

/// Collect `n` dibits, correcting polarity for inverted syncs.
pub fn collect_dibits(
    source: &mut dyn DibitSource,
    n: usize,
    inverted: bool,
) -> DecodeResult<Vec<Dibit>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let d = source.next_dibit()?;
        out.push(if inverted { d.inverted() } else { d });
    }
    Ok(out)
}

/// Expand dibits to bit values (upper bit first).
#[must_use]
pub fn dibits_to_bits(dibits: &[Dibit]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(dibits.len() * 2);
    for d in dibits {
        bits.push(d.high_bit());
        bits.push(d.low_bit());
    }
    bits
}

/// Routes detected frames to their protocol handler.
pub struct Dispatcher {
    p25p1: p25p1::P25p1Handler,
    p25p2: p25p2::P25p2Handler,
    dmr: dmr::DmrHandler,
    nxdn: nxdn::NxdnHandler,
    dstar: dstar::DstarHandler,
    m17: m17::M17Handler,
    ysf: ysf::YsfHandler,
    dpmr: dpmr::DpmrHandler,
    edacs: edacs::EdacsHandler,
    x2: x2tdma::X2TdmaHandler,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            p25p1: p25p1::P25p1Handler::new(),
            p25p2: p25p2::P25p2Handler::new(),
            dmr: dmr::DmrHandler::new(),
            nxdn: nxdn::NxdnHandler::new(),
            dstar: dstar::DstarHandler::new(),
            m17: m17::M17Handler::new(),
            ysf: ysf::YsfHandler::new(),
            dpmr: dpmr::DpmrHandler::new(),
            edacs: edacs::EdacsHandler::new(),
            x2: x2tdma::X2TdmaHandler::new(),
        }
    }

    /// Invoke the matching handler for one frame, then return to the
    /// sync scanner.
    pub fn dispatch(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        match sync.kind {
            SyncKind::P25p1 => self.p25p1.handle(ctx, sync, source),
            SyncKind::P25p2 => self.p25p2.handle(ctx, sync, source),
            SyncKind::DmrBsData
            | SyncKind::DmrBsVoice
            | SyncKind::DmrMsVoice
            | SyncKind::DmrMsData
            | SyncKind::DmrRcData => self.dmr.handle(ctx, sync, source),
            SyncKind::Nxdn => self.nxdn.handle(ctx, sync, source),
            SyncKind::Dstar | SyncKind::DstarHeader => self.dstar.handle(ctx, sync, source),
            SyncKind::M17Lsf
            | SyncKind::M17Stream
            | SyncKind::M17Packet
            | SyncKind::M17Bert
            | SyncKind::M17Preamble => self.m17.handle(ctx, sync, source),
            SyncKind::Ysf => self.ysf.handle(ctx, sync, source),
            SyncKind::DpmrFs1 | SyncKind::DpmrFs2 | SyncKind::DpmrFs3 | SyncKind::DpmrFs4 => {
                self.dpmr.handle(ctx, sync, source)
            }
            SyncKind::ProVoice => self.edacs.handle(ctx, sync, source),
            SyncKind::X2TdmaData | SyncKind::X2TdmaVoice => self.x2.handle(ctx, sync, source),
            SyncKind::Analog | SyncKind::Digital => Ok(FrameOutcome::Handled),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
