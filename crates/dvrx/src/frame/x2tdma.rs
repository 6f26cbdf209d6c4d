// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! X2-TDMA handler.
//!
//! X2-TDMA is a two-slot DMR derivative: burst geometry, slot type and
//! BPTC payload coding match the DMR handler, only the sync words differ.
//! The handler therefore remaps the sync kind and delegates.

use crate::dibit::DibitSource;
use crate::error::DecodeResult;
use crate::sync::{SyncKind, SyncType};

use super::dmr::DmrHandler;
use super::{FrameContext, FrameHandler, FrameOutcome};

/// X2-TDMA handler wrapping the DMR burst machinery.
pub struct X2TdmaHandler {
    inner: DmrHandler,
}

impl X2TdmaHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DmrHandler::new(),
        }
    }
}

impl Default for X2TdmaHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameHandler for X2TdmaHandler {
    fn handle(
        &mut self,
        ctx: &mut FrameContext<'_>,
        sync: SyncType,
        source: &mut dyn DibitSource,
    ) -> DecodeResult<FrameOutcome> {
        let mapped = SyncType {
            kind: match sync.kind {
                SyncKind::X2TdmaVoice => SyncKind::DmrBsVoice,
                _ => SyncKind::DmrBsData,
            },
            polarity: sync.polarity,
        };
        self.inner.handle(ctx, mapped, source)
    }
}
