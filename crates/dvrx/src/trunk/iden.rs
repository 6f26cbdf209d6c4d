// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identifier (band-plan) tables: channel number to RF frequency.
//!
//! One table per protocol instance, indexed by the 4-bit identifier from
//! the channel field. Entries carry a trust level; a lookup through an
//! untrusted entry yields no frequency and the trunk SM must refuse the
//! grant.
//!
//! Frequency formula (P25/DMR Tier III):
//! `freq_hz = base_units * 5 + (channel / tdma_denom) * spacing_units * 125`
//! with the TDMA slot selected by `channel % tdma_denom`. Base units are
//! 5 Hz, spacing units 125 Hz. NXDN DCR has no IDEN PDU and uses a fixed
//! 6.25 kHz grid instead.

use crate::config::{IDEN_BASE_UNIT_HZ, IDEN_SPACING_UNIT_HZ, IDEN_TABLE_SIZE, NXDN_DCR_GRID_HZ};

/// Trust level of a band-plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trust {
    Untrusted,
    /// Seen once on a control channel, not yet confirmed.
    Provisional,
    /// Confirmed by repetition or operator configuration.
    Confirmed,
}

/// One band-plan entry (P25 IDEN_UP, DMR Tier III CSBK, NXDN CAC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdenEntry {
    /// Protocol channel type: 1 = FDMA, 3 = TDMA (P25 numbering).
    pub iden_type: u8,
    /// Base frequency in units of 5 Hz.
    pub base_units: u32,
    /// Channel spacing in units of 125 Hz.
    pub spacing_units: u32,
    /// Occupied bandwidth in Hz (informational).
    pub bandwidth_hz: u32,
    /// Transmit offset in Hz (signed; informational for a receiver).
    pub tx_offset_hz: i64,
    /// Channels per carrier: 1 (FDMA) or 2 (two-slot TDMA).
    pub tdma_denom: u8,
    pub trust: Trust,
}

impl IdenEntry {
    /// FDMA entry with the common defaults.
    #[must_use]
    pub fn fdma(base_units: u32, spacing_units: u32, trust: Trust) -> Self {
        Self {
            iden_type: 1,
            base_units,
            spacing_units,
            bandwidth_hz: 12_500,
            tx_offset_hz: 0,
            tdma_denom: 1,
            trust,
        }
    }

    /// Two-slot TDMA entry (P25 Phase 2 style).
    #[must_use]
    pub fn tdma(base_units: u32, spacing_units: u32, trust: Trust) -> Self {
        Self {
            iden_type: 3,
            base_units,
            spacing_units,
            bandwidth_hz: 12_500,
            tx_offset_hz: 0,
            tdma_denom: 2,
            trust,
        }
    }
}

/// A resolved channel: RF frequency plus TDMA slot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFreq {
    pub freq_hz: u64,
    /// Slot 0 on FDMA.
    pub slot: u8,
    pub tdma: bool,
}

/// Per-protocol identifier table (16 slots).
#[derive(Debug, Default)]
pub struct IdenTable {
    entries: [Option<IdenEntry>; IDEN_TABLE_SIZE],
}

impl IdenTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an IDEN update. Updates with lower trust than the stored
    /// entry are ignored; equal or higher trust overwrites. Returns true
    /// when the table changed.
    pub fn update(&mut self, iden: u8, entry: IdenEntry) -> bool {
        let slot = usize::from(iden & 0xF);
        match self.entries[slot] {
            Some(existing) if entry.trust < existing.trust => {
                log::debug!(
                    "[iden] ignoring update for id {iden}: trust {:?} < stored {:?}",
                    entry.trust,
                    existing.trust
                );
                false
            }
            _ => {
                self.entries[slot] = Some(entry);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, iden: u8) -> Option<&IdenEntry> {
        self.entries[usize::from(iden & 0xF)].as_ref()
    }

    /// Resolve a 16-bit channel field (identifier in the high 4 bits,
    /// channel number in the low 12) to an RF frequency and slot.
    ///
    /// Returns `None` for a missing or untrusted entry.
    #[must_use]
    pub fn lookup(&self, channel: u16) -> Option<ChannelFreq> {
        let iden = (channel >> 12) as u8;
        let number = u64::from(channel & 0x0FFF);
        let entry = self.get(iden)?;
        if entry.trust == Trust::Untrusted {
            return None;
        }
        let denom = u64::from(entry.tdma_denom.max(1));
        let freq_hz = u64::from(entry.base_units) * IDEN_BASE_UNIT_HZ
            + (number / denom) * u64::from(entry.spacing_units) * IDEN_SPACING_UNIT_HZ;
        Some(ChannelFreq {
            freq_hz,
            slot: (number % denom) as u8,
            tdma: entry.tdma_denom > 1,
        })
    }
}

/// NXDN DCR channel grid: fixed 6.25 kHz steps from the system base, no
/// IDEN PDU involved.
#[must_use]
pub fn nxdn_dcr_freq(base_units: u32, channel: u16) -> u64 {
    u64::from(base_units) * IDEN_BASE_UNIT_HZ + u64::from(channel) * NXDN_DCR_GRID_HZ
}
