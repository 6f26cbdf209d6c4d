// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Patch/regroup (supergroup) table.
//!
//! Tracks MFID90 GRG-style patches: up to 8 supergroups of up to 8
//! workgroup IDs each. Adds are idempotent, deletes shrink the WGID list
//! but keep the supergroup record, and a clear marks the record inactive
//! without discarding it (the console frequently re-activates the same
//! regroup). Overflow evicts the least recently touched inactive entry,
//! falling back to the least recently touched overall.

use crate::config::{PATCH_SG_SLOTS, PATCH_WGIDS_PER_SG};

/// One supergroup record.
#[derive(Debug, Clone)]
pub struct PatchEntry {
    pub sg: u16,
    pub wgids: Vec<u16>,
    /// True for a two-way patch, false for a one-way simulselect regroup.
    pub is_patch: bool,
    pub active: bool,
    /// Monotonic touch stamp for LRU eviction.
    touched: u64,
}

/// Bounded supergroup table.
#[derive(Debug, Default)]
pub struct PatchTable {
    entries: Vec<PatchEntry>,
    clock: u64,
}

impl PatchTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(&mut self, idx: usize) {
        self.clock += 1;
        self.entries[idx].touched = self.clock;
    }

    fn find(&self, sg: u16) -> Option<usize> {
        self.entries.iter().position(|e| e.sg == sg)
    }

    /// Add a WGID to a supergroup, creating or re-activating the record.
    /// Idempotent: re-adding an existing WGID leaves the list unchanged.
    pub fn add_wgid(&mut self, sg: u16, wgid: u16, is_patch: bool) {
        let idx = match self.find(sg) {
            Some(i) => i,
            None => {
                if self.entries.len() == PATCH_SG_SLOTS {
                    self.evict();
                }
                self.entries.push(PatchEntry {
                    sg,
                    wgids: Vec::with_capacity(PATCH_WGIDS_PER_SG),
                    is_patch,
                    active: true,
                    touched: 0,
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        entry.is_patch = is_patch;
        entry.active = true;
        if !entry.wgids.contains(&wgid) {
            if entry.wgids.len() == PATCH_WGIDS_PER_SG {
                entry.wgids.remove(0);
            }
            entry.wgids.push(wgid);
        }
        self.touch(idx);
        log::debug!("[patch] SG {sg} += WGID {wgid} (patch={is_patch})");
    }

    /// Remove one WGID. The supergroup record itself is preserved.
    pub fn remove_wgid(&mut self, sg: u16, wgid: u16) {
        if let Some(idx) = self.find(sg) {
            self.entries[idx].wgids.retain(|&w| w != wgid);
            self.touch(idx);
        }
    }

    /// Deactivate a supergroup, preserving its WGID list.
    pub fn clear_sg(&mut self, sg: u16) {
        if let Some(idx) = self.find(sg) {
            self.entries[idx].active = false;
            self.touch(idx);
        }
    }

    /// Delete a supergroup record outright (explicit console delete).
    pub fn delete_sg(&mut self, sg: u16) {
        self.entries.retain(|e| e.sg != sg);
    }

    #[must_use]
    pub fn get(&self, sg: u16) -> Option<&PatchEntry> {
        self.find(sg).map(|i| &self.entries[i])
    }

    /// The supergroup a WGID is actively patched into, if any.
    #[must_use]
    pub fn supergroup_of(&self, wgid: u16) -> Option<u16> {
        self.entries
            .iter()
            .find(|e| e.active && e.wgids.contains(&wgid))
            .map(|e| e.sg)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self) {
        // Oldest inactive first, oldest overall as the fallback.
        let victim = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.active)
            .min_by_key(|(_, e)| e.touched)
            .map(|(i, _)| i)
            .or_else(|| {
                self.entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.touched)
                    .map(|(i, _)| i)
            });
        if let Some(i) = victim {
            let e = self.entries.remove(i);
            log::debug!("[patch] evicted SG {} (active={})", e.sg, e.active);
        }
    }
}
