// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Key and descrambler registry.
//!
//! Three families live here: basic-privacy / scrambler integer keys
//! indexed by a system/RF hash, multi-segment RC4/DES/AES key blobs, and
//! LFSR seeds. The registry is read-mostly on the decode worker; the UI
//! queues mutations as engine commands.
//!
//! [`ScramblerLfsr`] is the bit-accounting half: the voice path advances
//! it per voice frame (half-advance on FACCH steals) so the keystream
//! position tracks bit consumption even while audio is muted.

use dashmap::DashMap;

/// Crypto algorithm identifiers for keyed blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoAlgo {
    Rc4,
    Des,
    Aes128,
    Aes256,
}

/// Key material variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// DMR basic privacy key index.
    BasicPrivacy(u16),
    /// Hytera enhanced privacy key.
    Hytera(u64),
    /// NXDN/dPMR scrambler LFSR seed.
    ScramblerSeed(u32),
    /// Multi-segment key blob for RC4/DES/AES voice.
    Blob { algo: CryptoAlgo, key: Vec<u8> },
}

/// Scope a key applies to: system identity hashed with the RF carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyScope {
    pub system: u32,
    pub rf_hash: u32,
}

impl KeyScope {
    #[must_use]
    pub fn new(system: u32, freq_hz: u64) -> Self {
        // Cheap mixing; only needs to separate carriers, not be crypto.
        let rf_hash = ((freq_hz >> 32) as u32) ^ (freq_hz as u32).rotate_left(7);
        Self { system, rf_hash }
    }
}

/// Concurrent key store.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: DashMap<KeyScope, KeyMaterial>,
}

impl KeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, scope: KeyScope, material: KeyMaterial) {
        self.keys.insert(scope, material);
    }

    #[must_use]
    pub fn get(&self, scope: &KeyScope) -> Option<KeyMaterial> {
        self.keys.get(scope).map(|e| e.value().clone())
    }

    pub fn remove(&self, scope: &KeyScope) {
        self.keys.remove(scope);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// 15-bit scrambler LFSR (x^15 + x + 1), NXDN/dPMR voice descrambling.
#[derive(Debug, Clone)]
pub struct ScramblerLfsr {
    state: u16,
    seed: u16,
}

/// Keystream bits consumed per voice pseudo-frame.
pub const PSEUDO_FRAME_BITS: u32 = 36;

impl ScramblerLfsr {
    #[must_use]
    pub fn new(seed: u16) -> Self {
        let seed = seed & 0x7FFF;
        Self {
            state: if seed == 0 { 1 } else { seed },
            seed,
        }
    }

    /// Reset to the configured seed (superframe segment 1).
    pub fn reset(&mut self) {
        self.state = if self.seed == 0 { 1 } else { self.seed };
    }

    /// Produce the next keystream bit.
    pub fn next_bit(&mut self) -> u8 {
        let out = ((self.state >> 14) & 1) as u8;
        let feedback = ((self.state >> 14) ^ self.state) & 1;
        self.state = ((self.state << 1) | feedback) & 0x7FFF;
        out
    }

    /// Advance `n` bits without producing keystream (muted audio still
    /// consumes key position).
    pub fn advance(&mut self, n: u32) {
        for _ in 0..n {
            let _ = self.next_bit();
        }
    }

    /// Advance whole pseudo-frames.
    pub fn advance_frames(&mut self, frames: u32) {
        self.advance(frames * PSEUDO_FRAME_BITS);
    }

    /// Half-frame advance for a FACCH steal.
    pub fn advance_half_frame(&mut self) {
        self.advance(PSEUDO_FRAME_BITS / 2);
    }

    /// XOR-descramble bits in place.
    pub fn descramble(&mut self, bits: &mut [u8]) {
        for b in bits {
            *b ^= self.next_bit();
        }
    }
}
