// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dibit trellis codecs for P25 TSBK/MPDU and DMR rate-3/4 bursts.
//!
//! Both codes are memory-1 finite state machines over the 4-level symbol
//! alphabet: the state is the previous input symbol and every transition
//! emits one 4-bit constellation word (two transmitted dibits).
//!
//! - 1/2 rate: dibit input, 4 states (P25 TSBK, MPDU headers).
//! - 3/4 rate: tribit input, 8 states (P25 MPDU data, DMR rate-3/4).
//!
//! The decoder runs a soft Viterbi where a mismatched dibit costs its
//! reliability weight; the hard-decision fallback is the same machinery
//! with saturated weights.

use crate::bits::Dibit;

/// Constellation words for the 1/2-rate trellis, indexed `[state][dibit]`.
const NEXT_WORDS_12: [[u8; 4]; 4] = [
    [0x2, 0xC, 0x1, 0xF],
    [0xE, 0x0, 0xD, 0x3],
    [0x9, 0x7, 0xA, 0x4],
    [0x5, 0xB, 0x6, 0x8],
];

/// Constellation words for the 3/4-rate trellis, indexed `[state][tribit]`.
const NEXT_WORDS_34: [[u8; 8]; 8] = [
    [0x0, 0x8, 0x4, 0xC, 0x2, 0xA, 0x6, 0xE],
    [0x4, 0xC, 0x2, 0xA, 0x6, 0xE, 0x0, 0x8],
    [0x1, 0x9, 0x5, 0xD, 0x3, 0xB, 0x7, 0xF],
    [0x5, 0xD, 0x3, 0xB, 0x7, 0xF, 0x1, 0x9],
    [0x3, 0xB, 0x7, 0xF, 0x1, 0x9, 0x5, 0xD],
    [0x7, 0xF, 0x1, 0x9, 0x5, 0xD, 0x3, 0xB],
    [0x2, 0xA, 0x6, 0xE, 0x0, 0x8, 0x4, 0xC],
    [0x6, 0xE, 0x2, 0xA, 0x0, 0x8, 0x4, 0xC],
];

/// Weighted bit-distance between a received dibit and an expected 2-bit
/// value. A full mismatch on both bits costs twice the reliability.
#[inline]
fn dibit_cost(received: Dibit, expected: u8) -> u32 {
    let diff = (received.bits() ^ expected).count_ones();
    diff * u32::from(received.reliability)
}

fn word_cost(pair: &[Dibit], expected_word: u8) -> u32 {
    dibit_cost(pair[0], (expected_word >> 2) & 0x3) + dibit_cost(pair[1], expected_word & 0x3)
}

fn encode_words<const I: usize>(table: &[[u8; I]], symbols: &[u8]) -> Vec<u8> {
    let mut state = 0usize;
    let mut out = Vec::with_capacity(symbols.len() * 2);
    for &sym in symbols {
        let word = table[state][sym as usize];
        out.push((word >> 2) & 0x3);
        out.push(word & 0x3);
        state = sym as usize;
    }
    out
}

fn decode_words<const I: usize>(table: &[[u8; I]], received: &[Dibit]) -> (Vec<u8>, u32) {
    let n_states = table.len();
    let steps = received.len() / 2;
    const INF: u32 = u32::MAX / 2;

    let mut metric = vec![INF; n_states];
    metric[0] = 0;
    let mut prev = vec![0u8; steps * n_states];

    for step in 0..steps {
        let pair = &received[2 * step..2 * step + 2];
        let mut next = vec![INF; n_states];
        for (state, &m) in metric.iter().enumerate() {
            if m >= INF {
                continue;
            }
            for (sym, &word) in table[state].iter().enumerate() {
                let cost = m + word_cost(pair, word);
                // Next state is the input symbol itself (memory-1 FSM).
                if cost < next[sym] {
                    next[sym] = cost;
                    prev[step * n_states + sym] = state as u8;
                }
            }
        }
        metric = next;
    }

    // Traceback from the minimum-metric end state; the flush symbol pins
    // well-formed frames to state 0.
    let mut state = 0usize;
    for s in 1..n_states {
        if metric[s] < metric[state] {
            state = s;
        }
    }
    let final_metric = metric[state];
    let mut symbols = vec![0u8; steps];
    for step in (0..steps).rev() {
        symbols[step] = state as u8;
        state = usize::from(prev[step * n_states + state]);
    }
    (symbols, final_metric)
}

/// Encode a dibit sequence (values 0..=3) at 1/2 rate. Callers append the
/// flush dibit themselves when the protocol requires one.
#[must_use]
pub fn encode_12(dibits: &[u8]) -> Vec<u8> {
    encode_words(&NEXT_WORDS_12, dibits)
}

/// Soft-decode a 1/2-rate dibit stream. Returns the decoded input dibits
/// (one per constellation word) and the surviving path metric.
#[must_use]
pub fn decode_12(received: &[Dibit]) -> (Vec<u8>, u32) {
    decode_words(&NEXT_WORDS_12, received)
}

/// Encode a tribit sequence (values 0..=7) at 3/4 rate.
#[must_use]
pub fn encode_34(tribits: &[u8]) -> Vec<u8> {
    encode_words(&NEXT_WORDS_34, tribits)
}

/// Soft-decode a 3/4-rate dibit stream into tribits.
#[must_use]
pub fn decode_34(received: &[Dibit]) -> (Vec<u8>, u32) {
    decode_words(&NEXT_WORDS_34, received)
}

/// Hard-decision fallback: decode with every dibit saturated to full
/// reliability. Used when the soft pass produced a CRC failure.
#[must_use]
pub fn decode_12_hard(dibit_values: &[u8]) -> (Vec<u8>, u32) {
    let hard: Vec<Dibit> = dibit_values.iter().map(|&d| Dibit::from_bits(d)).collect();
    decode_12(&hard)
}
