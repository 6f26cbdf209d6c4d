// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lock-free SPSC handoff between the ingest worker and the decode worker.
//!
//! The ingest side (demodulator or network reader) pushes sliced dibits;
//! the decode side pulls them through the [`DibitSource`] trait. Overflow
//! drops the newest symbols and counts them - the decode worker resyncs
//! anyway, and blocking the producer would back the demodulator up.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::bits::Dibit;
use crate::error::{DecodeError, DecodeResult};

use super::DibitSource;

struct Shared {
    queue: ArrayQueue<Dibit>,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// SPSC dibit ring. Construct once, split into producer and consumer.
pub struct DibitRing;

impl DibitRing {
    /// Create a ring with the default capacity and split it.
    #[must_use]
    pub fn new() -> (RingProducer, RingConsumer) {
        Self::with_capacity(crate::config::DIBIT_RING_CAPACITY)
    }

    /// Create a ring of the given capacity and split it.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (RingProducer, RingConsumer) {
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        });
        (
            RingProducer {
                shared: shared.clone(),
            },
            RingConsumer {
                shared,
                lookahead: std::collections::VecDeque::new(),
            },
        )
    }
}

/// Ingest-side handle.
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Push one dibit; never blocks. A full ring drops the symbol.
    pub fn push(&self, dibit: Dibit) {
        if self.shared.queue.push(dibit).is_err() {
            let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % 4800 == 1 {
                log::warn!("[dibit] ring overflow, {dropped} symbols dropped so far");
            }
        }
    }

    /// Signal EOF/shutdown to the consumer.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

/// Decode-side handle; implements [`DibitSource`].
pub struct RingConsumer {
    shared: Arc<Shared>,
    lookahead: std::collections::VecDeque<Dibit>,
}

impl DibitSource for RingConsumer {
    fn next_dibit(&mut self) -> DecodeResult<Dibit> {
        if let Some(d) = self.lookahead.pop_front() {
            return Ok(d);
        }
        loop {
            if let Some(d) = self.shared.queue.pop() {
                return Ok(d);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // Drain race: one more look after observing close.
                return match self.shared.queue.pop() {
                    Some(d) => Ok(d),
                    None => Err(DecodeError::EndOfStream),
                };
            }
            std::thread::yield_now();
        }
    }

    fn peek_n(&mut self, buf: &mut [Dibit]) -> usize {
        while self.lookahead.len() < buf.len() {
            match self.shared.queue.pop() {
                Some(d) => self.lookahead.push_back(d),
                None => break,
            }
        }
        let n = buf.len().min(self.lookahead.len());
        for (slot, d) in buf.iter_mut().zip(self.lookahead.iter()) {
            *slot = *d;
        }
        n
    }

    fn is_restartable(&self) -> bool {
        false
    }
}
