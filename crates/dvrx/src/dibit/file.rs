// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! File-backed dibit source.
//!
//! Capture format: one dibit per byte, low two bits significant, as
//! written by the symbol-capture sink. Reliability is synthesized at
//! maximum since slicer confidence is not recorded in captures.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::bits::Dibit;
use crate::error::{DecodeError, DecodeResult};

use super::DibitSource;

/// Restartable dibit source over a symbol capture file.
pub struct FileDibitSource {
    reader: Option<BufReader<File>>,
    path: std::path::PathBuf,
    /// Lookahead already pulled from the reader by `peek_n`.
    pending: std::collections::VecDeque<Dibit>,
}

impl FileDibitSource {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        log::debug!("[dibit] opened capture {}", path.display());
        Ok(Self {
            reader: Some(BufReader::new(file)),
            path: path.to_path_buf(),
            pending: std::collections::VecDeque::new(),
        })
    }

    fn read_one(&mut self) -> DecodeResult<Option<Dibit>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(Dibit::from_bits(byte[0] & 0x3))),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => self.read_one(),
            Err(e) => Err(DecodeError::Fatal(format!(
                "capture read failed ({}): {e}",
                self.path.display()
            ))),
        }
    }
}

impl DibitSource for FileDibitSource {
    fn next_dibit(&mut self) -> DecodeResult<Dibit> {
        if let Some(d) = self.pending.pop_front() {
            return Ok(d);
        }
        match self.read_one()? {
            Some(d) => Ok(d),
            None => Err(DecodeError::EndOfStream),
        }
    }

    fn peek_n(&mut self, buf: &mut [Dibit]) -> usize {
        while self.pending.len() < buf.len() {
            match self.read_one() {
                Ok(Some(d)) => self.pending.push_back(d),
                _ => break,
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, d) in buf.iter_mut().zip(self.pending.iter()) {
            *slot = *d;
        }
        n
    }

    fn is_restartable(&self) -> bool {
        true
    }

    fn restart(&mut self) {
        self.pending.clear();
        if let Some(reader) = self.reader.as_mut() {
            if let Err(e) = reader.seek(SeekFrom::Start(0)) {
                log::warn!("[dibit] rewind failed: {e}");
            }
        }
    }

    fn close(&mut self) {
        self.pending.clear();
        self.reader = None;
    }
}
