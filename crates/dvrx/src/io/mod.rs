// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! External interface seams: audio sinks, PCM network inputs, artefact
//! writers.
//!
//! The core never owns a sound card or a WAV encoder; decoded PCM goes
//! through the [`AudioSink`] vtable and the embedding application decides
//! where it lands. Everything here must be non-blocking or offload
//! internally.

pub mod net;
pub mod sink;

pub use net::{TcpPcmInput, UdpAudioBlaster, UdpPcmInput};
pub use sink::{EventLogWriter, LrrpLogWriter};

/// Decoded-audio consumer installed at startup.
pub trait AudioSink: Send {
    /// Digital voice PCM (8 kHz mono, S16LE; stereo interleaved for
    /// dual-slot DMR).
    fn blast(&mut self, pcm: &[i16]);

    /// Analog (FM) audio path.
    fn blast_analog(&mut self, _pcm: &[i16]) {}
}

/// Discards all audio (headless/logging runs).
#[derive(Debug, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn blast(&mut self, _pcm: &[i16]) {}
}

/// Records sample counts, for tests.
#[derive(Debug, Default)]
pub struct CountingAudioSink {
    pub digital_samples: usize,
    pub analog_samples: usize,
}

impl AudioSink for CountingAudioSink {
    fn blast(&mut self, pcm: &[i16]) {
        self.digital_samples += pcm.len();
    }

    fn blast_analog(&mut self, pcm: &[i16]) {
        self.analog_samples += pcm.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_sink() {
        let mut sink = CountingAudioSink::default();
        sink.blast(&[0i16; 160]);
        sink.blast_analog(&[0i16; 80]);
        assert_eq!(sink.digital_samples, 160);
        assert_eq!(sink.analog_samples, 80);
    }
}
