// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # DVRX - Software-defined digital voice receiver core
//!
//! A pure Rust decoder core for narrowband land-mobile digital radio:
//! P25 Phase 1/2, DMR (Tier II/III), NXDN, dPMR, D-STAR, YSF,
//! EDACS/ProVoice, X2-TDMA and M17, with trunk following and embedded
//! data payload decoding (LRRP, TMS, talker aliases, IP/UDP tunnels).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dvrx::config::RxOptions;
//! use dvrx::dibit::FileDibitSource;
//! use dvrx::engine::DecodeEngine;
//! use dvrx::trunk::NullHooks;
//!
//! fn main() -> std::io::Result<()> {
//!     let mut source = FileDibitSource::open(std::path::Path::new("capture.sym"))?;
//!     let mut engine = DecodeEngine::new(RxOptions::default(), Box::new(NullHooks));
//!     let handles = engine.handles(); // snapshots, events, commands
//!     let frames = engine.run(&mut source);
//!     println!("decoded {frames} frames, CC {}", handles.snapshots.load().cc_freq_hz);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |  [IQ/audio source] -> symbol slicer -> dibit ring                  |
//! +--------------------------------------------------------------------+
//! |  sync detector -> frame dispatcher -> FEC/CRC layer                |
//! |    -> control-PDU parsers -> trunk state machine -> tuner hooks    |
//! |    -> voice path -> external MBE codec -> audio sink               |
//! |    -> data path -> reassembly -> payload decoders -> event log     |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`engine::DecodeEngine`] | The decode worker: sync, dispatch, trunking |
//! | [`trunk::TrunkSm`] | Control-channel follower and retune arbiter |
//! | [`trunk::ControlHooks`] | Tuner vtable the SM drives |
//! | [`dibit::DibitSource`] | Symbol source abstraction (file, ring, live) |
//! | [`payload::PayloadDecoder`] | LRRP/TMS/alias/IP tunnel decoding |
//!
//! ## Threads
//!
//! One ingest worker feeds the SPSC [`dibit::DibitRing`]; one decode
//! worker runs [`engine::DecodeEngine::run`]; UI threads read
//! [`engine::SnapshotPublisher`] snapshots and enqueue
//! [`engine::Command`]s. The trunk SM is only ever entered from the
//! decode worker.

/// MSB-first bit-slice helpers and the dibit symbol type.
pub mod bits;
/// Runtime options and receiver-wide constants.
pub mod config;
/// Symbol sources: file capture, SPSC ring, in-memory.
pub mod dibit;
/// The decode worker, snapshots, status dedup and UI commands.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Per-slot event history with watchdog callbacks.
pub mod event;
/// FEC and CRC kernels (Viterbi, trellis, BCH, Golay, Hamming, BPTC).
pub mod fec;
/// Frame dispatch and the per-protocol handlers.
pub mod frame;
/// Audio sink seam, network PCM inputs, artefact writers.
pub mod io;
/// Key registry and scrambler LFSR bit accounting.
pub mod keys;
/// Embedded payload decoding (IP/UDP, LRRP, TMS, aliases, SACCH).
pub mod payload;
/// Frame sync patterns and the sliding-window detector.
pub mod sync;
/// Trunking: state machine, band plans, patches, CC candidates.
pub mod trunk;

pub use config::RxOptions;
pub use engine::{Command, DecodeEngine, EngineHandles, RxSnapshot};
pub use error::{DecodeError, DecodeResult, ParseError};
pub use sync::{SyncKind, SyncType};
pub use trunk::{ControlHooks, IdenEntry, NullHooks, Trust, TrunkSm};

/// DVRX version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
