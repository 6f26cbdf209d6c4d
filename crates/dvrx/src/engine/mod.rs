// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The decode worker.
//!
//! One ingest worker pushes dibits into the SPSC ring; this worker pulls
//! them, drives sync detection, frame dispatch and the trunk SM, and
//! publishes UI snapshots. UI mutations (options, keys, force-release)
//! arrive as commands on a channel and are applied between frames, so the
//! SM's functions are only ever entered from this thread.
//!
//! Cancellation is cooperative: `shutdown_requested` is polled at
//! sync-search boundaries and on every tick; on observation the source is
//! closed and the tuner is returned to the control channel.

mod snapshot;
mod status;

pub use snapshot::{RxSnapshot, SnapshotPublisher};
pub use status::StatusLine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::config::RxOptions;
use crate::dibit::DibitSource;
use crate::error::DecodeError;
use crate::event::EventLog;
use crate::frame::call::CallTracker;
use crate::frame::{Dispatcher, FrameContext, FrameOutcome};
use crate::keys::{KeyMaterial, KeyRegistry, KeyScope};
use crate::payload::PayloadDecoder;
use crate::sync::SyncDetector;
use crate::trunk::{ControlHooks, TrunkSm};

/// Dibits between housekeeping passes while out of sync (one symbol-rate
/// second at 4800 baud).
const TICK_INTERVAL_DIBITS: u64 = 4800;

/// UI -> decode worker commands, drained between frames.
pub enum Command {
    SetOptions(RxOptions),
    AddKey { scope: KeyScope, material: KeyMaterial },
    RemoveKey { scope: KeyScope },
    ForceRelease,
    Shutdown,
}

/// Handles shared with the embedding application / UI thread.
pub struct EngineHandles {
    pub commands: Sender<Command>,
    pub snapshots: Arc<SnapshotPublisher>,
    pub events: Arc<EventLog>,
    pub shutdown: Arc<AtomicBool>,
}

/// The decode engine: owns every per-run decoder structure.
pub struct DecodeEngine {
    opts: RxOptions,
    detector: SyncDetector,
    dispatcher: Dispatcher,
    sm: TrunkSm,
    hooks: Box<dyn ControlHooks>,
    payloads: PayloadDecoder,
    calls: CallTracker,
    keys: Arc<KeyRegistry>,
    events: Arc<EventLog>,
    snapshots: Arc<SnapshotPublisher>,
    status: StatusLine,
    shutdown: Arc<AtomicBool>,
    commands: Receiver<Command>,
    command_tx: Sender<Command>,
    started: Instant,
    frames_decoded: u64,
    sync_losses: u64,
}

impl DecodeEngine {
    #[must_use]
    pub fn new(opts: RxOptions, hooks: Box<dyn ControlHooks>) -> Self {
        let (command_tx, commands) = unbounded();
        Self {
            sm: TrunkSm::new(opts.clone()),
            payloads: PayloadDecoder::new(opts.payload_verbose),
            calls: CallTracker::new(),
            detector: SyncDetector::new(),
            dispatcher: Dispatcher::new(),
            hooks,
            keys: Arc::new(KeyRegistry::new()),
            events: Arc::new(EventLog::new()),
            snapshots: Arc::new(SnapshotPublisher::new()),
            status: StatusLine::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            commands,
            command_tx,
            started: Instant::now(),
            frames_decoded: 0,
            sync_losses: 0,
            opts,
        }
    }

    /// Handles for the UI thread. Call before moving the engine into its
    /// worker thread.
    #[must_use]
    pub fn handles(&self) -> EngineHandles {
        EngineHandles {
            commands: self.command_tx.clone(),
            snapshots: self.snapshots.clone(),
            events: self.events.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    #[must_use]
    pub fn keys(&self) -> Arc<KeyRegistry> {
        self.keys.clone()
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(Command::SetOptions(opts)) => {
                    self.opts = opts.clone();
                    self.sm = TrunkSm::new(opts);
                    log::info!("[engine] options replaced, trunk SM reset");
                }
                Ok(Command::AddKey { scope, material }) => {
                    self.keys.insert(scope, material);
                }
                Ok(Command::RemoveKey { scope }) => {
                    self.keys.remove(&scope);
                }
                Ok(Command::ForceRelease) => {
                    self.sm.set_force_release(true);
                }
                Ok(Command::Shutdown) => {
                    self.shutdown.store(true, Ordering::Release);
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn publish_snapshot(&mut self, sync_tag: &str, status_line: String) {
        let now = self.now();
        self.snapshots.publish(RxSnapshot {
            sync_tag: sync_tag.to_string(),
            on_voice: self.sm.role() == crate::trunk::Role::TunedVoice,
            cc_freq_hz: self.sm.cc_freq_hz(),
            vc_freq_hz: [self.sm.vc_freq_hz(0), self.sm.vc_freq_hz(1)],
            calls: [self.calls.active(0).cloned(), self.calls.active(1).cloned()],
            frames_decoded: self.frames_decoded,
            sync_losses: self.sync_losses,
            status_line,
            published_at: now,
        });
    }

    /// Run the decode loop until EOF, a fatal error, or shutdown.
    ///
    /// Returns the number of frames decoded.
    pub fn run(&mut self, source: &mut dyn DibitSource) -> u64 {
        let mut dibit_count = 0u64;
        let mut last_status = String::new();

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                log::info!("[engine] shutdown requested, draining");
                break;
            }

            let dibit = match source.next_dibit() {
                Ok(d) => d,
                Err(DecodeError::EndOfStream) => {
                    log::info!("[engine] end of dibit stream");
                    break;
                }
                Err(e) => {
                    log::warn!("[engine] source error: {e}");
                    break;
                }
            };
            dibit_count += 1;

            if dibit_count % TICK_INTERVAL_DIBITS == 0 {
                self.drain_commands();
                let now = self.now();
                self.sm.tick(self.hooks.as_mut(), now);
                let tag = self
                    .detector
                    .current()
                    .map_or("", |s| s.kind.tag())
                    .to_string();
                self.publish_snapshot(&tag, last_status.clone());
            }

            let Some(sync) = self.detector.push(dibit) else {
                continue;
            };

            let now = self.now();
            let mut ctx = FrameContext {
                opts: &self.opts,
                sm: &mut self.sm,
                hooks: self.hooks.as_mut(),
                events: &self.events,
                payloads: &mut self.payloads,
                calls: &mut self.calls,
                now,
            };
            match self.dispatcher.dispatch(&mut ctx, sync, source) {
                Ok(FrameOutcome::Handled) => {
                    self.frames_decoded += 1;
                    self.detector.release();
                }
                Ok(FrameOutcome::ConfirmFailed) => {
                    self.sync_losses += 1;
                    self.detector.reject();
                    if let Some(line) = self.status.emit("sync", "sync confirmation failed", now)
                    {
                        last_status = line;
                    }
                }
                Err(DecodeError::EndOfStream) => break,
                Err(e) if e.is_fatal() => {
                    log::error!("[engine] fatal: {e}");
                    self.shutdown.store(true, Ordering::Release);
                }
                Err(e) => {
                    if let Some(line) = self.status.emit(e.class(), &e.to_string(), now) {
                        last_status = line;
                    }
                    self.detector.release();
                }
            }

            self.drain_commands();
            let now = self.now();
            self.sm.tick(self.hooks.as_mut(), now);
        }

        // Clean teardown: close the source, park the tuner on the CC.
        source.close();
        self.hooks.return_to_cc();
        self.publish_snapshot("", last_status);
        self.frames_decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dibit::VecDibitSource;
    use crate::sync::{sync_defs, SyncKind};
    use crate::trunk::NullHooks;

    fn pattern_of(kind: SyncKind) -> Vec<u8> {
        sync_defs()
            .iter()
            .find(|d| d.kind == kind)
            .unwrap()
            .dibits()
    }

    #[test]
    fn test_engine_stops_at_eof() {
        let mut engine = DecodeEngine::new(RxOptions::default(), Box::new(NullHooks));
        let mut source = VecDibitSource::from_values(&[0, 1, 2, 3, 0, 1, 2, 3]);
        assert_eq!(engine.run(&mut source), 0);
    }

    #[test]
    fn test_engine_decodes_m17_lsf_from_stream() {
        let mut engine = DecodeEngine::new(RxOptions::default(), Box::new(NullHooks));

        let mut stream = vec![0u8, 2, 0, 2]; // noise
        stream.extend(pattern_of(SyncKind::M17Lsf));
        let wire = crate::frame::m17::encode_lsf("N0CALL", "SP5WWP", 0, &[0u8; 14]);
        stream.extend(wire.chunks(2).map(|c| (c[0] << 1) | c[1]));

        let mut source = VecDibitSource::from_values(&stream);
        let frames = engine.run(&mut source);
        assert_eq!(frames, 1);
        let events = engine.events.snapshot(0);
        assert_eq!(events.len(), 1);
        assert!(events[0].text.contains("SP5WWP"));
    }

    #[test]
    fn test_shutdown_command_stops_loop() {
        let mut engine = DecodeEngine::new(RxOptions::default(), Box::new(NullHooks));
        let handles = engine.handles();
        handles.commands.send(Command::Shutdown).unwrap();
        // A long stream: without the shutdown the loop would consume it
        // all; the command is drained at the first housekeeping pass.
        let stream = vec![0u8; (TICK_INTERVAL_DIBITS * 3) as usize];
        let mut source = VecDibitSource::from_values(&stream);
        engine.run(&mut source);
        assert!(handles.shutdown.load(Ordering::Acquire));
    }

    #[test]
    fn test_snapshot_published_during_run() {
        let mut engine = DecodeEngine::new(RxOptions::default(), Box::new(NullHooks));
        let handles = engine.handles();
        let stream = vec![0u8; (TICK_INTERVAL_DIBITS + 10) as usize];
        let mut source = VecDibitSource::from_values(&stream);
        engine.run(&mut source);
        let snap = handles.snapshots.load();
        assert!(snap.published_at >= 0.0);
        assert_eq!(snap.frames_decoded, 0);
    }
}
