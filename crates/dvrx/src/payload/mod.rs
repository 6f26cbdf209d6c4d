// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Embedded-payload decoding.
//!
//! Data PDUs reassembled by the protocol handlers land here: IPv4/UDP
//! tunnels are walked and dispatched by well-known port, LRRP location
//! reports, TMS text and talker aliases are decoded, and the results are
//! surfaced as [`PayloadEvent`]s for the event log and the artefact
//! writers.

pub mod alias;
pub mod ip;
pub mod lrrp;
pub mod nmea;
pub mod sacch;
pub mod tms;

pub use alias::{AribAlias, ProprietaryAlias};
pub use lrrp::LrrpReport;
pub use sacch::SacchSuperframe;
pub use tms::TmsMessage;

use ip::{PortService, PROTO_ICMP, PROTO_UDP};

/// A decoded embedded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadEvent {
    Location(LrrpReport),
    NmeaLocation(nmea::NmeaPosition),
    Text(TmsMessage),
    Alias(String),
    /// Registration/ARS presence notification.
    Presence { device: String },
    /// Service recognized but payload not decoded (XCMP, telemetry...).
    Opaque { service: PortService, len: usize },
}

/// Stateful payload decoder, one per receiver.
#[derive(Debug, Default)]
pub struct PayloadDecoder {
    /// Per-slot proprietary alias assemblers.
    pub proprietary_alias: [ProprietaryAlias; 2],
    /// Per-slot ARIB alias assemblers.
    pub arib_alias: [AribAlias; 2],
    /// Per-slot NXDN SACCH superframe assemblers.
    pub sacch: [SacchSuperframe; 2],
    verbose: bool,
}

impl PayloadDecoder {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Clear per-call assembly state (call teardown).
    pub fn reset_call(&mut self, slot: u8) {
        let s = usize::from(slot & 1);
        self.proprietary_alias[s].reset();
        self.arib_alias[s].reset_segments();
        self.sacch[s].reset();
    }

    /// Entry point for an assembled data PDU that may carry an IP tunnel.
    /// Returns every event the datagram produced.
    pub fn handle_ip(&mut self, data: &[u8]) -> Vec<PayloadEvent> {
        let mut events = Vec::new();
        self.walk_ip(data, 0, &mut events);
        events
    }

    fn walk_ip(&mut self, data: &[u8], depth: u8, events: &mut Vec<PayloadEvent>) {
        let Ok(pkt) = ip::parse_ipv4(data) else {
            return;
        };
        if self.verbose {
            log::debug!(
                "[payload] IPv4 {} -> {} proto {:#04X} len {}",
                pkt.src,
                pkt.dst,
                pkt.protocol,
                pkt.payload.len()
            );
        }
        match pkt.protocol {
            PROTO_UDP => {
                if let Ok(dgram) = ip::parse_udp(pkt.payload) {
                    self.dispatch_udp(dgram.src_port, dgram.dst_port, dgram.payload, events);
                }
            }
            PROTO_ICMP if depth == 0 => {
                // ICMP errors quote the offending datagram; recurse once.
                if let Some(quote) = ip::icmp_quoted_ipv4(pkt.payload) {
                    self.walk_ip(quote, 1, events);
                }
            }
            _ => {}
        }
    }

    fn dispatch_udp(
        &mut self,
        src_port: u16,
        dst_port: u16,
        payload: &[u8],
        events: &mut Vec<PayloadEvent>,
    ) {
        // The radio tunnels use symmetric port pairs; anything else is
        // not ours to interpret.
        if src_port != dst_port {
            return;
        }
        let Some(service) = ip::classify_port(dst_port) else {
            return;
        };
        match service {
            PortService::Lrrp | PortService::EtsiLip => {
                if let Some(report) = lrrp::decode(payload) {
                    events.push(PayloadEvent::Location(report));
                }
            }
            PortService::P25Locn => {
                // LOCN payloads are NMEA text; some radios tunnel LRRP
                // tokens on the same port, so both are tried.
                if let Some(pos) = nmea::find_position(payload) {
                    events.push(PayloadEvent::NmeaLocation(pos));
                } else if let Some(report) = lrrp::decode(payload) {
                    events.push(PayloadEvent::Location(report));
                }
            }
            PortService::TmsMotorola | PortService::VtxTms | PortService::EtsiTms => {
                if let Ok(msg) = tms::decode(payload) {
                    events.push(PayloadEvent::Text(msg));
                }
            }
            PortService::Ars => {
                // ARS registration: device id is the printable tail.
                let device: String = payload
                    .iter()
                    .filter(|b| b.is_ascii_graphic())
                    .map(|&b| b as char)
                    .collect();
                events.push(PayloadEvent::Presence { device });
            }
            _ => {
                events.push(PayloadEvent::Opaque {
                    service,
                    len: payload.len(),
                });
            }
        }
    }
}
