// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network PCM inputs: UDP datagrams or a TCP stream of S16LE samples.
//!
//! Both inputs use bounded receive timeouts so the ingest worker can poll
//! the shutdown flag; a timeout surfaces as zero samples, never a stall.

use std::io::Read;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

/// Receive timeout bounding every network read.
const RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// UDP PCM input: one datagram carries whole S16LE samples.
pub struct UdpPcmInput {
    socket: UdpSocket,
    pub samplerate: u32,
    /// Residual samples from the last datagram.
    pending: std::collections::VecDeque<i16>,
}

impl UdpPcmInput {
    /// Bind and start receiving on `bind_addr`.
    pub fn start(bind_addr: SocketAddr, samplerate: u32) -> std::io::Result<Self> {
        let socket = Socket::new(
            Domain::for_address(bind_addr),
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        socket.set_reuse_address(true)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        socket.bind(&bind_addr.into())?;
        log::info!("[io] UDP PCM input on {bind_addr} @ {samplerate} Hz");
        Ok(Self {
            socket: socket.into(),
            samplerate,
            pending: std::collections::VecDeque::new(),
        })
    }

    /// Next sample, or `None` on timeout (caller polls shutdown and
    /// retries).
    pub fn read_sample(&mut self) -> std::io::Result<Option<i16>> {
        if let Some(s) = self.pending.pop_front() {
            return Ok(Some(s));
        }
        let mut buf = [0u8; 4096];
        match self.socket.recv(&mut buf) {
            Ok(n) => {
                for pair in buf[..n - n % 2].chunks_exact(2) {
                    self.pending.push_back(i16::from_le_bytes([pair[0], pair[1]]));
                }
                Ok(self.pending.pop_front())
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// UDP audio blaster: ships decoded PCM to a remote sink as S16LE
/// datagrams. Sends are fire-and-forget; a full socket buffer drops the
/// block rather than stall the decode worker.
pub struct UdpAudioBlaster {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpAudioBlaster {
    pub fn connect(target: SocketAddr) -> std::io::Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse().expect("literal addr")
        } else {
            "[::]:0".parse().expect("literal addr")
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        log::info!("[io] UDP audio blaster -> {target}");
        Ok(Self { socket, target })
    }

    fn send(&self, pcm: &[i16]) {
        let mut wire = Vec::with_capacity(pcm.len() * 2);
        for s in pcm {
            wire.extend_from_slice(&s.to_le_bytes());
        }
        if let Err(e) = self.socket.send_to(&wire, self.target) {
            if e.kind() != std::io::ErrorKind::WouldBlock {
                log::debug!("[io] audio blast failed: {e}");
            }
        }
    }
}

impl super::AudioSink for UdpAudioBlaster {
    fn blast(&mut self, pcm: &[i16]) {
        self.send(pcm);
    }

    fn blast_analog(&mut self, pcm: &[i16]) {
        self.send(pcm);
    }
}

/// TCP PCM input: a continuous S16LE stream.
pub struct TcpPcmInput {
    stream: TcpStream,
    pub samplerate: u32,
}

impl TcpPcmInput {
    /// Wrap a connected socket.
    pub fn open(stream: TcpStream, samplerate: u32) -> std::io::Result<Self> {
        stream.set_read_timeout(Some(RECV_TIMEOUT))?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, samplerate })
    }

    /// Connect to a sample server.
    pub fn connect(addr: SocketAddr, samplerate: u32) -> std::io::Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, RECV_TIMEOUT)?;
        log::info!("[io] TCP PCM input from {addr} @ {samplerate} Hz");
        Self::open(stream, samplerate)
    }

    /// Next sample, `None` on timeout, `Err` on a dead peer.
    pub fn read_sample(&mut self) -> std::io::Result<Option<i16>> {
        let mut buf = [0u8; 2];
        match self.stream.read_exact(&mut buf) {
            Ok(()) => Ok(Some(i16::from_le_bytes(buf))),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
