// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Artefact writers: the LRRP position log and the event log.
//!
//! Formats are line-oriented and append-only so partial runs remain
//! usable. LRRP lines are tab-separated:
//! `date<TAB>time<TAB>source<TAB>lat<TAB>lon<TAB>kmh<TAB>track`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::event::EventRecord;
use crate::payload::lrrp::LrrpReport;

/// Tab-separated LRRP position log.
pub struct LrrpLogWriter {
    out: BufWriter<File>,
}

impl LrrpLogWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Append one position report. Reports without a position are
    /// skipped; date/time fall back to dashes when the report carries no
    /// timestamp.
    pub fn append(&mut self, source: u32, report: &LrrpReport) -> std::io::Result<()> {
        let (Some(lat), Some(lon)) = (report.lat_deg, report.lon_deg) else {
            return Ok(());
        };
        let (date, time) = match report.timestamp {
            Some(ts) => (
                format!("{:04}-{:02}-{:02}", ts.year, ts.month, ts.day),
                format!("{:02}:{:02}:{:02}", ts.hour, ts.minute, ts.second),
            ),
            None => ("--".to_string(), "--".to_string()),
        };
        let kmh = report
            .speed_kmh()
            .map_or("--".to_string(), |v| format!("{v:.1}"));
        let track = report
            .heading_deg
            .map_or("--".to_string(), |v| v.to_string());
        writeln!(
            self.out,
            "{date}\t{time}\t{source}\t{lat:.6}\t{lon:.6}\t{kmh}\t{track}"
        )?;
        self.out.flush()
    }
}

/// Timestamped textual event log.
pub struct EventLogWriter {
    out: BufWriter<File>,
}

impl EventLogWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, slot: u8, record: &EventRecord) -> std::io::Result<()> {
        write!(
            self.out,
            "{:10.3} S{} {:>8} > {:>8} {}",
            record.timestamp, slot, record.source, record.target, record.text
        )?;
        if let Some(alias) = &record.alias {
            write!(self.out, " [{alias}]")?;
        }
        if let Some((lat, lon)) = record.gps {
            write!(self.out, " ({lat:.5}, {lon:.5})")?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}
