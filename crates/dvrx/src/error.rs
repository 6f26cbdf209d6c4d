// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver error taxonomy.
//!
//! Every recoverable failure is handled as close to its origin as possible;
//! only [`DecodeError::Fatal`] escapes the decode worker. The variants map
//! 1:1 to the observable error classes surfaced on the status line.

/// Result alias for frame/PDU level operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Top-level error taxonomy for the decode path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    // ========================================================================
    // Bit-level errors
    // ========================================================================
    /// FEC failure on a PDU after both soft and hard decode attempts.
    BitError {
        /// Subsystem that produced the failure (e.g. "p25p1/tsbk").
        stage: &'static str,
    },
    /// Insufficient bytes/dibits for a header; parser aborted with no
    /// partial state left behind.
    ShortFrame {
        needed: usize,
        available: usize,
    },
    /// Field value outside its specified range (e.g. IHL < 5, LRRP year
    /// outside 2000..=2037).
    InvalidRange {
        field: &'static str,
        value: u32,
    },

    // ========================================================================
    // Stream-level errors
    // ========================================================================
    /// Sync detector failed post-sync confirmation; scanning resumes.
    SyncLost,
    /// End of a finite dibit source.
    EndOfStream,

    // ========================================================================
    // Control-level errors
    // ========================================================================
    /// Grant refused by the trunking gate rules (policy, trust, backoff).
    PolicyBlocked {
        reason: &'static str,
    },
    /// Tuner/audio/socket hook failed; the SM returns to the control channel.
    TransportError(String),

    // ========================================================================
    // Unrecoverable
    // ========================================================================
    /// Out-of-memory or unrecoverable I/O; sets `shutdown_requested`.
    Fatal(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BitError { stage } => write!(f, "FEC failure in {stage}"),
            Self::ShortFrame { needed, available } => {
                write!(f, "short frame: need {needed} bytes, have {available}")
            }
            Self::InvalidRange { field, value } => {
                write!(f, "field {field} out of range: {value}")
            }
            Self::SyncLost => write!(f, "sync confirmation failed"),
            Self::EndOfStream => write!(f, "end of dibit stream"),
            Self::PolicyBlocked { reason } => write!(f, "grant blocked: {reason}"),
            Self::TransportError(msg) => write!(f, "transport error: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// Status-line class key used for per-class 1 Hz deduplication.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::BitError { .. } => "bit",
            Self::ShortFrame { .. } => "short",
            Self::InvalidRange { .. } => "range",
            Self::SyncLost => "sync",
            Self::EndOfStream => "eof",
            Self::PolicyBlocked { .. } => "policy",
            Self::TransportError(_) => "transport",
            Self::Fatal(_) => "fatal",
        }
    }

    /// True when the error must terminate the decode worker.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Parse error for byte-bounded PDU field extraction.
///
/// Parsers return these without mutating any receiver state other than
/// their own cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    TruncatedData,
    InvalidFormat,
    BadChecksum,
    OutOfRange,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedData => write!(f, "truncated data"),
            Self::InvalidFormat => write!(f, "invalid format"),
            Self::BadChecksum => write!(f, "bad checksum"),
            Self::OutOfRange => write!(f, "value out of range"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for DecodeError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::TruncatedData => DecodeError::ShortFrame {
                needed: 0,
                available: 0,
            },
            ParseError::BadChecksum => DecodeError::BitError { stage: "pdu" },
            ParseError::InvalidFormat | ParseError::OutOfRange => DecodeError::InvalidRange {
                field: "pdu",
                value: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_class_keys_are_stable() {
        assert_eq!(DecodeError::SyncLost.class(), "sync");
        assert_eq!(
            DecodeError::PolicyBlocked { reason: "data" }.class(),
            "policy"
        );
        assert_eq!(DecodeError::Fatal("oom".into()).class(), "fatal");
    }

    #[test]
    fn test_only_fatal_is_fatal() {
        assert!(DecodeError::Fatal("io".into()).is_fatal());
        assert!(!DecodeError::SyncLost.is_fatal());
        assert!(!DecodeError::BitError { stage: "x" }.is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let e = DecodeError::ShortFrame {
            needed: 20,
            available: 7,
        };
        assert_eq!(e.to_string(), "short frame: need 20 bytes, have 7");
        assert_eq!(ParseError::BadChecksum.to_string(), "bad checksum");
    }
}
