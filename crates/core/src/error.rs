// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use crate::codec::DecodeError;

/// Everything that can end a driver run before the peer reaches `Done`.
///
/// Carries enough context to log or diagnose the failure; the driver never
/// retries (§7) — it surfaces the failure and the current [`crate::DState`]
/// so the caller can drain or reconnect.
#[derive(Debug)]
pub enum DriverFailure {
    /// The codec rejected input it was asked to decode.
    DecodeError(DecodeError),
    /// The channel closed while a response was still expected.
    UnexpectedEof,
    /// A codec or peer produced a transition the protocol descriptor does
    /// not declare. Always a fatal bug in the peer or codec, never a
    /// transient condition.
    ProtocolViolation { state: String, detail: String },
    /// A peer attempted to send or receive against the wrong agency. Caught
    /// at peer-construction time where possible (see [`crate::peer`]); this
    /// variant covers the runtime double-check the driver performs anyway.
    AgencyViolation { state: String, detail: String },
    /// The underlying channel reported an error.
    Channel(String),
    /// The host cancelled the driver.
    Cancelled,
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodeError(e) => write!(f, "decode error: {e}"),
            Self::UnexpectedEof => write!(f, "channel closed while awaiting expected input"),
            Self::ProtocolViolation { state, detail } => {
                write!(f, "protocol violation in state {state}: {detail}")
            }
            Self::AgencyViolation { state, detail } => {
                write!(f, "agency violation in state {state}: {detail}")
            }
            Self::Channel(detail) => write!(f, "channel error: {detail}"),
            Self::Cancelled => write!(f, "driver cancelled"),
        }
    }
}

impl std::error::Error for DriverFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DecodeError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::channel::ChannelError> for DriverFailure {
    fn from(e: crate::channel::ChannelError) -> Self {
        Self::Channel(e.0)
    }
}
