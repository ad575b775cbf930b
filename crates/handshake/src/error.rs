// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use tproto_core::DriverFailure;

use crate::messages::RefuseReason;
use crate::version::VersionNumber;

/// The handshake crate's caller-facing error (§7): wraps kernel-level
/// failures and adds the three handshake-specific outcomes.
#[derive(Debug)]
pub enum HandshakeError {
    /// A kernel-level failure (bad wire bytes, unexpected close, ...).
    Driver(DriverFailure),
    /// The peer sent `Refuse(reason)`.
    Refused(RefuseReason),
    /// The server accepted a version outside the client's proposal, or
    /// params the client's negotiator would not have produced.
    InvalidServerSelection { version: VersionNumber, detail: String },
    /// The client could not decode the parameters of the version the
    /// server accepted.
    NotRecognisedVersion(VersionNumber),
    /// Simultaneous open (§4.6.1): the connection is closed locally,
    /// without transmitting a reason, because no common version exists or
    /// the symmetric negotiation was rejected.
    LocalClose { detail: String },
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "{e}"),
            Self::Refused(reason) => write!(f, "handshake refused: {reason}"),
            Self::InvalidServerSelection { version, detail } => {
                write!(f, "invalid server selection of version {version}: {detail}")
            }
            Self::NotRecognisedVersion(version) => {
                write!(f, "version {version} accepted but its parameters could not be decoded")
            }
            Self::LocalClose { detail } => write!(f, "closing handshake locally: {detail}"),
        }
    }
}

impl std::error::Error for HandshakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DriverFailure> for HandshakeError {
    fn from(e: DriverFailure) -> Self {
        Self::Driver(e)
    }
}
