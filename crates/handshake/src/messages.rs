// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handshake wire messages and the reasons a peer may refuse (§4.6, §6).

use std::fmt;

use crate::version::{HandshakeVersions, VersionNumber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeTag {
    ProposeVersions,
    ProposeVersionsPrime,
    AcceptVersion,
    Refuse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeMessage<T> {
    /// `StPropose → StConfirm`.
    ProposeVersions(HandshakeVersions<T>),
    /// `StConfirm → StDone`. Never constructed by a peer directly; the
    /// codec produces it when it decodes tag 0 while in `StConfirm`
    /// (simultaneous open, §4.6.1).
    ProposeVersionsPrime(HandshakeVersions<T>),
    /// `StConfirm → StDone`.
    AcceptVersion(VersionNumber, T),
    /// `StConfirm → StDone`.
    Refuse(RefuseReason),
}

/// Why a server (or a simultaneous-open peer, locally) refused a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefuseReason {
    VersionMismatch { server_known: Vec<VersionNumber>, client_raw_tags: Vec<i64> },
    HandshakeDecodeError { version: VersionNumber, text: String },
    Refused { version: VersionNumber, text: String },
}

impl fmt::Display for RefuseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionMismatch { server_known, client_raw_tags } => write!(
                f,
                "no common version: server knows {server_known:?}, client proposed tags {client_raw_tags:?}"
            ),
            Self::HandshakeDecodeError { version, text } => {
                write!(f, "could not decode version {version} parameters: {text}")
            }
            Self::Refused { version, text } => write!(f, "version {version} refused: {text}"),
        }
    }
}
