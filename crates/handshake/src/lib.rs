// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handshake mini-protocol: a three-state instance of the typed
//! session-protocol kernel (`tproto_core`) that negotiates a shared
//! version and per-version parameters before a connection carries any
//! application traffic (§4.6).
//!
//! `versionParams` is opaque to this crate; callers plug in a concrete
//! parameter type `T: VersionData`, a [`VersionDataCodec`] to frame it on
//! the wire, and a [`Negotiator`] to decide what both sides can agree on.

pub mod codec;
pub mod error;
pub mod messages;
pub mod peer;
pub mod state;
pub mod version;

pub use codec::{HandshakeCodec, RawParamsCodec, VersionDataCodec};
pub use error::HandshakeError;
pub use messages::{HandshakeMessage, HandshakeTag, RefuseReason};
pub use peer::{client_peer, server_peer};
pub use state::{HandshakeProtocol, HandshakeState};
pub use version::{
    highest_common_version, intersect_versions, EmptyVersionTable, HandshakeVersions, HandshakeVersionsBuilder,
    Negotiator, VersionData, VersionNumber,
};
