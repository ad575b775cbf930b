// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A concrete instantiation of the handshake over a toy parameter type: a
//! single signed integer, encoded as 8 big-endian bytes. Real callers plug
//! in their own application-specific `versionParams`; these scenario tests
//! only care about the negotiation and framing machinery around it.

use std::sync::Arc;

use bytes::Bytes;
use tproto_core::{run_peer, Channel, DState, DecodeError, DuplexChannel, PeerBuilder, Role};
use tproto_handshake::{
    client_peer, server_peer, EmptyVersionTable, HandshakeCodec, HandshakeError, HandshakeProtocol, HandshakeState,
    HandshakeVersions, Negotiator, VersionDataCodec, VersionNumber,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params(pub i64);

#[derive(Debug, Clone, Copy, Default)]
pub struct ParamsCodec;

impl VersionDataCodec<Params> for ParamsCodec {
    fn encode(&self, data: &Params) -> Bytes {
        Bytes::copy_from_slice(&data.0.to_be_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Params, DecodeError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| DecodeError(format!("expected 8 bytes of version params, got {}", bytes.len())))?;
        Ok(Params(i64::from_be_bytes(raw)))
    }
}

/// Always agrees, picking the smaller of the two parameter values —
/// trivially symmetric, which is what simultaneous-open resolution needs
/// (§4.6.1).
pub fn min_negotiator() -> Negotiator<Params> {
    Negotiator::new(|a: &Params, b: &Params| Some(Params(a.0.min(b.0))))
}

/// Never agrees; used to exercise the refusal paths.
pub fn never_negotiator() -> Negotiator<Params> {
    Negotiator::new(|_: &Params, _: &Params| None)
}

/// Build a version table from `pairs`, which callers must supply
/// non-empty — the only way this module's fixtures ever call it.
pub fn versions(pairs: &[(VersionNumber, i64)]) -> HandshakeVersions<Params> {
    let mut builder = HandshakeVersions::builder();
    for (version, value) in pairs {
        builder = builder.with(*version, Params(*value));
    }
    match builder.build() {
        Ok(table) => table,
        Err(EmptyVersionTable) => unreachable!("scenario fixtures always supply at least one version"),
    }
}

pub type Outcome = Result<(VersionNumber, Params), HandshakeError>;

/// Run a client and a server concurrently over an in-memory duplex pair,
/// each built from its own version table and negotiator, and return both
/// sides' outcomes.
pub async fn run_pair(
    client_versions: HandshakeVersions<Params>,
    client_negotiator: Negotiator<Params>,
    server_versions: HandshakeVersions<Params>,
    server_negotiator: Negotiator<Params>,
) -> (Outcome, Outcome) {
    let descriptor = Arc::new(HandshakeProtocol::<Params>::new());
    let codec = HandshakeCodec::new(ParamsCodec);
    let (client_channel, server_channel) = DuplexChannel::pair(4096);

    let client_builder = PeerBuilder::new(descriptor.clone(), Role::Client);
    let server_builder = PeerBuilder::new(descriptor.clone(), Role::Server);

    let client_program = client_peer(client_builder, client_versions, client_negotiator);
    let server_program = server_peer(server_builder, server_versions, server_negotiator);

    let client_fut = run_peer(
        &*descriptor,
        &client_channel,
        &codec,
        HandshakeState::Propose,
        client_program,
        DState::new(),
    );
    let server_fut = run_peer(
        &*descriptor,
        &server_channel,
        &codec,
        HandshakeState::Propose,
        server_program,
        DState::new(),
    );

    let (client_result, server_result) = tokio::join!(client_fut, server_fut);
    client_channel.close().await;
    server_channel.close().await;

    (
        client_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
        server_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
    )
}

/// Run two `client_peer` programs against each other over an in-memory
/// duplex pair: both hold client agency in `StPropose` and both expect a
/// reply in `StConfirm`, modeling simultaneous open (§4.6.1) rather than
/// the usual client/server pairing.
pub async fn run_simultaneous_open(
    a_versions: HandshakeVersions<Params>,
    a_negotiator: Negotiator<Params>,
    b_versions: HandshakeVersions<Params>,
    b_negotiator: Negotiator<Params>,
) -> (Outcome, Outcome) {
    let descriptor = Arc::new(HandshakeProtocol::<Params>::new());
    let codec = HandshakeCodec::new(ParamsCodec);
    let (a_channel, b_channel) = DuplexChannel::pair(4096);

    let a_builder = PeerBuilder::new(descriptor.clone(), Role::Client);
    let b_builder = PeerBuilder::new(descriptor.clone(), Role::Client);

    let a_program = client_peer(a_builder, a_versions, a_negotiator);
    let b_program = client_peer(b_builder, b_versions, b_negotiator);

    let a_fut = run_peer(&*descriptor, &a_channel, &codec, HandshakeState::Propose, a_program, DState::new());
    let b_fut = run_peer(&*descriptor, &b_channel, &codec, HandshakeState::Propose, b_program, DState::new());

    let (a_result, b_result) = tokio::join!(a_fut, b_fut);
    a_channel.close().await;
    b_channel.close().await;

    (
        a_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
        b_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
    )
}

/// Run a hand-written server peer program against a normal `client_peer`,
/// for adversarial scenarios (S4) that must not go through [`server_peer`].
pub async fn run_pair_with_server_program(
    client_versions: HandshakeVersions<Params>,
    client_negotiator: Negotiator<Params>,
    server_program: impl FnOnce(PeerBuilder<HandshakeProtocol<Params>>) -> tproto_core::Peer<HandshakeProtocol<Params>, Outcome>,
) -> (Outcome, Outcome) {
    let descriptor = Arc::new(HandshakeProtocol::<Params>::new());
    let codec = HandshakeCodec::new(ParamsCodec);
    let (client_channel, server_channel) = DuplexChannel::pair(4096);

    let client_builder = PeerBuilder::new(descriptor.clone(), Role::Client);
    let server_builder = PeerBuilder::new(descriptor.clone(), Role::Server);

    let client_program = client_peer(client_builder, client_versions, client_negotiator);
    let server_program = server_program(server_builder);

    let client_fut = run_peer(
        &*descriptor,
        &client_channel,
        &codec,
        HandshakeState::Propose,
        client_program,
        DState::new(),
    );
    let server_fut = run_peer(
        &*descriptor,
        &server_channel,
        &codec,
        HandshakeState::Propose,
        server_program,
        DState::new(),
    );

    let (client_result, server_result) = tokio::join!(client_fut, server_fut);
    client_channel.close().await;
    server_channel.close().await;

    (
        client_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
        server_result.map(|(value, _)| value).unwrap_or_else(|e| Err(e.into())),
    )
}
