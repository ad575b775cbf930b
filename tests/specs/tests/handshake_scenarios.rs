// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The six handshake scenarios (§8: S1-S6).

use bytes::{BufMut, Bytes, BytesMut};
use tproto_core::peer::AgencyViolation;
use tproto_core::{run_peer, Channel, DState, DriverFailure, DuplexChannel, Peer, PeerBuilder, Role};
use tproto_handshake::{
    HandshakeCodec, HandshakeError, HandshakeMessage, HandshakeProtocol, HandshakeState, Negotiator, RawParamsCodec,
    RefuseReason,
};
use tproto_specs::support::{
    min_negotiator, never_negotiator, run_pair, run_pair_with_server_program, run_simultaneous_open, versions, Params,
};

type HandshakeOutcome = Result<(u64, Params), HandshakeError>;

/// Mirrors `tproto_handshake::peer`'s own `assume_legal`: every call site
/// below targets a state this test file chose, so the `Err` arm is
/// unreachable in practice, but degrading into it is still cheaper than an
/// `.expect()` that could panic a test in a confusing place.
fn assume_legal(
    built: Result<Peer<HandshakeProtocol<Params>, HandshakeOutcome>, AgencyViolation>,
) -> Peer<HandshakeProtocol<Params>, HandshakeOutcome> {
    built.unwrap_or_else(|e| {
        Peer::Done(Err(HandshakeError::Driver(DriverFailure::AgencyViolation { state: e.state, detail: e.detail })))
    })
}

/// S1-S3 share one shape: a client table/negotiator against a server
/// table/negotiator, checked against both sides' outcomes. S4 needs a
/// hand-written adversarial server program, S5 needs two simultaneous
/// clients instead of a client/server pair, and S6 drives malformed wire
/// bytes directly — none of the three share S1-S3's parameter shape, so
/// they stay as their own `#[tokio::test]` functions below rather than
/// being forced into the table.
#[yare::parameterized(
    s1_accept_highest_common = {
        &[(1, 10), (2, 20), (3, 30)],
        &[(2, 15), (3, 25), (4, 40)],
        min_negotiator(),
        min_negotiator(),
        |client: HandshakeOutcome, server: HandshakeOutcome| {
            assert_eq!(client.unwrap(), (3, Params(25)));
            assert_eq!(server.unwrap(), (3, Params(25)));
        }
    },
    s2_version_mismatch = {
        &[(1, 10), (2, 20)],
        &[(3, 30), (4, 40)],
        min_negotiator(),
        min_negotiator(),
        |client: HandshakeOutcome, server: HandshakeOutcome| {
            let expected = HandshakeError::Refused(RefuseReason::VersionMismatch {
                server_known: vec![3, 4],
                client_raw_tags: vec![1, 2],
            });
            assert_eq!(client.unwrap_err().to_string(), expected.to_string());
            assert_eq!(server.unwrap_err().to_string(), expected.to_string());
        }
    },
    s3_refused = {
        &[(1, 10)],
        &[(1, 10)],
        min_negotiator(),
        never_negotiator(),
        |client: HandshakeOutcome, _server: HandshakeOutcome| {
            match client.unwrap_err() {
                HandshakeError::Refused(RefuseReason::Refused { version, .. }) => assert_eq!(version, 1),
                other => panic!("expected Refused, got {other:?}"),
            }
        }
    },
)]
fn handshake_scenario(
    client_raw: &[(u64, i64)],
    server_raw: &[(u64, i64)],
    client_negotiator: Negotiator<Params>,
    server_negotiator: Negotiator<Params>,
    expect: impl FnOnce(HandshakeOutcome, HandshakeOutcome),
) {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("current-thread runtime");
    let (client, server) =
        rt.block_on(run_pair(versions(client_raw), client_negotiator, versions(server_raw), server_negotiator));
    expect(client, server);
}

/// S4: an adversarial server accepts a version the client never proposed;
/// the client must reject it locally without sending anything further.
#[tokio::test]
async fn s4_invalid_server_selection() {
    let client_versions = versions(&[(1, 10), (2, 20)]);

    let (client, _server) = run_pair_with_server_program(client_versions, min_negotiator(), adversarial_server).await;

    match client.unwrap_err() {
        HandshakeError::InvalidServerSelection { version, detail } => {
            assert_eq!(version, 99);
            assert_eq!(detail, "not in proposal");
        }
        other => panic!("expected InvalidServerSelection, got {other:?}"),
    }
}

/// Accepts version 99, which no client in this file ever proposes.
fn adversarial_server(builder: PeerBuilder<HandshakeProtocol<Params>>) -> Peer<HandshakeProtocol<Params>, HandshakeOutcome> {
    let reply_builder = builder.clone();
    assume_legal(builder.await_msg(HandshakeState::Propose, move |_message| {
        let done = assume_legal(reply_builder.done(HandshakeState::Done, Ok((99, Params(0)))));
        assume_legal(reply_builder.yield_msg(
            HandshakeState::Confirm,
            HandshakeMessage::AcceptVersion(99, Params(0)),
            done,
        ))
    }))
}

/// S5: both sides run as the initiating client at once; each decodes the
/// other's proposal as `ProposeVersionsPrime` and resolves it the same way.
#[tokio::test]
async fn s5_simultaneous_open() {
    let a_versions = versions(&[(1, 10), (2, 20), (3, 30)]);
    let b_versions = versions(&[(1, 10), (2, 20), (3, 30)]);

    let (a, b) = run_simultaneous_open(a_versions, min_negotiator(), b_versions, min_negotiator()).await;

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a, b);
    assert_eq!(a, (3, Params(30)));
}

/// S6: a version table that is not strictly ascending on the wire is a
/// decode failure surfaced by the driver, never a successful-but-wrong
/// decode (the handshake crate's own codec tests cover this at the unit
/// level; this confirms the driver wiring surfaces it the same way).
#[tokio::test]
async fn s6_sorted_map_decode_rejection() {
    let codec: HandshakeCodec<Params, RawParamsCodec> = HandshakeCodec::new(RawParamsCodec);
    let (sender, receiver) = DuplexChannel::pair(4096);

    let mut bytes = BytesMut::new();
    bytes.put_u8(0); // tag: ProposeVersions
    bytes.put_u16(2); // two entries
    bytes.put_u64(5);
    bytes.put_u32(0);
    bytes.put_u64(3); // out of order
    bytes.put_u32(0);
    sender.send(Bytes::from(bytes)).await.unwrap();
    sender.close().await;

    let descriptor = HandshakeProtocol::<Params>::new();
    let builder = PeerBuilder::new(std::sync::Arc::new(HandshakeProtocol::<Params>::new()), Role::Server);
    let peer: Peer<HandshakeProtocol<Params>, HandshakeOutcome> = assume_legal(
        builder.await_msg(HandshakeState::Propose, |_message| unreachable!("malformed input never decodes")),
    );

    let result = run_peer(&descriptor, &receiver, &codec, HandshakeState::Propose, peer, DState::new()).await;
    assert!(matches!(result, Err(DriverFailure::DecodeError(_))));
}
