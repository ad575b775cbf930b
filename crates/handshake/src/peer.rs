// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client and server peer programs for the handshake (§4.6, §4.6.1).

use tproto_core::peer::AgencyViolation;
use tproto_core::{DriverFailure, Peer, PeerBuilder, Role};
use tracing::trace;

use crate::error::HandshakeError;
use crate::messages::{HandshakeMessage, RefuseReason};
use crate::state::{HandshakeProtocol, HandshakeState};
use crate::version::{highest_common_version, HandshakeVersions, Negotiator, VersionData, VersionNumber};

type HandshakeOutcome<T> = Result<(VersionNumber, T), HandshakeError>;
type HandshakePeer<T> = Peer<HandshakeProtocol<T>, HandshakeOutcome<T>>;

/// Every `PeerBuilder` call in this module targets a state this module
/// itself chose, so `AgencyViolation` should never fire. Rather than
/// `.expect()` on that assumption, degrade it into a `Done` carrying the
/// failure — the outcome type is already a `Result`, so there is nowhere
/// better to put it.
fn assume_legal<T: VersionData>(built: Result<HandshakePeer<T>, AgencyViolation>) -> HandshakePeer<T> {
    match built {
        Ok(peer) => peer,
        Err(e) => Peer::Done(Err(HandshakeError::Driver(DriverFailure::AgencyViolation {
            state: e.state,
            detail: e.detail,
        }))),
    }
}

/// The client side: propose `versions`, then await the server's reply
/// (§4.6). `negotiator` is also needed on the client in case the server
/// opened at the same time (§4.6.1).
pub fn client_peer<T: VersionData>(
    builder: PeerBuilder<HandshakeProtocol<T>>,
    versions: HandshakeVersions<T>,
    negotiator: Negotiator<T>,
) -> HandshakePeer<T> {
    assert_eq!(builder.role(), Role::Client, "client_peer requires a client-role builder");
    let proposed = versions.clone();
    let reply_builder = builder.clone();
    let await_reply = assume_legal(builder.await_msg(HandshakeState::Confirm, move |message| {
        client_on_reply(&reply_builder, &proposed, &negotiator, message)
    }));
    assume_legal(builder.yield_msg(HandshakeState::Propose, HandshakeMessage::ProposeVersions(versions), await_reply))
}

fn client_on_reply<T: VersionData>(
    builder: &PeerBuilder<HandshakeProtocol<T>>,
    proposed: &HandshakeVersions<T>,
    negotiator: &Negotiator<T>,
    message: HandshakeMessage<T>,
) -> HandshakePeer<T> {
    let outcome = match message {
        HandshakeMessage::AcceptVersion(version, params) => validate_accept(proposed, negotiator, version, params),
        HandshakeMessage::Refuse(reason) => Err(HandshakeError::Refused(reason)),
        // The codec reinterprets an inbound tag-0 message as this variant
        // whenever it is decoded in `Confirm`: the server proposed at the
        // same time we did (§4.6.1).
        HandshakeMessage::ProposeVersionsPrime(theirs) => resolve_simultaneous_open(proposed, &theirs, negotiator),
        HandshakeMessage::ProposeVersions(_) => Err(HandshakeError::LocalClose {
            detail: "unexpected ProposeVersions while awaiting a reply".to_owned(),
        }),
    };
    assume_legal(builder.done(HandshakeState::Done, outcome))
}

fn validate_accept<T: VersionData>(
    proposed: &HandshakeVersions<T>,
    negotiator: &Negotiator<T>,
    version: VersionNumber,
    params: T,
) -> HandshakeOutcome<T> {
    let Some(mine) = proposed.get(version) else {
        return Err(HandshakeError::InvalidServerSelection { version, detail: "not in proposal".to_owned() });
    };
    match negotiator.negotiate(mine, &params) {
        Some(expected) if expected == params => Ok((version, params)),
        _ => Err(HandshakeError::InvalidServerSelection {
            version,
            detail: "accepted parameters are not reproducible by negotiating against the proposal".to_owned(),
        }),
    }
}

/// The server side: await a proposal, then accept, refuse, or (on a
/// simultaneous open) resolve symmetrically (§4.6, §4.6.1).
pub fn server_peer<T: VersionData>(
    builder: PeerBuilder<HandshakeProtocol<T>>,
    supported: HandshakeVersions<T>,
    negotiator: Negotiator<T>,
) -> HandshakePeer<T> {
    assert_eq!(builder.role(), Role::Server, "server_peer requires a server-role builder");
    let reply_builder = builder.clone();
    assume_legal(builder.await_msg(HandshakeState::Propose, move |message| {
        server_on_propose(&reply_builder, &supported, &negotiator, message)
    }))
}

fn server_on_propose<T: VersionData>(
    builder: &PeerBuilder<HandshakeProtocol<T>>,
    supported: &HandshakeVersions<T>,
    negotiator: &Negotiator<T>,
    message: HandshakeMessage<T>,
) -> HandshakePeer<T> {
    let HandshakeMessage::ProposeVersions(client_versions) = message else {
        return assume_legal(builder.done(
            HandshakeState::Done,
            Err(HandshakeError::LocalClose {
                detail: "expected ProposeVersions from the Propose state".to_owned(),
            }),
        ));
    };

    let Some(version) = highest_common_version(supported, &client_versions) else {
        return refuse(
            builder,
            RefuseReason::VersionMismatch {
                server_known: supported.versions().collect(),
                client_raw_tags: client_versions.versions().map(|v| v as i64).collect(),
            },
        );
    };

    let (Some(mine), Some(theirs)) = (supported.get(version), client_versions.get(version)) else {
        return assume_legal(builder.done(
            HandshakeState::Done,
            Err(HandshakeError::LocalClose {
                detail: format!("version {version} reported common but missing from one side's table"),
            }),
        ));
    };

    match negotiator.negotiate(mine, theirs) {
        Some(params) => {
            trace!(version, "accept");
            assume_legal(builder.yield_msg(
                HandshakeState::Confirm,
                HandshakeMessage::AcceptVersion(version, params.clone()),
                assume_legal(builder.done(HandshakeState::Done, Ok((version, params)))),
            ))
        }
        None => refuse(
            builder,
            RefuseReason::Refused {
                version,
                text: "negotiator rejected the proposed parameters".to_owned(),
            },
        ),
    }
}

fn refuse<T: VersionData>(builder: &PeerBuilder<HandshakeProtocol<T>>, reason: RefuseReason) -> HandshakePeer<T> {
    trace!(reason = %reason, "refuse");
    assume_legal(builder.yield_msg(
        HandshakeState::Confirm,
        HandshakeMessage::Refuse(reason.clone()),
        assume_legal(builder.done(HandshakeState::Done, Err(HandshakeError::Refused(reason)))),
    ))
}

fn resolve_simultaneous_open<T: VersionData>(
    ours: &HandshakeVersions<T>,
    theirs: &HandshakeVersions<T>,
    negotiator: &Negotiator<T>,
) -> HandshakeOutcome<T> {
    let highest = highest_common_version(ours, theirs).ok_or_else(|| HandshakeError::LocalClose {
        detail: "no version in common during simultaneous open".to_owned(),
    })?;
    let (Some(mine), Some(theirs_params)) = (ours.get(highest), theirs.get(highest)) else {
        return Err(HandshakeError::LocalClose {
            detail: format!("version {highest} reported common but missing from one side's table"),
        });
    };
    negotiator.negotiate(mine, theirs_params).map(|params| (highest, params)).ok_or_else(|| {
        HandshakeError::LocalClose { detail: format!("negotiator rejected version {highest}'s parameters") }
    })
}

#[cfg(test)]
#[path = "peer_tests.rs"]
mod peer_tests;
