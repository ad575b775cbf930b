// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handshake's three-state descriptor (§4.6): propose, confirm, done.

use std::marker::PhantomData;

use tproto_core::{Agency, ProtocolDescriptor};

use crate::messages::{HandshakeMessage, HandshakeTag};
use crate::version::VersionData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Propose,
    Confirm,
    Done,
}

/// The handshake protocol descriptor, generic over the opaque
/// per-version parameter type `T`.
pub struct HandshakeProtocol<T> {
    _params: PhantomData<fn() -> T>,
}

impl<T> HandshakeProtocol<T> {
    pub fn new() -> Self {
        Self { _params: PhantomData }
    }
}

impl<T> Default for HandshakeProtocol<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VersionData> ProtocolDescriptor for HandshakeProtocol<T> {
    type State = HandshakeState;
    type MessageTag = HandshakeTag;
    type Message = HandshakeMessage<T>;

    fn name(&self) -> &'static str {
        "handshake"
    }

    fn state_agency(&self, state: Self::State) -> Agency {
        match state {
            HandshakeState::Propose => Agency::Client,
            HandshakeState::Confirm => Agency::Server,
            HandshakeState::Done => Agency::Nobody,
        }
    }

    fn message_tag(&self, message: &Self::Message) -> Self::MessageTag {
        match message {
            HandshakeMessage::ProposeVersions(_) => HandshakeTag::ProposeVersions,
            HandshakeMessage::ProposeVersionsPrime(_) => HandshakeTag::ProposeVersionsPrime,
            HandshakeMessage::AcceptVersion(_, _) => HandshakeTag::AcceptVersion,
            HandshakeMessage::Refuse(_) => HandshakeTag::Refuse,
        }
    }

    fn messages_from(&self, state: Self::State) -> Vec<(Self::MessageTag, Self::State)> {
        match state {
            HandshakeState::Propose => vec![(HandshakeTag::ProposeVersions, HandshakeState::Confirm)],
            HandshakeState::Confirm => vec![
                (HandshakeTag::AcceptVersion, HandshakeState::Done),
                (HandshakeTag::Refuse, HandshakeState::Done),
                // Only ever appears as a decoded message, never an explicit
                // `Yield`: a `ProposeVersions` received while in `Confirm`
                // is the simultaneous-open case (§4.6.1).
                (HandshakeTag::ProposeVersionsPrime, HandshakeState::Done),
            ],
            HandshakeState::Done => vec![],
        }
    }
}
