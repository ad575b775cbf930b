// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthetic protocol fixtures shared by the kernel's own test suite.
//!
//! `ReqResp` is the request/response protocol used by §8's pipelining
//! scenarios: one client-agency state (`Req`), one server-agency state
//! (`Resp`) — a client can pipeline arbitrarily many `Ask`s ahead of their
//! `Reply`s — plus a terminal `Done`, reached only by the client's `Bye`,
//! so tests have a conformant way to end a run instead of calling `Done`
//! from a non-terminal state.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;

use bytes::{Buf, Bytes};

use crate::channel::{Channel, ChannelError};
use crate::codec::{Codec, DecodeError, DecodeStep};
use crate::protocol::{Agency, ProtocolDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqRespState {
    Req,
    Resp,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqRespTag {
    Ask,
    Reply,
    Bye,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReqRespMessage {
    Ask(u32),
    Reply(u32),
    Bye,
}

pub struct ReqResp;

impl ProtocolDescriptor for ReqResp {
    type State = ReqRespState;
    type MessageTag = ReqRespTag;
    type Message = ReqRespMessage;

    fn name(&self) -> &'static str {
        "req-resp"
    }

    fn state_agency(&self, state: Self::State) -> Agency {
        match state {
            ReqRespState::Req => Agency::Client,
            ReqRespState::Resp => Agency::Server,
            ReqRespState::Done => Agency::Nobody,
        }
    }

    fn message_tag(&self, message: &Self::Message) -> Self::MessageTag {
        match message {
            ReqRespMessage::Ask(_) => ReqRespTag::Ask,
            ReqRespMessage::Reply(_) => ReqRespTag::Reply,
            ReqRespMessage::Bye => ReqRespTag::Bye,
        }
    }

    fn messages_from(&self, state: Self::State) -> Vec<(Self::MessageTag, Self::State)> {
        match state {
            ReqRespState::Req => vec![(ReqRespTag::Ask, ReqRespState::Resp), (ReqRespTag::Bye, ReqRespState::Done)],
            ReqRespState::Resp => vec![(ReqRespTag::Reply, ReqRespState::Req)],
            ReqRespState::Done => vec![],
        }
    }
}

/// `u8` tag + big-endian `u32` payload (unused for `Bye`). Deliberately
/// simple: the kernel's own tests exercise the driver, not wire-format
/// cleverness.
pub struct ReqRespCodec;

impl Codec<ReqResp> for ReqRespCodec {
    fn encode(&self, _state: ReqRespState, message: &ReqRespMessage) -> Bytes {
        let (tag, payload) = match message {
            ReqRespMessage::Ask(n) => (0u8, *n),
            ReqRespMessage::Reply(n) => (1u8, *n),
            ReqRespMessage::Bye => (2u8, 0u32),
        };
        let mut out = Vec::with_capacity(5);
        out.push(tag);
        out.extend_from_slice(&payload.to_be_bytes());
        Bytes::from(out)
    }

    fn decode(&self, state: ReqRespState) -> DecodeStep<ReqResp> {
        step(state, Bytes::new())
    }
}

fn step(state: ReqRespState, mut buf: Bytes) -> DecodeStep<ReqResp> {
    if buf.len() < 5 {
        return DecodeStep::Partial(Box::new(move |chunk| {
            match chunk {
                Some(chunk) => {
                    let mut combined = Vec::with_capacity(buf.len() + chunk.len());
                    combined.extend_from_slice(&buf);
                    combined.extend_from_slice(&chunk);
                    step(state, Bytes::from(combined))
                }
                // Still short of a full message with no more bytes coming;
                // stay `Partial` and let the driver surface this as an
                // unexpected EOF rather than guessing at a decode failure.
                None => step(state, buf.clone()),
            }
        }));
    }

    let tag = buf[0];
    let payload = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    buf.advance(5);

    match (state, tag) {
        (ReqRespState::Resp, 1) => {
            DecodeStep::Done { leftover: buf, message: ReqRespMessage::Reply(payload), target: ReqRespState::Req }
        }
        (ReqRespState::Req, 0) => {
            DecodeStep::Done { leftover: buf, message: ReqRespMessage::Ask(payload), target: ReqRespState::Resp }
        }
        (ReqRespState::Req, 2) => {
            DecodeStep::Done { leftover: buf, message: ReqRespMessage::Bye, target: ReqRespState::Done }
        }
        _ => DecodeStep::Fail {
            leftover: buf,
            reason: DecodeError(format!("tag {tag} is not legal from state {state:?}")),
        },
    }
}

/// A channel whose inbound side is a plain queue the test feeds directly,
/// so `try_recv` can be made to answer "available" or "not yet" on demand
/// without the machinery of a real duplex pair.
pub struct QueueChannel {
    inbound: StdMutex<VecDeque<Bytes>>,
}

impl QueueChannel {
    pub fn new() -> Self {
        Self { inbound: StdMutex::new(VecDeque::new()) }
    }

    pub fn push(&self, bytes: Bytes) {
        if let Ok(mut queue) = self.inbound.lock() {
            queue.push_back(bytes);
        }
    }
}

impl Channel for QueueChannel {
    async fn send(&self, _bytes: Bytes) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Bytes>, ChannelError> {
        Ok(self.inbound.lock().ok().and_then(|mut queue| queue.pop_front()))
    }

    fn try_recv(&self) -> Option<Bytes> {
        self.inbound.lock().ok().and_then(|mut queue| queue.pop_front())
    }

    async fn close(&self) {}
}
