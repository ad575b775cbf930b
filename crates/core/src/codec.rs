// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializer / incremental deserializer mapping typed messages to and from
//! an opaque byte stream, parametrized by protocol and current state.

use std::fmt;

use bytes::Bytes;

use crate::protocol::ProtocolDescriptor;

/// Reason a decode failed.
#[derive(Debug, Clone)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DecodeError {}

/// A single step of a resumable incremental decoder (§4.3).
///
/// `Partial` is fed more bytes (or `None` for end-of-input) and produces the
/// next step; `Done` and `Fail` are terminal and carry back whatever bytes
/// were not consumed, so the driver can seed the next message's decode from
/// them.
pub enum DecodeStep<D: ProtocolDescriptor> {
    Partial(PartialDecoder<D>),
    Done { leftover: Bytes, message: D::Message, target: D::State },
    Fail { leftover: Bytes, reason: DecodeError },
}

/// A suspended decoder waiting for more bytes (or end-of-input).
pub type PartialDecoder<D> = Box<dyn FnMut(Option<Bytes>) -> DecodeStep<D> + Send>;

impl<D: ProtocolDescriptor> fmt::Debug for DecodeStep<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial(_) => f.write_str("DecodeStep::Partial(..)"),
            Self::Done { leftover, message, target } => f
                .debug_struct("DecodeStep::Done")
                .field("leftover_len", &leftover.len())
                .field("message", message)
                .field("target", target)
                .finish(),
            Self::Fail { leftover, reason } => f
                .debug_struct("DecodeStep::Fail")
                .field("leftover_len", &leftover.len())
                .field("reason", reason)
                .finish(),
        }
    }
}

/// A codec for protocol `D` over an opaque byte stream.
///
/// `encode` is total: one encoding per legal message. `decode` returns a
/// resumable [`DecodeStep`] seeded for the given starting state; a codec
/// must reject tags that are not legal from that state with `Fail`, never
/// silently decode the wrong message (§4.3).
pub trait Codec<D: ProtocolDescriptor>: Send + Sync + 'static {
    /// Encode `message`, which the caller has already established is legal
    /// to send from `state`.
    fn encode(&self, state: D::State, message: &D::Message) -> Bytes;

    /// Begin decoding a message expected to be legal from `state`.
    fn decode(&self, state: D::State) -> DecodeStep<D>;
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod codec_tests;
