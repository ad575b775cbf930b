// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binds a peer to a channel through a codec; executes the peer, enforcing
//! agency and tracking outstanding pipelined responses (§4.5).

use std::collections::VecDeque;
use std::time::Instant;

use bytes::Bytes;
use tracing::trace;

use crate::channel::Channel;
use crate::codec::{Codec, DecodeStep, PartialDecoder};
use crate::error::DriverFailure;
use crate::peer::Peer;
use crate::protocol::ProtocolDescriptor;

/// Driver-local state per connection: leftover bytes, the last-send
/// timestamp (for host-defined timeout accounting, §9), and any decoder
/// suspended mid-message by a non-blocking `Collect`.
pub struct DState<D: ProtocolDescriptor> {
    pub leftover: Bytes,
    pub last_send: Option<Instant>,
    pending_decoder: Option<PendingDecoder<D>>,
}

struct PendingDecoder<D: ProtocolDescriptor> {
    for_state: D::State,
    step: PartialDecoder<D>,
}

impl<D: ProtocolDescriptor> DState<D> {
    pub fn new() -> Self {
        Self { leftover: Bytes::new(), last_send: None, pending_decoder: None }
    }
}

impl<D: ProtocolDescriptor> Default for DState<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// The FIFO of expected-response decode states maintained while pipelining
/// (§3, §4.5). Depth is always non-negative by construction: the only ways
/// to shrink it are `pop`, which requires a non-empty queue.
struct PipelineQueue<S> {
    depth: VecDeque<S>,
}

impl<S: Copy> PipelineQueue<S> {
    fn new() -> Self {
        Self { depth: VecDeque::new() }
    }

    fn push(&mut self, state: S) {
        self.depth.push_back(state);
    }

    fn front(&self) -> Option<S> {
        self.depth.front().copied()
    }

    fn pop(&mut self) -> Option<S> {
        self.depth.pop_front()
    }

    fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    fn len(&self) -> usize {
        self.depth.len()
    }
}

/// Execute `peer` against `channel` through `codec`, starting in
/// `initial_state`, returning the peer's result and the final [`DState`]
/// once the peer reaches `Done` or a failure occurs (§4.5, §6).
pub async fn run_peer<D, C, K, A>(
    descriptor: &D,
    channel: &C,
    codec: &K,
    initial_state: D::State,
    peer: Peer<D, A>,
    mut dstate: DState<D>,
) -> Result<(A, DState<D>), DriverFailure>
where
    D: ProtocolDescriptor,
    C: Channel,
    K: Codec<D>,
    A: Send + 'static,
{
    let mut current_state = initial_state;
    let mut queue: PipelineQueue<D::State> = PipelineQueue::new();
    let mut peer = peer;

    loop {
        peer = match peer {
            Peer::Effect(fut) => {
                trace!(protocol = descriptor.name(), "effect");
                fut.await
            }

            Peer::Done(value) => {
                if !queue.is_empty() {
                    return Err(DriverFailure::ProtocolViolation {
                        state: format!("{current_state:?}"),
                        detail: format!(
                            "peer finished with {} outstanding pipelined response(s)",
                            queue.len()
                        ),
                    });
                }
                if !descriptor.is_terminal(current_state) {
                    return Err(DriverFailure::AgencyViolation {
                        state: format!("{current_state:?}"),
                        detail: "Done reached in a non-terminal state".to_owned(),
                    });
                }
                trace!(protocol = descriptor.name(), state = ?current_state, "done");
                return Ok((value, dstate));
            }

            Peer::Yield { message, target, next } => {
                if !queue.is_empty() {
                    return Err(DriverFailure::ProtocolViolation {
                        state: format!("{current_state:?}"),
                        detail: "Yield attempted while pipelined responses are outstanding"
                            .to_owned(),
                    });
                }
                let bytes = codec.encode(current_state, &message);
                channel.send(bytes).await?;
                dstate.last_send = Some(Instant::now());
                trace!(protocol = descriptor.name(), state = ?current_state, target = ?target, "yield");
                current_state = target;
                *next
            }

            Peer::Await { state, on_message } => {
                if !queue.is_empty() {
                    return Err(DriverFailure::ProtocolViolation {
                        state: format!("{current_state:?}"),
                        detail: "Await attempted while pipelined responses are outstanding"
                            .to_owned(),
                    });
                }
                let (message, target) = decode_blocking(codec, channel, &mut dstate, state).await?;
                trace!(protocol = descriptor.name(), state = ?state, target = ?target, "await");
                current_state = target;
                on_message(message)
            }

            Peer::YieldPipelined { message, target, next } => {
                let bytes = codec.encode(current_state, &message);
                channel.send(bytes).await?;
                dstate.last_send = Some(Instant::now());
                queue.push(target);
                current_state = descriptor.sole_transition(target).ok_or_else(|| {
                    DriverFailure::ProtocolViolation {
                        state: format!("{target:?}"),
                        detail: "state reached by a pipelined send has no unique reply \
                                 transition, so further sends cannot be agency-checked"
                            .to_owned(),
                    }
                })?;
                trace!(protocol = descriptor.name(), queue_depth = queue.len(), "yield_pipelined");
                *next
            }

            Peer::Collect { alt, on_message } => {
                let decode_state = match queue.front() {
                    Some(s) => s,
                    None => {
                        return Err(DriverFailure::ProtocolViolation {
                            state: format!("{current_state:?}"),
                            detail: "Collect attempted with an empty pipeline queue".to_owned(),
                        })
                    }
                };
                match alt {
                    None => {
                        let (message, _target) =
                            decode_blocking(codec, channel, &mut dstate, decode_state).await?;
                        on_message(message)
                    }
                    Some(alt_peer) => {
                        match decode_nonblocking(codec, channel, &mut dstate, decode_state)? {
                            Some((message, _target)) => on_message(message),
                            None => *alt_peer,
                        }
                    }
                }
            }

            Peer::CollectDone(next) => {
                if queue.pop().is_none() {
                    return Err(DriverFailure::ProtocolViolation {
                        state: format!("{current_state:?}"),
                        detail: "CollectDone attempted with an empty pipeline queue".to_owned(),
                    });
                }
                trace!(protocol = descriptor.name(), queue_depth = queue.len(), "collect_done");
                *next
            }
        };
    }
}

/// Drive `codec.decode(state)` to completion, pulling chunks from `channel`
/// as needed, resuming a decoder a prior non-blocking `Collect` suspended
/// for the same state.
async fn decode_blocking<D, C, K>(
    codec: &K,
    channel: &C,
    dstate: &mut DState<D>,
    state: D::State,
) -> Result<(D::Message, D::State), DriverFailure>
where
    D: ProtocolDescriptor,
    C: Channel,
    K: Codec<D>,
{
    let mut step = match take_pending(dstate, state) {
        Some(step) => step,
        None => match seed_decode(codec, dstate, state) {
            Seed::Resolved(result) => return result,
            Seed::Partial(step) => step,
        },
    };

    loop {
        match channel.recv().await? {
            Some(chunk) => match step(Some(chunk)) {
                DecodeStep::Done { leftover, message, target } => {
                    dstate.leftover = leftover;
                    return Ok((message, target));
                }
                DecodeStep::Fail { leftover, reason } => {
                    dstate.leftover = leftover;
                    return Err(DriverFailure::DecodeError(reason));
                }
                DecodeStep::Partial(next_step) => step = next_step,
            },
            None => {
                return match step(None) {
                    DecodeStep::Done { leftover, message, target } => {
                        dstate.leftover = leftover;
                        Ok((message, target))
                    }
                    DecodeStep::Fail { leftover, reason } => {
                        dstate.leftover = leftover;
                        Err(DriverFailure::DecodeError(reason))
                    }
                    DecodeStep::Partial(_) => Err(DriverFailure::UnexpectedEof),
                };
            }
        }
    }
}

/// Non-blocking decode attempt for `Collect(Some(alt), ..)`: consumes only
/// already-buffered leftover bytes plus whatever `channel.try_recv` can
/// hand over synchronously (§4.5, §5 — must never suspend on `recv`).
fn decode_nonblocking<D, C, K>(
    codec: &K,
    channel: &C,
    dstate: &mut DState<D>,
    state: D::State,
) -> Result<Option<(D::Message, D::State)>, DriverFailure>
where
    D: ProtocolDescriptor,
    C: Channel,
    K: Codec<D>,
{
    let mut step = match take_pending(dstate, state) {
        Some(step) => step,
        None => match seed_decode(codec, dstate, state) {
            Seed::Resolved(result) => return result.map(Some),
            Seed::Partial(step) => step,
        },
    };

    loop {
        match channel.try_recv() {
            Some(chunk) => match step(Some(chunk)) {
                DecodeStep::Done { leftover, message, target } => {
                    dstate.leftover = leftover;
                    return Ok(Some((message, target)));
                }
                DecodeStep::Fail { leftover, reason } => {
                    dstate.leftover = leftover;
                    return Err(DriverFailure::DecodeError(reason));
                }
                DecodeStep::Partial(next_step) => step = next_step,
            },
            None => {
                dstate.pending_decoder = Some(PendingDecoder { for_state: state, step });
                return Ok(None);
            }
        }
    }
}

enum Seed<D: ProtocolDescriptor> {
    Resolved(Result<(D::Message, D::State), DriverFailure>),
    Partial(PartialDecoder<D>),
}

/// Start a fresh decode for `state`, feeding whatever leftover bytes are
/// already buffered in `dstate` before anyone asks the channel for more.
fn seed_decode<D, K>(codec: &K, dstate: &mut DState<D>, state: D::State) -> Seed<D>
where
    D: ProtocolDescriptor,
    K: Codec<D>,
{
    let leftover = std::mem::take(&mut dstate.leftover);
    let step = match codec.decode(state) {
        DecodeStep::Done { leftover, message, target } => {
            dstate.leftover = leftover;
            return Seed::Resolved(Ok((message, target)));
        }
        DecodeStep::Fail { leftover, reason } => {
            dstate.leftover = leftover;
            return Seed::Resolved(Err(DriverFailure::DecodeError(reason)));
        }
        DecodeStep::Partial(step) => step,
    };
    if leftover.is_empty() {
        return Seed::Partial(step);
    }
    let mut step = step;
    match step(Some(leftover)) {
        DecodeStep::Done { leftover, message, target } => {
            dstate.leftover = leftover;
            Seed::Resolved(Ok((message, target)))
        }
        DecodeStep::Fail { leftover, reason } => {
            dstate.leftover = leftover;
            Seed::Resolved(Err(DriverFailure::DecodeError(reason)))
        }
        DecodeStep::Partial(next_step) => {
            step = next_step;
            Seed::Partial(step)
        }
    }
}

fn take_pending<D: ProtocolDescriptor>(
    dstate: &mut DState<D>,
    state: D::State,
) -> Option<PartialDecoder<D>> {
    match dstate.pending_decoder.take() {
        Some(pending) if pending.for_state == state => Some(pending.step),
        Some(other) => {
            dstate.pending_decoder = Some(other);
            None
        }
        None => None,
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;
