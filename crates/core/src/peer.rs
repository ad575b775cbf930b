// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer programs: a lazy, suspendable computation that produces a final
//! value by alternately yielding a message, awaiting a message, or
//! finishing — with optional pipelining (§3, §4.2).
//!
//! This is the "small interpreter over an instruction sum type" option from
//! the design notes: each instruction owns a boxed continuation, and the
//! driver (`crate::driver`) pattern-matches one instruction per step.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::protocol::{ProtocolDescriptor, RelativeAgency, Role};

/// A peer attempted an operation the protocol descriptor disallows from the
/// given state under the peer's role. Raised at construction time so a
/// malformed peer program can never reach the driver.
#[derive(Debug, Clone)]
pub struct AgencyViolation {
    pub state: String,
    pub detail: String,
}

impl fmt::Display for AgencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agency violation in state {}: {}", self.state, self.detail)
    }
}

impl std::error::Error for AgencyViolation {}

type BoxedEffect<D, A> = Pin<Box<dyn Future<Output = Peer<D, A>> + Send>>;
type OnMessage<D, A> = Box<dyn FnOnce(<D as ProtocolDescriptor>::Message) -> Peer<D, A> + Send>;

/// The eight-case instruction set of §3, specialized to protocol `D` and
/// final result type `A`.
pub enum Peer<D: ProtocolDescriptor, A> {
    /// Perform a host-side effect, producing the next peer program.
    Effect(BoxedEffect<D, A>),
    /// Terminate with `value`. Legal only when the current state has
    /// nobody agency and the pipeline queue is empty; the driver asserts
    /// both at runtime (§4.5, invariant 3).
    Done(A),
    /// Emit `message`, transitioning to `target`. Legal only when the
    /// peer's role has we-agency in the state this was built against.
    Yield { message: D::Message, target: D::State, next: Box<Peer<D, A>> },
    /// Block for an inbound message expected to be legal from `state`.
    /// Legal only when the peer's role has they-agency there.
    Await { state: D::State, on_message: OnMessage<D, A> },
    /// Emit `message` without awaiting its reply; the reply's expected
    /// decode state (`target`) is enqueued for a later `Collect`.
    YieldPipelined { message: D::Message, target: D::State, next: Box<Peer<D, A>> },
    /// Consume the front of the pipelined response queue. If `alt` is
    /// `Some`, do so only if a full message is already available
    /// (non-blocking); otherwise run `alt` and try again later.
    Collect { alt: Option<Box<Peer<D, A>>>, on_message: OnMessage<D, A> },
    /// Pop the front of the response queue after it has been collected.
    CollectDone(Box<Peer<D, A>>),
}

/// Builds [`Peer`] instructions for one protocol, role pair, checking
/// agency at construction time (§4.1: "the builder rejects it with
/// `AgencyViolation`").
///
/// Queue-depth discipline (§3, §4.5 invariants 3–4) is *not* checked here —
/// it is a property of how many `YieldPipelined`/`CollectDone` steps a
/// given execution path has taken, which the driver tracks at runtime, not
/// something statically knowable from a single `(state, role)` pair.
#[derive(Clone)]
pub struct PeerBuilder<D: ProtocolDescriptor> {
    descriptor: Arc<D>,
    role: Role,
}

impl<D: ProtocolDescriptor> PeerBuilder<D> {
    pub fn new(descriptor: Arc<D>, role: Role) -> Self {
        Self { descriptor, role }
    }

    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    pub fn role(&self) -> Role {
        self.role
    }

    fn check_agency(&self, state: D::State, expected: RelativeAgency) -> Result<(), AgencyViolation> {
        let actual = self.descriptor.state_agency(state).relative_to(self.role);
        if actual == expected {
            Ok(())
        } else {
            Err(AgencyViolation {
                state: format!("{state:?}"),
                detail: format!("expected {expected:?}, state has {actual:?}"),
            })
        }
    }

    /// A host-side effect between steps.
    pub fn effect<A, F, Fut>(&self, f: F) -> Peer<D, A>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Peer<D, A>> + Send + 'static,
    {
        Peer::Effect(Box::pin(async move { f().await }))
    }

    /// Terminate the peer program with `value`.
    pub fn done<A>(&self, state: D::State, value: A) -> Result<Peer<D, A>, AgencyViolation> {
        if self.descriptor.is_terminal(state) {
            Ok(Peer::Done(value))
        } else {
            Err(AgencyViolation {
                state: format!("{state:?}"),
                detail: "Done is only legal in a state with nobody agency".to_owned(),
            })
        }
    }

    /// Emit `message` from `state` and continue as `next`.
    pub fn yield_msg<A>(
        &self,
        state: D::State,
        message: D::Message,
        next: Peer<D, A>,
    ) -> Result<Peer<D, A>, AgencyViolation> {
        self.check_agency(state, RelativeAgency::WeHaveAgency)?;
        let tag = self.descriptor.message_tag(&message);
        let target = self.descriptor.transition(state, tag).ok_or_else(|| AgencyViolation {
            state: format!("{state:?}"),
            detail: format!("{tag:?} is not a declared transition from this state"),
        })?;
        Ok(Peer::Yield { message, target, next: Box::new(next) })
    }

    /// Await an inbound message expected to be legal from `state`.
    pub fn await_msg<A>(
        &self,
        state: D::State,
        on_message: impl FnOnce(D::Message) -> Peer<D, A> + Send + 'static,
    ) -> Result<Peer<D, A>, AgencyViolation> {
        self.check_agency(state, RelativeAgency::TheyHaveAgency)?;
        Ok(Peer::Await { state, on_message: Box::new(on_message) })
    }

    /// Emit `message` from `state` without awaiting its reply.
    pub fn yield_pipelined<A>(
        &self,
        state: D::State,
        message: D::Message,
        next: Peer<D, A>,
    ) -> Result<Peer<D, A>, AgencyViolation> {
        self.check_agency(state, RelativeAgency::WeHaveAgency)?;
        let tag = self.descriptor.message_tag(&message);
        let target = self.descriptor.transition(state, tag).ok_or_else(|| AgencyViolation {
            state: format!("{state:?}"),
            detail: format!("{tag:?} is not a declared transition from this state"),
        })?;
        Ok(Peer::YieldPipelined { message, target, next: Box::new(next) })
    }

    /// Consume the front of the pipelined response queue, blocking until a
    /// full message has been decoded.
    pub fn collect<A>(
        &self,
        on_message: impl FnOnce(D::Message) -> Peer<D, A> + Send + 'static,
    ) -> Peer<D, A> {
        Peer::Collect { alt: None, on_message: Box::new(on_message) }
    }

    /// Consume the front of the pipelined response queue only if it is
    /// immediately available; otherwise run `alt`.
    pub fn collect_or<A>(
        &self,
        alt: Peer<D, A>,
        on_message: impl FnOnce(D::Message) -> Peer<D, A> + Send + 'static,
    ) -> Peer<D, A> {
        Peer::Collect { alt: Some(Box::new(alt)), on_message: Box::new(on_message) }
    }

    /// Pop the front of the response queue after a `Collect` resolved.
    pub fn collect_done<A>(&self, next: Peer<D, A>) -> Peer<D, A> {
        Peer::CollectDone(Box::new(next))
    }
}

#[cfg(test)]
#[path = "peer_tests.rs"]
mod peer_tests;
