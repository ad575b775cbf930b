// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire codec for the handshake protocol (§6).
//!
//! Each message is a one-byte tag followed by a payload; `versionParams`
//! is opaque to this codec and delegated to a caller-supplied
//! [`VersionDataCodec`] (§9's open question: the kernel does not specify
//! that framing). The decoder accumulates bytes across `Partial` calls
//! and re-attempts a full parse each time, rather than resuming a
//! field-by-field cursor — simpler to get right, and the three-state
//! `Partial`/`Done`/`Fail` contract (§4.3) does not require anything more.

use std::marker::PhantomData;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use tproto_core::{Codec, DecodeError, DecodeStep};

use crate::messages::{HandshakeMessage, RefuseReason};
use crate::state::{HandshakeProtocol, HandshakeState};
use crate::version::{HandshakeVersions, VersionData, VersionNumber};

/// Encodes/decodes the opaque per-version parameter payload. The kernel
/// never inspects `T`; this trait is the seam a caller plugs a concrete
/// parameter format into.
pub trait VersionDataCodec<T>: Send + Sync + 'static {
    fn encode(&self, data: &T) -> Bytes;
    fn decode(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// A `VersionDataCodec` for callers whose parameters are already raw
/// bytes — the identity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawParamsCodec;

impl VersionDataCodec<Vec<u8>> for RawParamsCodec {
    fn encode(&self, data: &Vec<u8>) -> Bytes {
        Bytes::copy_from_slice(data)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(bytes.to_vec())
    }
}

pub struct HandshakeCodec<T, C> {
    params_codec: Arc<C>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> HandshakeCodec<T, C> {
    pub fn new(params_codec: C) -> Self {
        Self { params_codec: Arc::new(params_codec), _marker: PhantomData }
    }
}

impl<T: VersionData, C: VersionDataCodec<T>> Codec<HandshakeProtocol<T>> for HandshakeCodec<T, C> {
    fn encode(&self, _state: HandshakeState, message: &HandshakeMessage<T>) -> Bytes {
        match message {
            HandshakeMessage::ProposeVersions(versions) | HandshakeMessage::ProposeVersionsPrime(versions) => {
                encode_versions(versions, &*self.params_codec)
            }
            HandshakeMessage::AcceptVersion(version, params) => {
                encode_accept(*version, params, &*self.params_codec)
            }
            HandshakeMessage::Refuse(reason) => encode_refuse(reason),
        }
    }

    fn decode(&self, state: HandshakeState) -> DecodeStep<HandshakeProtocol<T>> {
        attempt(state, Bytes::new(), self.params_codec.clone())
    }
}

fn attempt<T: VersionData, C: VersionDataCodec<T>>(
    state: HandshakeState,
    buf: Bytes,
    params_codec: Arc<C>,
) -> DecodeStep<HandshakeProtocol<T>> {
    match try_parse(state, &buf, &*params_codec) {
        Some(Ok((message, target, consumed))) => {
            DecodeStep::Done { leftover: buf.slice(consumed..), message, target }
        }
        Some(Err(reason)) => DecodeStep::Fail { leftover: buf, reason },
        None => DecodeStep::Partial(Box::new(move |chunk| match chunk {
            Some(chunk) => {
                let mut combined = Vec::with_capacity(buf.len() + chunk.len());
                combined.extend_from_slice(&buf);
                combined.extend_from_slice(&chunk);
                attempt(state, Bytes::from(combined), params_codec.clone())
            }
            // No more bytes coming and still short of a complete message;
            // stay `Partial` so the driver surfaces `UnexpectedEof`.
            None => attempt(state, buf.clone(), params_codec.clone()),
        })),
    }
}

/// `None` if `buf` does not yet hold a complete message for `state`;
/// `Some(Err(_))` if it is unambiguously malformed; `Some(Ok((message,
/// target, bytes_consumed)))` on success.
#[allow(clippy::type_complexity)]
fn try_parse<T: VersionData, C: VersionDataCodec<T>>(
    state: HandshakeState,
    buf: &[u8],
    params_codec: &C,
) -> Option<Result<(HandshakeMessage<T>, HandshakeState, usize), DecodeError>> {
    let mut pos = 0usize;
    let tag = read_u8(buf, &mut pos)?;

    match tag {
        0 => {
            let count = read_u16(buf, &mut pos)? as usize;
            let mut entries = Vec::with_capacity(count);
            let mut last_version: Option<VersionNumber> = None;
            for _ in 0..count {
                let version = read_u64(buf, &mut pos)?;
                let len = read_u32(buf, &mut pos)? as usize;
                let payload = read_bytes(buf, &mut pos, len)?;
                if let Some(last) = last_version {
                    if version <= last {
                        return Some(Err(DecodeError(format!(
                            "version table is not strictly ascending: {version} after {last}"
                        ))));
                    }
                }
                last_version = Some(version);
                match params_codec.decode(payload) {
                    Ok(data) => entries.push((version, data)),
                    Err(e) => return Some(Err(e)),
                }
            }
            if entries.is_empty() {
                return Some(Err(DecodeError("version table must be non-empty".to_owned())));
            }
            let versions = HandshakeVersions::from_sorted(entries);
            let (message, target) = match state {
                HandshakeState::Propose => {
                    (HandshakeMessage::ProposeVersions(versions), HandshakeState::Confirm)
                }
                HandshakeState::Confirm => {
                    (HandshakeMessage::ProposeVersionsPrime(versions), HandshakeState::Done)
                }
                HandshakeState::Done => {
                    return Some(Err(DecodeError("no message is legal once done".to_owned())))
                }
            };
            Some(Ok((message, target, pos)))
        }

        1 => {
            if state != HandshakeState::Confirm {
                return Some(Err(DecodeError(format!("AcceptVersion is not legal from {state:?}"))));
            }
            let version = read_u64(buf, &mut pos)?;
            let len = read_u32(buf, &mut pos)? as usize;
            let payload = read_bytes(buf, &mut pos, len)?;
            match params_codec.decode(payload) {
                Ok(data) => Some(Ok((
                    HandshakeMessage::AcceptVersion(version, data),
                    HandshakeState::Done,
                    pos,
                ))),
                Err(e) => Some(Err(e)),
            }
        }

        2 => {
            if state != HandshakeState::Confirm {
                return Some(Err(DecodeError(format!("Refuse is not legal from {state:?}"))));
            }
            let subtag = read_u8(buf, &mut pos)?;
            let reason = match subtag {
                0 => {
                    let known_count = read_u16(buf, &mut pos)? as usize;
                    let mut server_known = Vec::with_capacity(known_count);
                    for _ in 0..known_count {
                        server_known.push(read_u64(buf, &mut pos)?);
                    }
                    let tag_count = read_u16(buf, &mut pos)? as usize;
                    let mut client_raw_tags = Vec::with_capacity(tag_count);
                    for _ in 0..tag_count {
                        client_raw_tags.push(read_i64(buf, &mut pos)?);
                    }
                    RefuseReason::VersionMismatch { server_known, client_raw_tags }
                }
                1 | 2 => {
                    let version = read_u64(buf, &mut pos)?;
                    let text_len = read_u32(buf, &mut pos)? as usize;
                    let text_bytes = read_bytes(buf, &mut pos, text_len)?;
                    let text = match std::str::from_utf8(text_bytes) {
                        Ok(s) => s.to_owned(),
                        Err(_) => {
                            return Some(Err(DecodeError("refuse text is not valid utf-8".to_owned())))
                        }
                    };
                    if subtag == 1 {
                        RefuseReason::HandshakeDecodeError { version, text }
                    } else {
                        RefuseReason::Refused { version, text }
                    }
                }
                other => return Some(Err(DecodeError(format!("unknown refuse subtag {other}")))),
            };
            Some(Ok((HandshakeMessage::Refuse(reason), HandshakeState::Done, pos)))
        }

        other => Some(Err(DecodeError(format!("unknown handshake tag {other}")))),
    }
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Option<u8> {
    let byte = *buf.get(*pos)?;
    *pos += 1;
    Some(byte)
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Option<u16> {
    let slice = buf.get(*pos..*pos + 2)?;
    *pos += 2;
    Some(u16::from_be_bytes(slice.try_into().ok()?))
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Option<u32> {
    let slice = buf.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_be_bytes(slice.try_into().ok()?))
}

fn read_u64(buf: &[u8], pos: &mut usize) -> Option<u64> {
    let slice = buf.get(*pos..*pos + 8)?;
    *pos += 8;
    Some(u64::from_be_bytes(slice.try_into().ok()?))
}

fn read_i64(buf: &[u8], pos: &mut usize) -> Option<i64> {
    read_u64(buf, pos).map(|v| v as i64)
}

fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Option<&'a [u8]> {
    let slice = buf.get(*pos..*pos + len)?;
    *pos += len;
    Some(slice)
}

fn encode_versions<T: VersionData, C: VersionDataCodec<T>>(
    versions: &HandshakeVersions<T>,
    params_codec: &C,
) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(0);
    buf.put_u16(versions.len() as u16);
    for (version, params) in versions.iter() {
        buf.put_u64(*version);
        let payload = params_codec.encode(params);
        buf.put_u32(payload.len() as u32);
        buf.put(payload);
    }
    buf.freeze()
}

fn encode_accept<T: VersionData, C: VersionDataCodec<T>>(
    version: VersionNumber,
    params: &T,
    params_codec: &C,
) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(1);
    buf.put_u64(version);
    let payload = params_codec.encode(params);
    buf.put_u32(payload.len() as u32);
    buf.put(payload);
    buf.freeze()
}

fn encode_refuse(reason: &RefuseReason) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(2);
    match reason {
        RefuseReason::VersionMismatch { server_known, client_raw_tags } => {
            buf.put_u8(0);
            buf.put_u16(server_known.len() as u16);
            for v in server_known {
                buf.put_u64(*v);
            }
            buf.put_u16(client_raw_tags.len() as u16);
            for t in client_raw_tags {
                buf.put_i64(*t);
            }
        }
        RefuseReason::HandshakeDecodeError { version, text } => {
            buf.put_u8(1);
            buf.put_u64(*version);
            buf.put_u32(text.len() as u32);
            buf.put_slice(text.as_bytes());
        }
        RefuseReason::Refused { version, text } => {
            buf.put_u8(2);
            buf.put_u64(*version);
            buf.put_u32(text.len() as u32);
            buf.put_slice(text.as_bytes());
        }
    }
    buf.freeze()
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod codec_tests;
