// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version tables and version-parameter negotiation (§4.6, §4.6.1, §9).
//!
//! `versionParams` is an opaque payload the kernel never inspects; the
//! caller supplies a [`Negotiator`] that decides, for two parameter
//! values, what (if anything) both sides can agree on. The negotiator is
//! required to be symmetric (`negotiate(a, b) == negotiate(b, a)`) for
//! simultaneous open to behave correctly (§4.6.1) — the engine does not
//! verify this, only the test suite does (§8).

use std::fmt;
use std::sync::Arc;

/// Marker bound for opaque per-version parameter payloads.
pub trait VersionData: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static> VersionData for T {}

pub type VersionNumber = u64;

/// An ascending, duplicate-free table of `(version, params)` pairs (§6: "the
/// map in tag 0 must be emitted sorted ascending"). The only way to obtain
/// one from outside this crate is [`HandshakeVersionsBuilder`], which sorts
/// on `build()` so the wire invariant holds by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeVersions<T> {
    entries: Vec<(VersionNumber, T)>,
}

impl<T: VersionData> HandshakeVersions<T> {
    pub fn builder() -> HandshakeVersionsBuilder<T> {
        HandshakeVersionsBuilder::new()
    }

    /// Build from entries already known to be sorted ascending by version
    /// with no duplicates — used by the codec, which has just verified
    /// that property against the wire bytes (§6, scenario S6).
    pub(crate) fn from_sorted(entries: Vec<(VersionNumber, T)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, version: VersionNumber) -> Option<&T> {
        self.entries.iter().find(|(v, _)| *v == version).map(|(_, data)| data)
    }

    pub fn versions(&self) -> impl Iterator<Item = VersionNumber> + '_ {
        self.entries.iter().map(|(v, _)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VersionNumber, T)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone)]
pub struct EmptyVersionTable;

impl fmt::Display for EmptyVersionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a handshake version table must contain at least one version")
    }
}

impl std::error::Error for EmptyVersionTable {}

pub struct HandshakeVersionsBuilder<T> {
    entries: Vec<(VersionNumber, T)>,
}

impl<T: VersionData> HandshakeVersionsBuilder<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with(mut self, version: VersionNumber, params: T) -> Self {
        self.entries.retain(|(v, _)| *v != version);
        self.entries.push((version, params));
        self
    }

    pub fn build(mut self) -> Result<HandshakeVersions<T>, EmptyVersionTable> {
        if self.entries.is_empty() {
            return Err(EmptyVersionTable);
        }
        self.entries.sort_by_key(|(version, _)| *version);
        Ok(HandshakeVersions { entries: self.entries })
    }
}

impl<T: VersionData> Default for HandshakeVersionsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The intersection of two version tables, in ascending order.
pub fn intersect_versions<T: VersionData>(
    a: &HandshakeVersions<T>,
    b: &HandshakeVersions<T>,
) -> Vec<VersionNumber> {
    a.versions().filter(|v| b.get(*v).is_some()).collect()
}

/// The highest version present in both tables, if any (§4.6: "pick the
/// highest common version").
pub fn highest_common_version<T: VersionData>(
    a: &HandshakeVersions<T>,
    b: &HandshakeVersions<T>,
) -> Option<VersionNumber> {
    intersect_versions(a, b).into_iter().max()
}

/// A caller-supplied, symmetric version-parameter negotiation function
/// (§4.6.1, §9's open question on parameter framing). Cheaply `Clone`, so
/// both the client and server peer-construction paths can carry one.
pub struct Negotiator<T> {
    f: Arc<dyn Fn(&T, &T) -> Option<T> + Send + Sync>,
}

impl<T> Negotiator<T> {
    pub fn new(f: impl Fn(&T, &T) -> Option<T> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    pub fn negotiate(&self, a: &T, b: &T) -> Option<T> {
        (self.f)(a, b)
    }
}

impl<T> Clone for Negotiator<T> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}
