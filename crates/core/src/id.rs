// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifiers.
//!
//! Ids are short ASCII strings (`ses-` + 20 random characters) kept inline
//! in a fixed buffer. They are hash-map keys and appear in every event the
//! daemon emits, so staying `Copy` matters more than supporting arbitrary
//! lengths: anything longer than the buffer is rejected on the wire.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const PREFIX: &str = "ses-";
const SUFFIX_LEN: usize = 20;

/// Inline capacity. Generated ids fill it exactly; parsed ids may be
/// shorter but never longer.
pub const SESSION_ID_CAP: usize = PREFIX.len() + SUFFIX_LEN;

/// Clip a string for log output to at most `n` bytes.
///
/// Falls back to the full string when `n` does not land on a character
/// boundary, which is fine for its only purpose (shortening log lines).
pub fn clip(s: &str, n: usize) -> &str {
    s.get(..n).unwrap_or(s)
}

/// Server-assigned session identifier, stable across restarts.
///
/// The buffer past `len` is always zero, so the derived `Eq`/`Hash` agree
/// with string equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    buf: [u8; SESSION_ID_CAP],
    len: u8,
}

impl SessionId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self::pack(&format!("{PREFIX}{}", nanoid::nanoid!(SUFFIX_LEN)))
    }

    pub fn as_str(&self) -> &str {
        // The buffer is only ever filled from &str input.
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    /// The random part, without the `ses-` prefix. Ids that never carried
    /// the prefix come back whole.
    pub fn suffix(&self) -> &str {
        let s = self.as_str();
        s.strip_prefix(PREFIX).unwrap_or(s)
    }

    /// Pack a string into the inline buffer, clipping anything past the
    /// capacity. Parsing from untrusted input goes through `Deserialize`,
    /// which rejects oversized ids instead.
    fn pack(s: &str) -> Self {
        let s = clip(s, SESSION_ID_CAP);
        let mut buf = [0u8; SESSION_ID_CAP];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        Self { buf, len: s.len() as u8 }
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::pack(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self::pack(&s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionId").field(&self.as_str()).finish()
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() > SESSION_ID_CAP {
            return Err(D::Error::custom(format!(
                "session id longer than {SESSION_ID_CAP} bytes: {:?}",
                clip(&s, 40)
            )));
        }
        Ok(Self::pack(&s))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
