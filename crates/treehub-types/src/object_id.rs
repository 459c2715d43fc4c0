use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hashing::valid_hex;

/// Content-addressed identifier of an OSTree object: `<sha256-hex>.<type>`.
///
/// The type suffix is free-form (`commit`, `dirtree`, `dirmeta`, `filez`, ...)
/// but must be non-empty and must not contain `/`, `\` or NUL, so the id
/// always maps to a single file name in the fan-out layout. The sha portion is exactly 64 lowercase hex chars.
/// An `ObjectId` can only be obtained through validation, so holding one
/// means the format invariant already holds.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate `s` and wrap it.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        match split(&s) {
            Some(_) => Ok(Self(s)),
            None => Err(TypeError::InvalidObjectId(s)),
        }
    }

    /// Build from already-validated parts.
    pub(crate) fn from_parts(sha: &str, object_type: &str) -> Self {
        debug_assert!(valid_hex(64, sha) && !object_type.is_empty());
        Self(format!("{sha}.{object_type}"))
    }

    /// The 64-char sha256 portion.
    pub fn sha(&self) -> &str {
        self.parts().0
    }

    /// The type suffix after the last `.`.
    pub fn object_type(&self) -> &str {
        self.parts().1
    }

    /// The full `<sha>.<type>` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fan-out storage path: `parent/sha[0:2]/sha[2:].type`.
    ///
    /// Splitting on the first two characters bounds the number of entries
    /// per directory to 256 shards.
    pub fn path(&self, parent: impl AsRef<Path>) -> PathBuf {
        let (prefix, rest) = self.0.split_at(2);
        parent.as_ref().join(prefix).join(rest)
    }

    /// Last component of [`path`](Self::path): `sha[2:].type`.
    pub fn filename(&self) -> &str {
        &self.0[2..]
    }

    fn parts(&self) -> (&str, &str) {
        // Invariant established in `new`.
        self.0.rsplit_once('.').unwrap_or((&self.0, ""))
    }
}

const FORBIDDEN_TYPE_CHARS: &[char] = &['/', '\\', '\0'];

fn split(s: &str) -> Option<(&str, &str)> {
    let (sha, object_type) = s.rsplit_once('.')?;
    if object_type.is_empty()
        || object_type.contains(FORBIDDEN_TYPE_CHARS)
        || !valid_hex(64, sha)
    {
        return None;
    }
    Some((sha, object_type))
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
