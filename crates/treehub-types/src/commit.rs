use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hashing::{digest, valid_hex};
use crate::object_id::ObjectId;

/// Type suffix of commit objects.
pub const COMMIT_OBJECT_TYPE: &str = "commit";

/// An OSTree commit: the 64-char lowercase sha256 of a commit object.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Commit(String);

impl Commit {
    /// Validate `s` as a commit hash.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if !valid_hex(64, &s) {
            return Err(TypeError::InvalidCommit(s));
        }
        Ok(Self(s))
    }

    /// Commit naming `content`, i.e. its sha256.
    pub fn from_bytes(content: &[u8]) -> Self {
        Self(digest(content))
    }

    /// The object id of this commit: `<commit>.commit`.
    pub fn to_object_id(&self) -> ObjectId {
        ObjectId::from_parts(&self.0, COMMIT_OBJECT_TYPE)
    }

    /// The 64-character lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commit({})", self.0)
    }
}

impl fmt::Display for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Commit {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Commit {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Commit> for String {
    fn from(c: Commit) -> Self {
        c.0
    }
}

impl From<&Commit> for ObjectId {
    fn from(c: &Commit) -> Self {
        c.to_object_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "aec070645fe53ee3b3763059376134f058cc337247c978add178b6ccdfb0019f";

    #[test]
    fn validate() {
        assert!(Commit::new("some_invalid_str").is_err());
        assert!(Commit::new("aec070645e").is_err());
        assert!(Commit::new(SHA).is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        let err = Commit::new(SHA.to_uppercase()).unwrap_err();
        assert_eq!(err, TypeError::InvalidCommit(SHA.to_uppercase()));
    }

    #[test]
    fn to_object_id_appends_commit_suffix() {
        let commit = Commit::new(SHA).unwrap();
        let id = commit.to_object_id();
        assert_eq!(id, ObjectId::new(format!("{SHA}.commit")).unwrap());
        assert_eq!(id.object_type(), COMMIT_OBJECT_TYPE);
    }

    #[test]
    fn from_bytes_hashes_content() {
        let commit = Commit::from_bytes(b"");
        assert_eq!(
            commit.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            commit.to_object_id().as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.commit"
        );
    }

    #[test]
    fn serde_roundtrip_validates() {
        let commit = Commit::new(SHA).unwrap();
        let json = serde_json::to_string(&commit).unwrap();
        assert_eq!(serde_json::from_str::<Commit>(&json).unwrap(), commit);
        assert!(serde_json::from_str::<Commit>("\"abc\"").is_err());
    }
}
