//! OSTree static-delta identifiers.
//!
//! A delta id names the pair of commits a delta transforms between:
//! `mbase64(from)-mbase64(to)`. The modified base64 drops `/` (which is a
//! directory separator in the delta path layout `cc/rest`) and spells the
//! base64 `/` digit as `_`.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::commit::COMMIT_OBJECT_TYPE;
use crate::error::TypeError;
use crate::object_id::ObjectId;

const MODIFIED_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Compound `<from>-<to>` identifier of a static delta.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeltaId(String);

impl DeltaId {
    /// Validate `s`: exactly one `-`, both halves decode as modified base64.
    pub fn new(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        match halves(&s) {
            Some((from, to)) if decode(from).is_some() && decode(to).is_some() => Ok(Self(s)),
            _ => Err(TypeError::InvalidDeltaId(s)),
        }
    }

    /// The commit object this delta leads to, from the second half.
    pub fn to_object_id(&self) -> Result<ObjectId, TypeError> {
        let to = halves(&self.0)
            .and_then(|(_, to)| decode(to))
            .ok_or_else(|| TypeError::InvalidDeltaId(self.0.clone()))?;
        ObjectId::new(format!("{}.{COMMIT_OBJECT_TYPE}", hex::encode(to)))
    }

    /// URL-safe rendering: `+` becomes `_`.
    pub fn url_safe(&self) -> String {
        self.0.replace('+', "_")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn halves(s: &str) -> Option<(&str, &str)> {
    let mut parts = s.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(from), Some(to), None) => Some((from, to)),
        _ => None,
    }
}

fn decode(part: &str) -> Option<Vec<u8>> {
    let normalized = part.replace('/', "").replace('_', "/");
    MODIFIED_BASE64.decode(normalized).ok()
}

impl fmt::Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeltaId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeltaId> for String {
    fn from(d: DeltaId) -> Self {
        d.0
    }
}
