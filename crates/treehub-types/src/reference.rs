//! Refs: mutable named pointers to commits.
//!
//! Ref names follow git-style conventions so that they stay unambiguous when
//! embedded in URL paths:
//! - Must be non-empty
//! - Must not contain whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[`, `\`
//! - Must not contain `..`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Components between slashes must be non-empty

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::error::TypeError;
use crate::namespace::Namespace;
use crate::object_id::ObjectId;

const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Validated ref name, e.g. `heads/main`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Validate `name` against git-style ref name rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        match check_name(&name) {
            Ok(()) => Ok(Self(name)),
            Err(reason) => Err(TypeError::InvalidRefName { name, reason }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("ref name must not be empty".into());
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(format!("contains forbidden character: {ch:?}"));
    }
    if name.contains("..") {
        return Err("must not contain '..'".into());
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err("must not start or end with '.'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err("must not start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return Err("must not end with '.lock'".into());
    }
    if name.split('/').any(str::is_empty) {
        return Err("path components must not be empty".into());
    }
    Ok(())
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(n: RefName) -> Self {
        n.0
    }
}

/// A named pointer to a commit within a namespace.
///
/// `object_id` is always the derived commit object id of `value`; there is no
/// history, only the current value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub namespace: Namespace,
    pub name: RefName,
    pub value: Commit,
    pub object_id: ObjectId,
}

impl Ref {
    pub fn new(namespace: Namespace, name: RefName, value: Commit) -> Self {
        let object_id = value.to_object_id();
        Self {
            namespace,
            name,
            value,
            object_id,
        }
    }

    /// Check that `object_id` is the one derived from `value`.
    ///
    /// Refs built through [`Ref::new`] always pass; this guards records read
    /// back from storage.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.object_id != self.value.to_object_id() {
            return Err(TypeError::InvalidRef {
                name: self.name.to_string(),
                reason: format!(
                    "object id {} does not match commit {}",
                    self.object_id, self.value
                ),
            });
        }
        Ok(())
    }
}
