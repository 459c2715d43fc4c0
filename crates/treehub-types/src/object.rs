use std::fmt;

use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;
use crate::object_id::ObjectId;

/// Upload status of an object's metadata record.
///
/// Transitions are monotonic: `ServerUploading` → `Uploaded`, never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectStatus {
    /// Record registered, blob write in progress (or abandoned).
    ServerUploading,
    /// Blob written and record committed.
    Uploaded,
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerUploading => write!(f, "SERVER_UPLOADING"),
            Self::Uploaded => write!(f, "UPLOADED"),
        }
    }
}

/// Metadata record of a stored object.
///
/// The record is authoritative for logical existence: blob bytes without a
/// record do not make an object exist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub namespace: Namespace,
    pub id: ObjectId,
    /// Declared size while uploading, actual written size once uploaded.
    pub byte_size: u64,
    pub status: ObjectStatus,
}

impl Object {
    /// A freshly registered record for an upload that is about to start.
    pub fn uploading(namespace: Namespace, id: ObjectId, byte_size: u64) -> Self {
        Self {
            namespace,
            id,
            byte_size,
            status: ObjectStatus::ServerUploading,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == ObjectStatus::Uploaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&ObjectStatus::ServerUploading).unwrap();
        assert_eq!(json, "\"SERVER_UPLOADING\"");
        assert_eq!(format!("{}", ObjectStatus::Uploaded), "UPLOADED");
    }

    #[test]
    fn uploading_record() {
        let id = ObjectId::new(format!("{}.dirtree", "a".repeat(64))).unwrap();
        let obj = Object::uploading(Namespace::new("t1"), id, 42);
        assert_eq!(obj.status, ObjectStatus::ServerUploading);
        assert!(!obj.is_uploaded());
    }
}
