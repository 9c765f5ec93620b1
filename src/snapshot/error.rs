use std::path::PathBuf;

use crate::fsutil;
use crate::ids::{ClassId, ClassKind, DeviceName};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    FileOpen(#[from] fsutil::FileOpenError),
    #[error("failed to create snapshot file `{}`: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid snapshot: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("failed to write snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("{kind} `{id}` is listed twice for `{device}`")]
    DuplicateClass {
        kind: ClassKind,
        device: DeviceName,
        id: ClassId,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
