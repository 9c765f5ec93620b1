use std::path::PathBuf;

use crate::ids::{self, ClassId, ClassKind, CpuMask, DeviceName, RxQueue};
use crate::kernel::{self, ControlCommand};
use crate::{snapshot, stats};

/// Errors of control plane operations.
///
/// [`Error::DuplicateEntity`] and [`Error::NotFound`] are non-fatal: the requested state either
/// already holds or cannot be acted upon, and no kernel write was issued. Everything else aborts
/// the running operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("perfiso module is not loaded (`{}` is missing)", .path.display())]
    ModuleNotLoaded { path: PathBuf },

    #[error("failed to install {what}")]
    InstallFailed {
        what: String,
        #[source]
        source: Option<kernel::Error>,
    },

    #[error("failed to write `{command}`: {source}")]
    CommandFailure {
        command: ControlCommand,
        #[source]
        source: kernel::Error,
    },

    #[error("{kind} `{id}` already exists on `{device}`")]
    DuplicateEntity {
        kind: ClassKind,
        device: DeviceName,
        id: ClassId,
    },

    #[error("{kind} `{id}` does not exist on `{device}`")]
    NotFound {
        kind: ClassKind,
        device: DeviceName,
        id: ClassId,
    },

    #[error("failed to set parameter `{key}` to `{value}`: {reason}")]
    ParamWriteFailed {
        key: String,
        value: String,
        reason: String,
        #[source]
        source: Option<kernel::Error>,
    },

    #[error("failed to set rps mask of `{device}/{queue}` to `{mask}`: {source}")]
    RpsWriteFailed {
        device: DeviceName,
        queue: RxQueue,
        mask: CpuMask,
        #[source]
        source: kernel::Error,
    },

    #[error("failed to parse stats: {0}")]
    Parse(#[from] stats::ParseError),

    #[error(transparent)]
    Kernel(#[from] kernel::Error),

    #[error(transparent)]
    Snapshot(#[from] snapshot::Error),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] ids::Error),
}

impl Error {
    /// Returns false for errors after which a batch of operations may continue.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::DuplicateEntity { .. } | Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Logs and swallows non-fatal control plane errors.
pub trait NonFatalExt<T> {
    /// Maps a non-fatal error to `Ok(None)` after logging it as a warning.
    fn skip_non_fatal(self) -> Result<Option<T>>;
}

impl<T> NonFatalExt<T> for Result<T> {
    fn skip_non_fatal(self) -> Result<Option<T>> {
        match self {
            Ok(ok) => Ok(Some(ok)),
            Err(err) if !err.is_fatal() => {
                log::warn!("{err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> Error {
        Error::NotFound {
            kind: ClassKind::Vq,
            device: DeviceName::new("eth2").unwrap(),
            id: ClassId::new("7").unwrap(),
        }
    }

    #[test]
    fn test_fatality() {
        assert!(!not_found().is_fatal());
        assert!(
            Error::ModuleNotLoaded {
                path: PathBuf::from("/proc/perfiso_stats")
            }
            .is_fatal()
        );
        assert_eq!(not_found().to_string(), "vq `7` does not exist on `eth2`");
    }

    #[test]
    fn test_skip_non_fatal() {
        let skipped: Result<()> = Err(not_found());
        assert!(skipped.skip_non_fatal().unwrap().is_none());

        let kept: Result<u8> = Ok(3);
        assert_eq!(kept.skip_non_fatal().unwrap(), Some(3));

        let fatal: Result<()> = Err(Error::InstallFailed {
            what: "qdisc on `eth2`".to_owned(),
            source: None,
        });
        assert!(fatal.skip_non_fatal().is_err());
    }
}
