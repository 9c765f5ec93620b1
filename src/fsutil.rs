use std::fs::{File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use perfiso_ctl::fsutil;
/// let reader = fsutil::open_file_reader("/proc/perfiso_stats")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Opens an already existing file for writing.
///
/// Kernel control and parameter files are never created from userspace, so a missing file
/// is reported instead of silently creating a regular file in its place.
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file does not exist or cannot be opened for writing.
pub fn open_existing_writer(path: impl AsRef<Path>) -> Result<File, FileOpenError> {
    let path = path.as_ref();
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|source| FileOpenError {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads a whole file into a string, mapping a missing file to `Ok(None)`.
pub fn read_optional(path: impl AsRef<Path>) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}
