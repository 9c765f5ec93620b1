use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use super::{ControlCommand, Error, ExternalCommand, Kernel, Result};
use crate::config::KernelPaths;
use crate::fsutil;
use crate::ids::{CpuMask, DeviceName, RxQueue};

/// [`Kernel`] implementation backed by the real procfs/sysfs files of the module.
#[derive(Debug, Clone)]
pub struct ProcfsKernel {
    paths: KernelPaths,
}

impl ProcfsKernel {
    pub fn new(paths: KernelPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &KernelPaths {
        &self.paths
    }

    fn queues_dir(&self, device: &DeviceName) -> std::path::PathBuf {
        self.paths
            .net_class_dir
            .join(device.as_str())
            .join("queues")
    }
}

/// Writes `line` followed by a newline to an existing file in a single write.
fn write_line(path: &Path, line: &str) -> Result<()> {
    let mut file = fsutil::open_existing_writer(path)?;
    file.write_all(format!("{line}\n").as_bytes())
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    fsutil::read_optional(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_trimmed(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|content| content.trim().to_owned())
        .map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })
}

impl Kernel for ProcfsKernel {
    fn read_stats(&self) -> Result<Option<String>> {
        read_optional(&self.paths.stats_file)
    }

    fn read_counters(&self) -> Result<Option<String>> {
        read_optional(&self.paths.counters_file)
    }

    fn write_control(&mut self, command: &ControlCommand) -> Result<()> {
        let path = self.paths.control_dir.join(command.endpoint().file_name());
        log::debug!("echo {} > {}", command.line(), path.display());
        write_line(&path, command.line())
    }

    fn read_params(&self) -> Result<Vec<(String, String)>> {
        let dir = &self.paths.params_dir;
        let read_dir_err = |source| Error::ReadDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut params = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            if !entry.file_type().map_err(read_dir_err)?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let value = read_trimmed(&entry.path())?;
            params.push((name, value));
        }
        params.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(params)
    }

    fn write_param(&mut self, name: &str, value: &str) -> Result<()> {
        let path = self.paths.params_dir.join(name);
        log::debug!("echo {} > {}", value, path.display());
        write_line(&path, value)
    }

    fn read_rps(&self, device: &DeviceName) -> Result<Vec<(RxQueue, CpuMask)>> {
        let dir = self.queues_dir(device);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::ReadDir { path: dir, source }),
        };

        let mut masks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::ReadDir {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(queue) = name
                .to_str()
                .filter(|n| n.starts_with("rx-"))
                .and_then(|n| RxQueue::new(n).ok())
            else {
                continue;
            };
            let Some(raw) = read_optional(&entry.path().join("rps_cpus"))? else {
                continue;
            };
            match CpuMask::new(&raw) {
                Ok(mask) => masks.push((queue, mask)),
                Err(err) => log::debug!("Ignoring rps_cpus of `{device}/{queue}`: {err}"),
            }
        }
        masks.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(masks)
    }

    fn write_rps(&mut self, device: &DeviceName, queue: &RxQueue, mask: &CpuMask) -> Result<()> {
        let path = self.queues_dir(device).join(queue.as_str()).join("rps_cpus");
        log::debug!("echo {} > {}", mask, path.display());
        write_line(&path, mask.as_str())
    }

    fn exec(&mut self, command: &ExternalCommand) -> Result<()> {
        log::debug!("Running `{command}`");
        let output = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            log::debug!("`{command}` returned {}: {stderr}", output.status);
            return Err(Error::CommandStatus {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(())
    }
}
