//! Persisted configuration: parameters, per-device tx classes and vqs, and RPS masks.
//!
//! The document is JSON:
//!
//! ```json
//! {
//!   "version": 1,
//!   "params": { "ISO_FALPHA": "2" },
//!   "config": {
//!     "eth2": {
//!       "txcs": [{ "class": "10.0.0.5", "weight": 4, "assoc": "10.0.0.5" }],
//!       "vqs": [{ "class": "10.0.0.5", "weight": 4 }]
//!     }
//!   },
//!   "rps": { "eth2": { "rx-0": "f" } }
//! }
//! ```
//!
//! Observed rates are never part of a snapshot.
use std::collections::{BTreeMap, HashSet};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fsutil;
use crate::ids::{ClassId, ClassKind, CpuMask, DeviceName, RxQueue, Weight};

mod devices;
mod error;
mod store;

pub use devices::DeviceConfigs;
pub use error::{Error, Result};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TxClassConfig {
    pub class: ClassId,
    pub weight: Weight,
    #[serde(default)]
    pub assoc: Option<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VqConfig {
    pub class: ClassId,
    pub weight: Weight,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default)]
    pub txcs: Vec<TxClassConfig>,
    #[serde(default)]
    pub vqs: Vec<VqConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub config: DeviceConfigs,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rps: BTreeMap<DeviceName, BTreeMap<RxQueue, CpuMask>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            params: BTreeMap::new(),
            config: DeviceConfigs::new(),
            rps: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Checks the version and that no class is listed twice for a device.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        for (device, config) in &self.config {
            let txcs = config.txcs.iter().map(|c| &c.class);
            let vqs = config.vqs.iter().map(|c| &c.class);
            check_unique(ClassKind::TxClass, device, txcs)?;
            check_unique(ClassKind::Vq, device, vqs)?;
        }
        Ok(())
    }

    /// Reads and validates a snapshot document.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let snapshot: Self = serde_json::from_reader(reader).map_err(Error::Deserialize)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Writes the snapshot as pretty printed JSON followed by a newline.
    pub fn to_writer(&self, mut writer: impl Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self).map_err(Error::Serialize)?;
        writer
            .write_all(b"\n")
            .map_err(|err| Error::Serialize(serde_json::Error::io(err)))
    }
}

fn check_unique<'a>(
    kind: ClassKind,
    device: &DeviceName,
    ids: impl Iterator<Item = &'a ClassId>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::DuplicateClass {
                kind,
                device: device.clone(),
                id: id.clone(),
            });
        }
    }
    Ok(())
}

/// Reads a snapshot file.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Snapshot> {
    let reader = fsutil::open_file_reader(path)?;
    Snapshot::from_reader(reader)
}

/// Writes a snapshot file, replacing any existing one.
pub fn write_snapshot(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| Error::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    snapshot.to_writer(&mut writer)?;
    writer
        .flush()
        .map_err(|source| Error::Create {
            path: path.to_path_buf(),
            source,
        })
}
