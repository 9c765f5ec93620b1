//! Runtime settings: where the module exposes its files and how it is (re)loaded.
//!
//! Every value has a default matching a stock perfiso installation and can be overridden
//! through an environment variable, see [`Settings::from_env`].
use std::ffi::OsString;
use std::path::PathBuf;

const ENV_STATS_FILE: &str = "PERFISO_STATS_FILE";
const ENV_COUNTERS_FILE: &str = "PERFISO_COUNTERS_FILE";
const ENV_PARAMS_DIR: &str = "PERFISO_PARAMS_DIR";
const ENV_CONTROL_DIR: &str = "PERFISO_CONTROL_DIR";
const ENV_NET_CLASS_DIR: &str = "PERFISO_NET_CLASS_DIR";
const ENV_MODULE_NAME: &str = "PERFISO_MODULE_NAME";
const ENV_MODULE_PATH: &str = "PERFISO_MODULE_PATH";
const ENV_MODULE_ARGS: &str = "PERFISO_MODULE_ARGS";
const ENV_QDISC: &str = "PERFISO_QDISC";

/// Host paths of the files the module exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelPaths {
    /// Human readable stats dump, absent while the module is not loaded.
    pub stats_file: PathBuf,
    /// CSV byte counters per class.
    pub counters_file: PathBuf,
    /// One sysctl file per scalar parameter.
    pub params_dir: PathBuf,
    /// Write-only control endpoints (`create_txc`, `assoc_txc_vq`, ...).
    pub control_dir: PathBuf,
    /// Root of the per-interface sysfs tree, used for RPS masks.
    pub net_class_dir: PathBuf,
}

impl Default for KernelPaths {
    fn default() -> Self {
        Self {
            stats_file: PathBuf::from("/proc/perfiso_stats"),
            counters_file: PathBuf::from("/proc/perfiso_csvstats"),
            params_dir: PathBuf::from("/proc/sys/perfiso"),
            control_dir: PathBuf::from("/sys/module/perfiso/parameters"),
            net_class_dir: PathBuf::from("/sys/class/net"),
        }
    }
}

impl KernelPaths {
    /// Places every file below `root`, mirroring the host layout. Handy for tests and chroots.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        let rebase = |path: PathBuf| root.join(path.strip_prefix("/").unwrap_or(&path));
        Self {
            stats_file: rebase(defaults.stats_file),
            counters_file: rebase(defaults.counters_file),
            params_dir: rebase(defaults.params_dir),
            control_dir: rebase(defaults.control_dir),
            net_class_dir: rebase(defaults.net_class_dir),
        }
    }
}

/// How to load and unload the kernel module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSettings {
    /// Name passed to `rmmod`.
    pub name: String,
    /// Object file passed to `insmod`.
    pub object_path: PathBuf,
    /// Extra `key=value` module arguments passed to `insmod`.
    pub args: Vec<String>,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            name: "perfiso".to_owned(),
            object_path: PathBuf::from("./perfiso.ko"),
            args: Vec::new(),
        }
    }
}

/// Complete runtime configuration of the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub paths: KernelPaths,
    pub module: ModuleSettings,
    /// Kind of the root qdisc attached to a device on install.
    pub qdisc_kind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: KernelPaths::default(),
            module: ModuleSettings::default(),
            qdisc_kind: "htb".to_owned(),
        }
    }
}

impl Settings {
    /// Builds settings from the process environment, falling back to defaults.
    ///
    /// Recognized variables: `PERFISO_STATS_FILE`, `PERFISO_COUNTERS_FILE`,
    /// `PERFISO_PARAMS_DIR`, `PERFISO_CONTROL_DIR`, `PERFISO_NET_CLASS_DIR`,
    /// `PERFISO_MODULE_NAME`, `PERFISO_MODULE_PATH`, `PERFISO_MODULE_ARGS` (whitespace
    /// separated) and `PERFISO_QDISC`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut settings = Self::default();
        let path = |key: &str, target: &mut PathBuf| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = PathBuf::from(value);
            }
        };
        path(ENV_STATS_FILE, &mut settings.paths.stats_file);
        path(ENV_COUNTERS_FILE, &mut settings.paths.counters_file);
        path(ENV_PARAMS_DIR, &mut settings.paths.params_dir);
        path(ENV_CONTROL_DIR, &mut settings.paths.control_dir);
        path(ENV_NET_CLASS_DIR, &mut settings.paths.net_class_dir);
        path(ENV_MODULE_PATH, &mut settings.module.object_path);

        let string = |key: &str| {
            lookup(key)
                .map(|v| v.to_string_lossy().trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        if let Some(name) = string(ENV_MODULE_NAME) {
            settings.module.name = name;
        }
        if let Some(args) = string(ENV_MODULE_ARGS) {
            settings.module.args = args.split_whitespace().map(str::to_owned).collect();
        }
        if let Some(kind) = string(ENV_QDISC) {
            settings.qdisc_kind = kind;
        }

        log::debug!("Settings: {settings:?}");
        settings
    }
}
