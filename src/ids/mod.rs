//! Validated identifiers that end up in control writes and external command arguments.
//!
//! Every value that reaches the kernel's control files or an `insmod`/`tc` argv goes through
//! one of these types first. A control line is a whitespace separated token list, so an
//! identifier containing whitespace could smuggle extra operands into the command; the
//! constructors reject such input instead of escaping it.
use std::borrow::Borrow;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// Maximum length of a network interface name (`IFNAMSIZ - 1`).
const DEVICE_NAME_MAX_LEN: usize = 15;

/// The kernel renders class ids into a 128 byte buffer, including the terminating NUL.
const CLASS_ID_MAX_LEN: usize = 127;

/// Returns true if `src` is a single non-empty token of printable, non-whitespace ASCII.
fn is_token(src: &str) -> bool {
    !src.is_empty() && src.bytes().all(|b| b.is_ascii_graphic())
}

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }
    };
}

/// The two per-tenant object kinds the module manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Transmit class.
    TxClass,
    /// Virtual receive queue.
    Vq,
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassKind::TxClass => "tx class",
            ClassKind::Vq => "vq",
        };
        write!(f, "{name}")
    }
}

/// A validated network interface name, e.g. `eth2`.
///
/// # Examples
///
/// ```
/// # use perfiso_ctl::ids::DeviceName;
/// let dev = DeviceName::new("eth2").unwrap();
/// assert_eq!(dev.as_str(), "eth2");
/// assert!(DeviceName::new("eth2 txc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(Arc<str>);

impl DeviceName {
    /// Creates a new `DeviceName`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeviceName`] if the name is empty, longer than 15 bytes, contains
    /// whitespace, control characters or `/`, or is `.` / `..`.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.len() > DEVICE_NAME_MAX_LEN
            || !is_token(src)
            || src.contains('/')
            || src == "."
            || src == ".."
        {
            return Err(Error::InvalidDeviceName(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

string_id!(DeviceName);

/// A validated tenant class identifier, e.g. an IPv4 address or a traffic mark value.
///
/// The same type names tx classes and vqs; which one is meant depends on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClassId(Arc<str>);

impl ClassId {
    /// Creates a new `ClassId`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClassId`] if the id is empty, longer than 127 bytes or contains
    /// anything but printable, non-whitespace ASCII.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.len() > CLASS_ID_MAX_LEN || !is_token(src) {
            return Err(Error::InvalidClassId(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

string_id!(ClassId);

/// A relative bandwidth share. Always strictly positive.
///
/// # Examples
///
/// ```
/// # use perfiso_ctl::ids::Weight;
/// assert_eq!(Weight::new(4).unwrap().get(), 4);
/// assert!(Weight::new(0).is_err());
/// assert!("-1".parse::<Weight>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Weight(NonZeroU32);

impl Weight {
    /// Creates a new `Weight`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWeight`] if `raw` is zero, negative or does not fit into `u32`.
    pub fn new(raw: i64) -> Result<Self> {
        u32::try_from(raw)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| Error::InvalidWeight(raw.to_string()))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<i64> for Weight {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<u64> for Weight {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| Error::InvalidWeight(value.to_string()))
    }
}

impl From<Weight> for u32 {
    fn from(value: Weight) -> Self {
        value.get()
    }
}

impl FromStr for Weight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::InvalidWeight(s.to_owned()))?;
        Self::new(raw)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A receive queue of a device, always in its sysfs form `rx-<n>`.
///
/// Queues order by their number, so `rx-2` sorts before `rx-10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RxQueue {
    name: Arc<str>,
    index: u32,
}

impl RxQueue {
    /// Creates a new `RxQueue` from either a bare queue number (`3`) or its sysfs name (`rx-3`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRxQueue`] for anything else.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        let number = src.strip_prefix("rx-").unwrap_or(src);
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidRxQueue(src.to_owned()));
        }
        let index = number
            .parse::<u32>()
            .map_err(|_| Error::InvalidRxQueue(src.to_owned()))?;

        Ok(Self {
            name: format!("rx-{index}").into(),
            index,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl PartialOrd for RxQueue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RxQueue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl AsRef<str> for RxQueue {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RxQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for RxQueue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RxQueue {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RxQueue> for String {
    fn from(value: RxQueue) -> Self {
        value.name.to_string()
    }
}

/// A receive packet steering cpu bitmap as accepted by `rps_cpus`.
///
/// Examples are `ff` and `00000000,0000000f`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CpuMask(Arc<str>);

impl CpuMask {
    /// Creates a new `CpuMask`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCpuMask`] if the mask is empty or contains anything but hex digits
    /// and commas.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref().trim();
        if src.is_empty() || !src.bytes().all(|b| b.is_ascii_hexdigit() || b == b',') {
            return Err(Error::InvalidCpuMask(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

string_id!(CpuMask);
