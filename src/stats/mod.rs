//! Structured view of the perfiso stats dump.
//!
//! The module is the only source of truth for which devices, tx classes and vqs exist. A
//! [`Stats`] value is a point-in-time parse of the dump and is never kept across mutations.
use std::fmt;
use std::io::{BufRead, Cursor};
use std::net::Ipv4Addr;

use crate::ids::{ClassId, ClassKind, DeviceName};

mod counters;
mod error;
mod parser;

pub use counters::{ClassCounter, Counters, parse_counters};
pub use error::{Field, ParseError, Result};
pub use parser::parse_stats;

/// A per-destination rate limiter below a tx class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiter {
    pub destination: Ipv4Addr,
    pub rate: u64,
}

/// A tenant's transmit class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxClass {
    pub id: ClassId,
    pub weight: u64,
    pub assoc_vq: Option<ClassId>,
    pub min_rate: u64,
    pub rate: u64,
    pub tx_rate: u64,
    pub rate_limiters: Vec<RateLimiter>,
}

/// A virtual receive queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vq {
    pub id: ClassId,
    pub weight: u64,
    pub rate: u64,
    pub rx_rate: u64,
    pub fb_rate: u64,
    /// Smoothing factor numerator, over 1024.
    pub alpha: u64,
}

/// A network device with the perfiso qdisc attached, as reported by the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: DeviceName,
    pub tx_classes: Vec<TxClass>,
    pub vqs: Vec<Vq>,
}

impl Device {
    pub fn new(name: DeviceName) -> Self {
        Self {
            name,
            tx_classes: Vec::new(),
            vqs: Vec::new(),
        }
    }

    pub fn tx_class(&self, id: &ClassId) -> Option<&TxClass> {
        self.tx_classes.iter().find(|c| &c.id == id)
    }

    pub fn vq(&self, id: &ClassId) -> Option<&Vq> {
        self.vqs.iter().find(|v| &v.id == id)
    }

    pub fn contains(&self, kind: ClassKind, id: &ClassId) -> bool {
        match kind {
            ClassKind::TxClass => self.tx_class(id).is_some(),
            ClassKind::Vq => self.vq(id).is_some(),
        }
    }

    /// Returns true if the device reports at least one tx class or vq.
    pub fn has_state(&self) -> bool {
        !self.tx_classes.is_empty() || !self.vqs.is_empty()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dev {}", self.name)?;
        for txc in &self.tx_classes {
            let assoc = txc.assoc_vq.as_ref().map_or("-", ClassId::as_str);
            writeln!(
                f,
                "  txc {:<20} weight {:<5} assoc {:<20} min_rate {} rate {} tx_rate {}",
                txc.id, txc.weight, assoc, txc.min_rate, txc.rate, txc.tx_rate
            )?;
            for rl in &txc.rate_limiters {
                writeln!(f, "    rl {:<15} rate {}", rl.destination, rl.rate)?;
            }
        }
        for vq in &self.vqs {
            writeln!(
                f,
                "  vq  {:<20} weight {:<5} rate {} rx_rate {} fb_rate {} alpha {}/1024",
                vq.id, vq.weight, vq.rate, vq.rx_rate, vq.fb_rate, vq.alpha
            )?;
        }
        Ok(())
    }
}

/// A parsed stats dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    devices: Vec<Device>,
}

impl Stats {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Ok(Self {
            devices: parse_stats(reader)?,
        })
    }

    pub fn parse(dump: &str) -> Result<Self> {
        Self::from_reader(Cursor::new(dump))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, name: &DeviceName) -> Option<&Device> {
        self.devices.iter().find(|d| &d.name == name)
    }

    /// Restricts the view to one device, or returns every device for `None`.
    pub fn filter(&self, device: Option<&DeviceName>) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| device.is_none_or(|name| &d.name == name))
            .collect()
    }
}
