//! In-memory stand-in for the perfiso module, used by unit tests across the crate.
//!
//! It renders a stats dump from its state in the same format the module uses, validates
//! control writes the way the module's store handlers do, and records every write and external
//! command it receives.
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use super::{ControlCommand, Endpoint, Error, ExternalCommand, Kernel, Result};
use crate::ids::{CpuMask, DeviceName, RxQueue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FakeClass {
    pub id: String,
    pub weight: u64,
    pub assoc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FakeDevice {
    pub name: String,
    pub txcs: Vec<FakeClass>,
    pub vqs: Vec<FakeClass>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeKernel {
    pub loaded: bool,
    pub devices: Vec<FakeDevice>,
    pub params: BTreeMap<String, String>,
    pub rps: BTreeMap<(String, String), String>,
    /// Every attempted control write as `<endpoint>: <line>`.
    pub control_log: Vec<String>,
    /// Every attempted external command.
    pub exec_log: Vec<String>,
    /// Control writes to this endpoint fail.
    pub fail_endpoint: Option<Endpoint>,
    /// External commands running this program fail.
    pub fail_program: Option<String>,
    /// `tc qdisc add` exits successfully without attaching anything.
    pub detached_qdisc: bool,
}

fn default_params() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ISO_FALPHA".to_owned(), "2".to_owned()),
        ("ISO_MAX_TX_RATE".to_owned(), "10000".to_owned()),
        ("ISO_VQ_DRAIN_RATE_MBPS".to_owned(), "9000".to_owned()),
        ("IsoGlobalEnabled".to_owned(), "0".to_owned()),
    ])
}

fn rejected(endpoint: Endpoint, kind: io::ErrorKind, msg: &str) -> Error {
    Error::Write {
        path: PathBuf::from(endpoint.file_name()),
        source: io::Error::new(kind, msg.to_owned()),
    }
}

fn failed(command: &ExternalCommand, stderr: &str) -> Error {
    Error::CommandStatus {
        command: command.to_string(),
        status: "exit status: 1".to_owned(),
        stderr: stderr.to_owned(),
    }
}

impl FakeKernel {
    /// A kernel without the module loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// A kernel with the module loaded and no devices installed.
    pub fn loaded() -> Self {
        Self {
            loaded: true,
            params: default_params(),
            ..Self::default()
        }
    }

    /// A loaded kernel with the given devices already carrying a qdisc.
    pub fn with_devices(names: &[&str]) -> Self {
        let mut kernel = Self::loaded();
        for name in names {
            kernel.devices.push(FakeDevice {
                name: (*name).to_owned(),
                ..FakeDevice::default()
            });
        }
        kernel
    }

    pub fn device(&self, name: &str) -> Option<&FakeDevice> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Number of control writes attempted so far.
    pub fn writes(&self) -> usize {
        self.control_log.len()
    }

    fn device_mut(&mut self, name: &str) -> Option<&mut FakeDevice> {
        self.devices.iter_mut().find(|d| d.name == name)
    }

    fn render_stats(&self) -> String {
        let mut out = String::new();
        for dev in &self.devices {
            out.push_str(&format!("tx->dev {}, tx_rate 0, rate 10000\n", dev.name));
            for txc in &dev.txcs {
                out.push_str(&format!(
                    "txc class {}   weight {}   assoc vq {}   refcnt 1\n",
                    txc.id,
                    txc.weight,
                    txc.assoc.as_deref().unwrap_or("-")
                ));
                out.push_str("txc rl xmit tx_rate:0, rate 10000, min_rate 0\n");
                out.push_str("rate limiters:\n");
            }
        }
        for dev in &self.devices {
            out.push_str(&format!("\nvqs {}\n", dev.name));
            for vq in &dev.vqs {
                out.push_str(&format!(
                    "vq class {}   flags 1,1,0   rate 10000  rx_rate 0  fb_rate 0  \
                     alpha 0/1024   backlog 0   weight {}   refcnt 1   tokens 0\n",
                    vq.id, vq.weight
                ));
                out.push_str("\t cpu   enqueued   network-mark   rx\n");
            }
        }
        out
    }

    fn apply_control(&mut self, endpoint: Endpoint, tokens: &[&str]) -> Result<()> {
        let invalid = |msg: &str| rejected(endpoint, io::ErrorKind::InvalidInput, msg);
        let ["dev", device, rest @ ..] = tokens else {
            return Err(invalid("expected `dev <device>`"));
        };
        let Some(dev) = self.device_mut(device) else {
            return Err(invalid("unknown device"));
        };

        let find = |list: &[FakeClass], id: &str| list.iter().position(|c| c.id == id);
        match (endpoint, rest) {
            (Endpoint::CreateTxc, [id]) | (Endpoint::CreateVq, [id]) => {
                let list = if endpoint == Endpoint::CreateTxc {
                    &mut dev.txcs
                } else {
                    &mut dev.vqs
                };
                if find(list, id).is_some() {
                    return Err(invalid("class exists"));
                }
                list.push(FakeClass {
                    id: (*id).to_owned(),
                    weight: 1,
                    assoc: None,
                });
            }
            (Endpoint::DeleteTxc, ["txc", id]) => {
                let idx = find(&dev.txcs, id).ok_or_else(|| invalid("no such txc"))?;
                dev.txcs.remove(idx);
            }
            (Endpoint::DeleteVq, ["vq", id]) => {
                let idx = find(&dev.vqs, id).ok_or_else(|| invalid("no such vq"))?;
                dev.vqs.remove(idx);
                for txc in dev.txcs.iter_mut() {
                    if txc.assoc.as_deref() == Some(*id) {
                        txc.assoc = None;
                    }
                }
            }
            (Endpoint::SetTxcWeight | Endpoint::SetVqWeight, [id, "weight", w]) => {
                let weight = w.parse::<u64>().map_err(|_| invalid("bad weight"))?;
                let list = if endpoint == Endpoint::SetTxcWeight {
                    &mut dev.txcs
                } else {
                    &mut dev.vqs
                };
                let idx = find(list, id).ok_or_else(|| invalid("no such class"))?;
                list[idx].weight = weight;
            }
            (Endpoint::AssocTxcVq, ["associate", "txc", txc, "vq", vq]) => {
                if find(&dev.vqs, vq).is_none() {
                    return Err(invalid("no such vq"));
                }
                let idx = find(&dev.txcs, txc).ok_or_else(|| invalid("no such txc"))?;
                dev.txcs[idx].assoc = Some((*vq).to_owned());
            }
            (Endpoint::RecomputeDev, []) => {}
            _ => return Err(invalid("malformed command")),
        }
        Ok(())
    }
}

impl Kernel for FakeKernel {
    fn read_stats(&self) -> Result<Option<String>> {
        Ok(self.loaded.then(|| self.render_stats()))
    }

    fn read_counters(&self) -> Result<Option<String>> {
        if !self.loaded {
            return Ok(None);
        }
        let mut out = String::new();
        for dev in &self.devices {
            for txc in &dev.txcs {
                out.push_str(&format!("tx,{},{}\n", txc.id, 1000 * txc.weight));
            }
        }
        for dev in &self.devices {
            for vq in &dev.vqs {
                out.push_str(&format!("rx,{},{}\n", vq.id, 500 * vq.weight));
            }
        }
        Ok(Some(out))
    }

    fn write_control(&mut self, command: &ControlCommand) -> Result<()> {
        let endpoint = command.endpoint();
        self.control_log
            .push(format!("{}: {}", endpoint.file_name(), command.line()));
        if !self.loaded {
            return Err(rejected(endpoint, io::ErrorKind::NotFound, "module not loaded"));
        }
        if self.fail_endpoint == Some(endpoint) {
            return Err(rejected(endpoint, io::ErrorKind::Other, "injected failure"));
        }
        let tokens: Vec<&str> = command.line().split_whitespace().collect();
        self.apply_control(endpoint, &tokens)
    }

    fn read_params(&self) -> Result<Vec<(String, String)>> {
        if !self.loaded {
            return Err(Error::ReadDir {
                path: PathBuf::from("perfiso"),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        Ok(self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_param(&mut self, name: &str, value: &str) -> Result<()> {
        let write_err = |kind: io::ErrorKind| Error::Write {
            path: PathBuf::from(name),
            source: io::Error::from(kind),
        };
        if !self.loaded {
            return Err(write_err(io::ErrorKind::NotFound));
        }
        value
            .parse::<i64>()
            .map_err(|_| write_err(io::ErrorKind::InvalidInput))?;
        let slot = self
            .params
            .get_mut(name)
            .ok_or_else(|| write_err(io::ErrorKind::NotFound))?;
        *slot = value.to_owned();
        Ok(())
    }

    fn read_rps(&self, device: &DeviceName) -> Result<Vec<(RxQueue, CpuMask)>> {
        Ok(self
            .rps
            .iter()
            .filter(|((dev, _), _)| *dev == device.to_string())
            .filter_map(|((_, queue), mask)| {
                Some((RxQueue::new(queue).ok()?, CpuMask::new(mask).ok()?))
            })
            .collect())
    }

    fn write_rps(&mut self, device: &DeviceName, queue: &RxQueue, mask: &CpuMask) -> Result<()> {
        let key = (device.to_string(), queue.to_string());
        let slot = self.rps.get_mut(&key).ok_or_else(|| Error::Write {
            path: PathBuf::from(format!("{device}/queues/{queue}/rps_cpus")),
            source: io::Error::from(io::ErrorKind::NotFound),
        })?;
        *slot = mask.to_string();
        Ok(())
    }

    fn exec(&mut self, command: &ExternalCommand) -> Result<()> {
        self.exec_log.push(command.to_string());
        if self.fail_program.as_deref() == Some(command.program()) {
            return Err(failed(command, "injected failure"));
        }

        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
        match (command.program(), args.as_slice()) {
            ("insmod", [_object, ..]) => {
                if self.loaded {
                    return Err(failed(command, "File exists"));
                }
                self.loaded = true;
                self.params = default_params();
            }
            ("rmmod", [_name]) => {
                if !self.loaded {
                    return Err(failed(command, "Module perfiso is not currently loaded"));
                }
                self.loaded = false;
                self.devices.clear();
                self.params.clear();
            }
            ("tc", ["qdisc", "add", "dev", device, "root", ..]) => {
                if !self.loaded || self.device(device).is_some() {
                    return Err(failed(command, "RTNETLINK answers: File exists"));
                }
                if self.detached_qdisc {
                    return Ok(());
                }
                self.devices.push(FakeDevice {
                    name: (*device).to_owned(),
                    ..FakeDevice::default()
                });
            }
            ("tc", ["qdisc", "del", "dev", device, "root"]) => {
                let before = self.devices.len();
                self.devices.retain(|d| d.name != *device);
                if before == self.devices.len() {
                    return Err(failed(command, "RTNETLINK answers: No such file or directory"));
                }
            }
            _ => return Err(failed(command, "unsupported command")),
        }
        Ok(())
    }
}
