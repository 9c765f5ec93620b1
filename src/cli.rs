//! Minimal verb dispatch for the `perfiso-ctl` binary.
use std::io::Write;
use std::path::PathBuf;

use crate::control::ControlPlane;
use crate::error::NonFatalExt;
use crate::ids::{ClassId, CpuMask, DeviceName, RxQueue, Weight};
use crate::kernel::Kernel;

pub const USAGE: &str = "\
usage: perfiso-ctl <command> [args...]

  list [dev]                      show devices, tx classes and vqs
  counters                        show per-class byte counters
  params                          show module parameters
  set <name|index> <value>        set a module parameter
  install <dev>                   load the module and attach the qdisc
  unload                          remove all qdiscs and unload the module
  create-txc <dev> <class>        create a tx class
  create-vq <dev> <class>         create a vq
  delete-txc <dev> <class>        delete a tx class
  delete-vq <dev> <class>         delete a vq
  weight-txc <dev> <class> <w>    set the weight of a tx class
  weight-vq <dev> <class> <w>     set the weight of a vq
  associate <dev> <txc> <vq>      associate a tx class with a vq
  tenant <dev> <class> <w>        create an associated tx class and vq
  recompute <dev>                 recompute the bandwidth shares of a device
  rps <dev>                       show rps masks
  set-rps <dev> <queue> <mask>    set the rps mask of a receive queue
  save <file>                     save the configuration
  load <file>                     replace the configuration";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}\n\n{usage}", usage = USAGE)]
    Usage(String),
    #[error(transparent)]
    InvalidInput(#[from] crate::ids::Error),
    #[error(transparent)]
    Control(#[from] crate::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(Option<DeviceName>),
    Counters,
    Params,
    SetParam { key: String, value: String },
    Install(DeviceName),
    Unload,
    CreateTxc(DeviceName, ClassId),
    CreateVq(DeviceName, ClassId),
    DeleteTxc(DeviceName, ClassId),
    DeleteVq(DeviceName, ClassId),
    WeightTxc(DeviceName, ClassId, Weight),
    WeightVq(DeviceName, ClassId, Weight),
    Associate(DeviceName, ClassId, ClassId),
    Tenant(DeviceName, ClassId, Weight),
    Recompute(DeviceName),
    Rps(DeviceName),
    SetRps(DeviceName, RxQueue, CpuMask),
    Save(PathBuf),
    Load(PathBuf),
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self, Error> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let dev = DeviceName::new;
        let class = ClassId::new;

        let command = match args.as_slice() {
            ["list"] => Command::List(None),
            ["list", d] => Command::List(Some(dev(d)?)),
            ["counters"] => Command::Counters,
            ["params"] => Command::Params,
            ["set", key, value] => Command::SetParam {
                key: (*key).to_owned(),
                value: (*value).to_owned(),
            },
            ["install", d] => Command::Install(dev(d)?),
            ["unload"] => Command::Unload,
            ["create-txc", d, c] => Command::CreateTxc(dev(d)?, class(c)?),
            ["create-vq", d, c] => Command::CreateVq(dev(d)?, class(c)?),
            ["delete-txc", d, c] => Command::DeleteTxc(dev(d)?, class(c)?),
            ["delete-vq", d, c] => Command::DeleteVq(dev(d)?, class(c)?),
            ["weight-txc", d, c, w] => Command::WeightTxc(dev(d)?, class(c)?, w.parse()?),
            ["weight-vq", d, c, w] => Command::WeightVq(dev(d)?, class(c)?, w.parse()?),
            ["associate", d, t, v] => Command::Associate(dev(d)?, class(t)?, class(v)?),
            ["tenant", d, c, w] => Command::Tenant(dev(d)?, class(c)?, w.parse()?),
            ["recompute", d] => Command::Recompute(dev(d)?),
            ["rps", d] => Command::Rps(dev(d)?),
            ["set-rps", d, q, m] => Command::SetRps(dev(d)?, RxQueue::new(q)?, CpuMask::new(m)?),
            ["save", path] => Command::Save(PathBuf::from(path)),
            ["load", path] => Command::Load(PathBuf::from(path)),
            [] => return Err(Error::Usage("missing command".to_owned())),
            [verb, ..] => return Err(Error::Usage(format!("invalid use of `{verb}`"))),
        };
        Ok(command)
    }

    /// Runs the command, printing any listing to `out`.
    ///
    /// Duplicate and missing entities are reported as warnings and do not fail the command.
    pub fn execute<K: Kernel>(
        self,
        plane: &mut ControlPlane<K>,
        out: &mut impl Write,
    ) -> Result<(), Error> {
        match self {
            Command::List(device) => {
                for dev in plane.list(device.as_ref())? {
                    write!(out, "{dev}")?;
                }
            }
            Command::Counters => {
                let counters = plane.counters()?;
                for (dir, list) in [("tx", &counters.tx), ("rx", &counters.rx)] {
                    for counter in list {
                        writeln!(out, "{dir} {:<20} {}", counter.class, counter.bytes)?;
                    }
                }
            }
            Command::Params => write!(out, "{}", plane.params()?)?,
            Command::SetParam { key, value } => {
                plane.set_param(&key, &value)?;
                write!(out, "{}", plane.params()?)?;
            }
            Command::Install(d) => plane.install(&d)?,
            Command::Unload => plane.unload_module()?,
            Command::CreateTxc(d, c) => {
                plane.tx_classes().create(&d, &c).skip_non_fatal()?;
            }
            Command::CreateVq(d, c) => {
                plane.vqs().create(&d, &c).skip_non_fatal()?;
            }
            Command::DeleteTxc(d, c) => {
                plane.tx_classes().delete(&d, &c).skip_non_fatal()?;
            }
            Command::DeleteVq(d, c) => {
                plane.vqs().delete(&d, &c).skip_non_fatal()?;
            }
            Command::WeightTxc(d, c, w) => plane.tx_classes().set_weight(&d, &c, w)?,
            Command::WeightVq(d, c, w) => plane.vqs().set_weight(&d, &c, w)?,
            Command::Associate(d, t, v) => {
                plane.tx_classes().associate(&d, &t, &v).skip_non_fatal()?;
            }
            Command::Tenant(d, c, w) => plane.create_tenant(&d, &c, w)?,
            Command::Recompute(d) => plane.recompute(&d)?,
            Command::Rps(d) => {
                for (queue, mask) in plane.rps(&d)? {
                    writeln!(out, "{queue} {mask}")?;
                }
            }
            Command::SetRps(d, q, m) => plane.set_rps(&d, &q, &m)?,
            Command::Save(path) => {
                plane.save_to(&path)?;
            }
            Command::Load(path) => {
                plane.load_from(&path)?;
            }
        }
        Ok(())
    }
}
