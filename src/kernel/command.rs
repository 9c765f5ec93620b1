//! Structured builders for everything sent to the kernel or to external tools.
//!
//! Control lines are only ever assembled from validated identifiers (see [`crate::ids`]), and
//! external tools are executed with an argument vector, never through a shell.
use std::fmt;
use std::path::Path;

use crate::ids::{ClassId, ClassKind, DeviceName, Weight};

/// A write-only control file of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    CreateTxc,
    CreateVq,
    DeleteTxc,
    DeleteVq,
    SetTxcWeight,
    SetVqWeight,
    AssocTxcVq,
    RecomputeDev,
}

impl Endpoint {
    /// Name of the control file below the module parameter directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Endpoint::CreateTxc => "create_txc",
            Endpoint::CreateVq => "create_vq",
            Endpoint::DeleteTxc => "delete_txc",
            Endpoint::DeleteVq => "delete_vq",
            Endpoint::SetTxcWeight => "set_txc_weight",
            Endpoint::SetVqWeight => "set_vq_weight",
            Endpoint::AssocTxcVq => "assoc_txc_vq",
            Endpoint::RecomputeDev => "recompute_dev",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One line written to one control endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    endpoint: Endpoint,
    line: String,
}

impl ControlCommand {
    /// `dev <device> <class>` to `create_txc` / `create_vq`.
    pub fn create(kind: ClassKind, device: &DeviceName, id: &ClassId) -> Self {
        let endpoint = match kind {
            ClassKind::TxClass => Endpoint::CreateTxc,
            ClassKind::Vq => Endpoint::CreateVq,
        };
        Self {
            endpoint,
            line: format!("dev {device} {id}"),
        }
    }

    /// `dev <device> txc <class>` to `delete_txc`, or `dev <device> vq <class>` to `delete_vq`.
    pub fn delete(kind: ClassKind, device: &DeviceName, id: &ClassId) -> Self {
        let (endpoint, tag) = match kind {
            ClassKind::TxClass => (Endpoint::DeleteTxc, "txc"),
            ClassKind::Vq => (Endpoint::DeleteVq, "vq"),
        };
        Self {
            endpoint,
            line: format!("dev {device} {tag} {id}"),
        }
    }

    /// `dev <device> <class> weight <w>` to `set_txc_weight` / `set_vq_weight`.
    pub fn set_weight(kind: ClassKind, device: &DeviceName, id: &ClassId, weight: Weight) -> Self {
        let endpoint = match kind {
            ClassKind::TxClass => Endpoint::SetTxcWeight,
            ClassKind::Vq => Endpoint::SetVqWeight,
        };
        Self {
            endpoint,
            line: format!("dev {device} {id} weight {weight}"),
        }
    }

    /// `dev <device> associate txc <class> vq <vq>` to `assoc_txc_vq`.
    pub fn associate(device: &DeviceName, txc: &ClassId, vq: &ClassId) -> Self {
        Self {
            endpoint: Endpoint::AssocTxcVq,
            line: format!("dev {device} associate txc {txc} vq {vq}"),
        }
    }

    /// `dev <device>` to `recompute_dev`.
    pub fn recompute(device: &DeviceName) -> Self {
        Self {
            endpoint: Endpoint::RecomputeDev,
            line: format!("dev {device}"),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// The payload without trailing newline.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.line, self.endpoint)
    }
}

/// An external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `insmod <object> [args...]`
    pub fn insmod(object: &Path, args: &[String]) -> Self {
        let mut argv = vec![object.display().to_string()];
        argv.extend(args.iter().cloned());
        Self::new("insmod", argv)
    }

    /// `rmmod <name>`
    pub fn rmmod(name: &str) -> Self {
        Self::new("rmmod", [name])
    }

    /// `tc qdisc add dev <device> root handle 1: <kind>`
    pub fn qdisc_add(device: &DeviceName, kind: &str) -> Self {
        Self::new(
            "tc",
            ["qdisc", "add", "dev", device.as_str(), "root", "handle", "1:", kind],
        )
    }

    /// `tc qdisc del dev <device> root`
    pub fn qdisc_del(device: &DeviceName) -> Self {
        Self::new("tc", ["qdisc", "del", "dev", device.as_str(), "root"])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dev() -> DeviceName {
        DeviceName::new("eth2").unwrap()
    }

    fn class(id: &str) -> ClassId {
        ClassId::new(id).unwrap()
    }

    #[test]
    fn test_control_lines() {
        let id = class("10.0.0.5");
        let cases = [
            (
                ControlCommand::create(ClassKind::TxClass, &dev(), &id),
                Endpoint::CreateTxc,
                "dev eth2 10.0.0.5",
            ),
            (
                ControlCommand::create(ClassKind::Vq, &dev(), &id),
                Endpoint::CreateVq,
                "dev eth2 10.0.0.5",
            ),
            (
                ControlCommand::delete(ClassKind::TxClass, &dev(), &id),
                Endpoint::DeleteTxc,
                "dev eth2 txc 10.0.0.5",
            ),
            (
                ControlCommand::delete(ClassKind::Vq, &dev(), &id),
                Endpoint::DeleteVq,
                "dev eth2 vq 10.0.0.5",
            ),
            (
                ControlCommand::set_weight(ClassKind::Vq, &dev(), &id, Weight::new(4).unwrap()),
                Endpoint::SetVqWeight,
                "dev eth2 10.0.0.5 weight 4",
            ),
            (
                ControlCommand::associate(&dev(), &id, &class("10.0.0.6")),
                Endpoint::AssocTxcVq,
                "dev eth2 associate txc 10.0.0.5 vq 10.0.0.6",
            ),
            (
                ControlCommand::recompute(&dev()),
                Endpoint::RecomputeDev,
                "dev eth2",
            ),
        ];

        for (command, endpoint, line) in cases {
            assert_eq!(command.endpoint(), endpoint);
            assert_eq!(command.line(), line);
        }
    }

    #[test]
    fn test_control_command_display() {
        let command = ControlCommand::recompute(&dev());
        assert_eq!(command.to_string(), "dev eth2 > recompute_dev");
    }

    #[test]
    fn test_external_commands() {
        let insmod = ExternalCommand::insmod(
            &PathBuf::from("/lib/perfiso.ko"),
            &["iso_param_dev=peth2".to_owned()],
        );
        assert_eq!(insmod.program(), "insmod");
        assert_eq!(insmod.args(), ["/lib/perfiso.ko", "iso_param_dev=peth2"]);

        let add = ExternalCommand::qdisc_add(&dev(), "htb");
        assert_eq!(add.to_string(), "tc qdisc add dev eth2 root handle 1: htb");

        let del = ExternalCommand::qdisc_del(&dev());
        assert_eq!(del.to_string(), "tc qdisc del dev eth2 root");

        assert_eq!(ExternalCommand::rmmod("perfiso").to_string(), "rmmod perfiso");
    }
}
