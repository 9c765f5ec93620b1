//! Scalar tunables of the module, one file per parameter.
use std::collections::BTreeMap;
use std::fmt;

use crate::control::ControlPlane;
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// A listing of every parameter with its value, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn read_all(kernel: &impl Kernel) -> Result<Self> {
        Ok(Self {
            entries: kernel.read_params()?,
        })
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Resolves a parameter name, or a 1-based index into this listing, to its name.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        if let Some((name, _)) = self.entries.iter().find(|(n, _)| n == key) {
            return Some(name);
        }
        let idx: usize = key.parse().ok()?;
        self.entries
            .get(idx.checked_sub(1)?)
            .map(|(name, _)| name.as_str())
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().cloned().collect()
    }

    /// Writes one parameter and refreshes the whole listing from the kernel.
    ///
    /// `key` is a parameter name or a 1-based index into the current listing. The value must be
    /// a single token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamWriteFailed`] for an unknown key, an invalid value or a failing write.
    pub fn set(&mut self, kernel: &mut impl Kernel, key: &str, value: &str) -> Result<()> {
        let failed = |reason: &str, source| Error::ParamWriteFailed {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: reason.to_owned(),
            source,
        };

        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(failed("value must be a single token", None));
        }
        let Some(name) = self.resolve(key).map(str::to_owned) else {
            return Err(failed("unknown parameter", None));
        };

        kernel
            .write_param(&name, value)
            .map_err(|source| failed("write rejected", Some(source)))?;
        log::info!("Setting {name} = {value}");

        *self = Self::read_all(&*kernel)?;
        Ok(())
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, value)) in self.entries.iter().enumerate() {
            writeln!(f, "{:>2} {:>40} {:>10}", idx + 1, name, value)?;
        }
        Ok(())
    }
}

impl<K: Kernel> ControlPlane<K> {
    /// The parameter listing of the current session, read on first use.
    pub fn params(&mut self) -> Result<&Params> {
        let params = match self.session.params.take() {
            Some(params) => params,
            None => Params::read_all(&self.kernel)?,
        };
        Ok(self.session.params.insert(params))
    }

    /// Re-reads every parameter, replacing the cached listing.
    pub fn refresh_params(&mut self) -> Result<&Params> {
        let params = Params::read_all(&self.kernel)?;
        Ok(self.session.params.insert(params))
    }

    /// Sets one parameter by name or by 1-based index into the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamWriteFailed`] if the parameters cannot be listed, e.g. because the
    /// module is not loaded, or if [`Params::set`] fails.
    pub fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        let mut params = match self.session.params.take() {
            Some(params) => params,
            None => match self.kernel.read_params() {
                Ok(entries) => Params { entries },
                Err(source) => {
                    return Err(Error::ParamWriteFailed {
                        key: key.to_owned(),
                        value: value.to_owned(),
                        reason: "parameters are unreadable".to_owned(),
                        source: Some(source),
                    });
                }
            },
        };
        let res = params.set(&mut self.kernel, key, value);
        self.session.params = Some(params);
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::kernel::fake::FakeKernel;

    fn plane() -> ControlPlane<FakeKernel> {
        ControlPlane::new(FakeKernel::loaded(), Settings::default())
    }

    #[test]
    fn test_read_all_sorted() {
        let mut plane = plane();
        let params = plane.params().unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params.entries()[0].0, "ISO_FALPHA");
        assert_eq!(params.get("ISO_MAX_TX_RATE"), Some("10000"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_resolve_by_name_and_index() {
        let mut plane = plane();
        let params = plane.params().unwrap();
        assert_eq!(params.resolve("ISO_FALPHA"), Some("ISO_FALPHA"));
        assert_eq!(params.resolve("2"), Some("ISO_MAX_TX_RATE"));
        assert_eq!(params.resolve("0"), None);
        assert_eq!(params.resolve("5"), None);
        assert_eq!(params.resolve("bogus"), None);
    }

    #[test]
    fn test_set_by_index_refreshes() {
        let mut plane = plane();
        plane.set_param("1", "4").unwrap();
        assert_eq!(plane.params().unwrap().get("ISO_FALPHA"), Some("4"));
        assert_eq!(plane.kernel().params["ISO_FALPHA"], "4");
    }

    #[test]
    fn test_set_rejects_unknown_and_invalid() {
        let mut plane = plane();
        let cases = [
            ("ISO_UNKNOWN", "1"),
            ("9", "1"),
            ("ISO_FALPHA", "1 2"),
            ("ISO_FALPHA", ""),
        ];
        for (key, value) in cases {
            let err = plane.set_param(key, value).unwrap_err();
            assert!(matches!(err, Error::ParamWriteFailed { source: None, .. }));
        }
        let err = plane.set_param("ISO_FALPHA", "high").unwrap_err();
        assert!(matches!(err, Error::ParamWriteFailed { source: Some(_), .. }));
        assert_eq!(plane.kernel().params["ISO_FALPHA"], "2");
    }

    #[test]
    fn test_set_without_module_fails_as_param_write() {
        let mut plane = ControlPlane::new(FakeKernel::new(), Settings::default());
        let err = plane.set_param("ISO_FALPHA", "3").unwrap_err();
        assert!(matches!(err, Error::ParamWriteFailed { source: Some(_), .. }));
        assert!(plane.session.params.is_none());
    }

    #[test]
    fn test_display_table() {
        let mut plane = plane();
        let rendered = plane.params().unwrap().to_string();
        let first = rendered.lines().next().unwrap();
        assert_eq!(first, format!(" 1 {:>40} {:>10}", "ISO_FALPHA", "2"));
        assert_eq!(rendered.lines().count(), 4);
    }
}
