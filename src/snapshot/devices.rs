//! Per-device configuration kept in document order.
use std::fmt;
use std::slice;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::DeviceConfig;
use crate::ids::DeviceName;

/// The `config` object of a snapshot.
///
/// Serialized as a JSON object; devices keep the order in which they were inserted or appear in
/// the document, and load replays them in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfigs {
    entries: Vec<(DeviceName, DeviceConfig)>,
}

impl DeviceConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, device: &DeviceName) -> Option<&DeviceConfig> {
        self.entries
            .iter()
            .find(|(name, _)| name == device)
            .map(|(_, config)| config)
    }

    pub fn contains_key(&self, device: &DeviceName) -> bool {
        self.get(device).is_some()
    }

    /// Appends `device`, or replaces its configuration in place if it is already present.
    pub fn insert(&mut self, device: DeviceName, config: DeviceConfig) -> Option<DeviceConfig> {
        match self.entries.iter_mut().find(|(name, _)| *name == device) {
            Some((_, slot)) => Some(std::mem::replace(slot, config)),
            None => {
                self.entries.push((device, config));
                None
            }
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        let split: SplitEntry = |(name, config)| (name, config);
        self.entries.iter().map(split)
    }
}

type SplitEntry = fn(&(DeviceName, DeviceConfig)) -> (&DeviceName, &DeviceConfig);

pub type Iter<'a> = std::iter::Map<slice::Iter<'a, (DeviceName, DeviceConfig)>, SplitEntry>;

impl<'a> IntoIterator for &'a DeviceConfigs {
    type Item = (&'a DeviceName, &'a DeviceConfig);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for DeviceConfigs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (device, config) in &self.entries {
            map.serialize_entry(device, config)?;
        }
        map.end()
    }
}

struct DeviceConfigsVisitor;

impl<'de> Visitor<'de> for DeviceConfigsVisitor {
    type Value = DeviceConfigs;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from device name to its tx classes and vqs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut configs = DeviceConfigs::new();
        while let Some((device, config)) = access.next_entry::<DeviceName, DeviceConfig>()? {
            if configs.contains_key(&device) {
                return Err(de::Error::custom(format!("device `{device}` is listed twice")));
            }
            configs.entries.push((device, config));
        }
        Ok(configs)
    }
}

impl<'de> Deserialize<'de> for DeviceConfigs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DeviceConfigsVisitor)
    }
}
