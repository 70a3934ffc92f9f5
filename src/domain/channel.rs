// Channel and channel registry domain models
use crate::domain::error::{CoreError, CoreResult};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Unit label used for channels that carry no physical unit.
pub const DEFAULT_UNIT: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "column_name")]
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub unit: String,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            unit: unit.into(),
        }
    }

    /// Unit used for axis grouping
    pub fn axis_unit(&self) -> &str {
        if self.unit.is_empty() {
            DEFAULT_UNIT
        } else {
            &self.unit
        }
    }
}

/// A selected channel, optionally qualified with the device that owns it.
///
/// Parsed from `device:name` or a bare `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    pub device: Option<String>,
    pub name: String,
}

impl ChannelRef {
    pub fn qualified(device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: Some(device.into()),
            name: name.into(),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            device: None,
            name: name.into(),
        }
    }

    /// Parse a comma separated selection list, ignoring blank entries.
    pub fn parse_list(list: &str) -> CoreResult<Vec<ChannelRef>> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ChannelRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once(':') {
            Some((device, name)) => {
                let (device, name) = (device.trim(), name.trim());
                if device.is_empty() || name.is_empty() {
                    return Err(CoreError::invalid(format!("malformed channel reference '{s}'")));
                }
                Ok(Self::qualified(device, name))
            }
            None if s.is_empty() => Err(CoreError::invalid("empty channel reference")),
            None => Ok(Self::bare(s)),
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}:{}", device, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// How bare channel names that exist in several devices are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// First device in registry order wins.
    #[default]
    FirstMatch,
    /// Ambiguous bare names are rejected.
    Strict,
}

/// A channel reference resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChannel<'a> {
    pub device: &'a str,
    pub channel: &'a Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceChannels {
    pub device: String,
    pub channels: Vec<Channel>,
}

/// Immutable per-session lookup of the channels each device exposes.
///
/// Device order is significant: it decides first-match resolution and the
/// order in which devices are queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    devices: Vec<DeviceChannels>,
}

impl ChannelRegistry {
    pub fn new(devices: Vec<DeviceChannels>) -> Self {
        Self { devices }
    }

    pub fn from_pairs<I, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (D, Vec<Channel>)>,
        D: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(device, channels)| DeviceChannels {
                    device: device.into(),
                    channels,
                })
                .collect(),
        )
    }

    pub fn list_channels(&self, device: &str) -> Option<&[Channel]> {
        self.devices
            .iter()
            .find(|d| d.device == device)
            .map(|d| d.channels.as_slice())
    }

    pub fn all_channels(&self) -> &[DeviceChannels] {
        &self.devices
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.device.as_str())
    }

    pub fn contains_device(&self, device: &str) -> bool {
        self.devices.iter().any(|d| d.device == device)
    }

    /// Flattened channel list across devices, in registry order
    pub fn channels(&self) -> Vec<Channel> {
        self.devices
            .iter()
            .flat_map(|d| d.channels.iter().cloned())
            .collect()
    }

    pub fn devices_containing(&self, name: &str) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| d.channels.iter().any(|c| c.name == name))
            .map(|d| d.device.as_str())
            .collect()
    }

    pub fn resolve(
        &self,
        channel_ref: &ChannelRef,
        policy: ResolutionPolicy,
    ) -> CoreResult<ResolvedChannel<'_>> {
        if let Some(device) = &channel_ref.device {
            let entry = self
                .devices
                .iter()
                .find(|d| &d.device == device)
                .ok_or_else(|| CoreError::invalid(format!("unknown device '{device}'")))?;
            let channel = entry
                .channels
                .iter()
                .find(|c| c.name == channel_ref.name)
                .ok_or_else(|| {
                    CoreError::invalid(format!(
                        "device '{}' has no channel '{}'",
                        device, channel_ref.name
                    ))
                })?;
            return Ok(ResolvedChannel {
                device: &entry.device,
                channel,
            });
        }

        let mut matches = self.devices.iter().filter_map(|d| {
            d.channels
                .iter()
                .find(|c| c.name == channel_ref.name)
                .map(|channel| ResolvedChannel {
                    device: d.device.as_str(),
                    channel,
                })
        });

        let first = matches
            .next()
            .ok_or_else(|| CoreError::invalid(format!("unknown channel '{}'", channel_ref.name)))?;

        if matches.next().is_some() {
            let devices: Vec<String> = self
                .devices_containing(&channel_ref.name)
                .into_iter()
                .map(String::from)
                .collect();
            match policy {
                ResolutionPolicy::Strict => {
                    return Err(CoreError::AmbiguousChannel {
                        name: channel_ref.name.clone(),
                        devices,
                    });
                }
                ResolutionPolicy::FirstMatch => {
                    tracing::warn!(
                        "Channel '{}' exists in {:?}, resolving to '{}'",
                        channel_ref.name,
                        devices,
                        first.device
                    );
                }
            }
        }

        Ok(first)
    }
}

// Serialized as a `device -> [Channel]` object, keeping registry order.
impl Serialize for ChannelRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.devices.len()))?;
        for entry in &self.devices {
            map.serialize_entry(&entry.device, &entry.channels)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChannelRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RegistryVisitor;

        impl<'de> Visitor<'de> for RegistryVisitor {
            type Value = ChannelRegistry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of device names to channel lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut devices = Vec::new();
                while let Some((device, channels)) = access.next_entry::<String, Vec<Channel>>()? {
                    devices.push(DeviceChannels { device, channels });
                }
                Ok(ChannelRegistry::new(devices))
            }
        }

        deserializer.deserialize_map(RegistryVisitor)
    }
}
