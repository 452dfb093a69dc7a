//! Register definition data model.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::decode::decode_record;

/// Modbus register spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegisterType {
    /// Discrete output coils (read/write, 1-bit)
    Coil,
    /// Discrete input contacts (read-only, 1-bit)
    #[serde(alias = "discrete", alias = "discreteinput")]
    DiscreteInput,
    /// Holding registers (read/write, 16-bit)
    Holding,
    /// Input registers (read-only, 16-bit)
    Input,
}

impl RegisterType {
    /// Return the string name for this register type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterType::Coil => "coil",
            RegisterType::DiscreteInput => "discreteInput",
            RegisterType::Holding => "holding",
            RegisterType::Input => "input",
        }
    }
}

/// Operations permitted on a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    ReadWrite,
    Write,
}

impl Access {
    /// Whether the poller may read this register.
    pub fn is_readable(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    /// Whether incoming set requests may write this register.
    pub fn is_writable(&self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Byte/word order override for multi-register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endianness {
    BigEndian,
    LittleEndian,
}

/// Interpretation of the raw register bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Bool,
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    String,
    Ipv4Address,
    MacAddress,
}

impl ValueType {
    /// Number of 16-bit registers a value occupies when no explicit length is given.
    pub fn default_span(&self) -> u32 {
        match self {
            ValueType::Bool
            | ValueType::Uint8
            | ValueType::Int8
            | ValueType::Uint16
            | ValueType::Int16
            | ValueType::String => 1,
            ValueType::Uint32 | ValueType::Int32 | ValueType::Ipv4Address => 2,
            ValueType::MacAddress => 3,
            ValueType::Uint64 | ValueType::Int64 => 4,
        }
    }
}

/// Whether and how a decoded value is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttVisibility {
    Invisible,
    Visible,
    Retained,
}

impl MqttVisibility {
    pub fn is_published(&self) -> bool {
        !matches!(self, MqttVisibility::Invisible)
    }

    pub fn is_retained(&self) -> bool {
        matches!(self, MqttVisibility::Retained)
    }
}

/// One register (or register group) to be polled or written.
///
/// Serializes with the document keys it is decoded from, so a serialized
/// definition decodes back to an equal value. Deserialization goes through
/// the field policy in [`crate::decode`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisterDefinition {
    /// Register offset, unique within a catalog.
    pub address: u64,

    /// Register span when the value occupies more than one register.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    #[serde(rename = "modbustype")]
    pub register_type: RegisterType,

    #[serde(rename = "modbusaccess")]
    pub access: Access,

    /// Absent means device default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endianness: Option<Endianness>,

    #[serde(rename = "valuetype")]
    pub value_type: ValueType,

    /// Multiplicative scale applied after raw decoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(rename = "mqtt")]
    pub mqtt_visibility: MqttVisibility,

    /// Publish on every poll instead of only on change.
    #[serde(rename = "publishalways", skip_serializing_if = "Option::is_none")]
    pub publish_always: Option<bool>,

    /// Minimum seconds between successive polls.
    pub interval: f64,

    pub topic: String,

    pub title: String,
}

impl RegisterDefinition {
    /// True when a factor is set and is not a no-op scale (0 or 1).
    pub fn has_factor(&self) -> bool {
        matches!(self.factor, Some(f) if f != 0.0 && f != 1.0)
    }

    /// Registers spanned by this definition.
    pub fn span(&self) -> u32 {
        self.length.unwrap_or_else(|| self.value_type.default_span())
    }

    /// Poll interval; negative or non-finite intervals poll continuously.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval).unwrap_or(Duration::ZERO)
    }
}

impl<'de> Deserialize<'de> for RegisterDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let record = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        decode_record(&record).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn sample(address: u64) -> RegisterDefinition {
    RegisterDefinition {
        address,
        length: None,
        register_type: RegisterType::Holding,
        access: Access::Read,
        endianness: None,
        value_type: ValueType::Uint16,
        factor: None,
        unit: None,
        mqtt_visibility: MqttVisibility::Visible,
        publish_always: None,
        interval: 10.0,
        topic: format!("inverter/register{}", address),
        title: format!("Register {}", address),
    }
}
