//! Field-level decoding of register definition records.
//!
//! Every document key has a [`Presence`] in a single policy table
//! ([`Field::presence`]). Required fields abort the record when they are
//! missing or malformed; optional fields degrade to `None`. [`RecordReader`]
//! applies that table uniformly, so the decoder itself only names fields.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::definition::RegisterDefinition;

/// Errors produced while decoding a single record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A string address that is neither `0x`-prefixed hex nor decimal.
    #[error("Corrupted {field}: could not decode string '{literal}' as integer")]
    CorruptedAddress { field: &'static str, literal: String },

    /// A required field is absent or null.
    #[error("Missing required field '{field}'")]
    Missing { field: &'static str },

    /// A required field is present but has the wrong type or value.
    #[error("Invalid field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The record is not a JSON object.
    #[error("Record is not an object")]
    NotARecord,
}

/// Whether a field must decode for the record to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    /// Missing or malformed values become `None`.
    Optional,
}

/// Document keys of a register definition record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Address,
    Length,
    RegisterType,
    Access,
    Endianness,
    ValueType,
    Factor,
    Unit,
    MqttVisibility,
    PublishAlways,
    Interval,
    Topic,
    Title,
    NextReadDate,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Address,
        Field::Length,
        Field::RegisterType,
        Field::Access,
        Field::Endianness,
        Field::ValueType,
        Field::Factor,
        Field::Unit,
        Field::MqttVisibility,
        Field::PublishAlways,
        Field::Interval,
        Field::Topic,
        Field::Title,
        Field::NextReadDate,
    ];

    /// Key of this field in the definitions document.
    pub fn key(&self) -> &'static str {
        match self {
            Field::Address => "address",
            Field::Length => "length",
            Field::RegisterType => "modbustype",
            Field::Access => "modbusaccess",
            Field::Endianness => "endianness",
            Field::ValueType => "valuetype",
            Field::Factor => "factor",
            Field::Unit => "unit",
            Field::MqttVisibility => "mqtt",
            Field::PublishAlways => "publishalways",
            Field::Interval => "interval",
            Field::Topic => "topic",
            Field::Title => "title",
            Field::NextReadDate => "nextReadDate",
        }
    }

    /// The decode policy for this field.
    pub fn presence(&self) -> Presence {
        match self {
            Field::Address
            | Field::RegisterType
            | Field::Access
            | Field::ValueType
            | Field::MqttVisibility
            | Field::Interval
            | Field::Topic
            | Field::Title => Presence::Required,
            Field::Length
            | Field::Endianness
            | Field::Factor
            | Field::Unit
            | Field::PublishAlways
            | Field::NextReadDate => Presence::Optional,
        }
    }
}

/// A register address as written in the document: a native integer or a
/// decimal / `0x`-prefixed hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AddressLiteral {
    Integer(u64),
    Text(String),
}

impl AddressLiteral {
    /// Normalize the literal to an integer address.
    pub fn resolve(self) -> Result<u64, DecodeError> {
        match self {
            AddressLiteral::Integer(address) => Ok(address),
            AddressLiteral::Text(literal) => {
                debug!(literal = %literal, "Parsing string address");
                parse_address(&literal).ok_or(DecodeError::CorruptedAddress {
                    field: Field::Address.key(),
                    literal,
                })
            }
        }
    }
}

/// Parse a string address: hexadecimal after a `0x` prefix, decimal otherwise.
pub fn parse_address(literal: &str) -> Option<u64> {
    match literal.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => literal.parse().ok(),
    }
}

/// Reads typed fields out of one record according to the policy table.
pub struct RecordReader<'a> {
    record: &'a Map<String, Value>,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'a Map<String, Value>) -> Self {
        Self { record }
    }

    /// Decode a field and apply its presence policy.
    pub fn field<T: DeserializeOwned>(&self, field: Field) -> Result<Option<T>, DecodeError> {
        match (self.parse(field), field.presence()) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), Presence::Required) => Err(e),
            (Err(DecodeError::Missing { .. }), Presence::Optional) => Ok(None),
            (Err(e), Presence::Optional) => {
                warn!(field = field.key(), error = %e, "Ignoring unusable optional field");
                Ok(None)
            }
        }
    }

    /// Decode a required field.
    pub fn required<T: DeserializeOwned>(&self, field: Field) -> Result<T, DecodeError> {
        debug_assert_eq!(field.presence(), Presence::Required);
        self.field(field)?.ok_or(DecodeError::Missing { field: field.key() })
    }

    /// Decode an optional field.
    pub fn optional<T: DeserializeOwned>(&self, field: Field) -> Option<T> {
        debug_assert_eq!(field.presence(), Presence::Optional);
        self.field(field).ok().flatten()
    }

    fn parse<T: DeserializeOwned>(&self, field: Field) -> Result<T, DecodeError> {
        match self.record.get(field.key()) {
            None | Some(Value::Null) => Err(DecodeError::Missing { field: field.key() }),
            Some(value) => T::deserialize(value).map_err(|e| DecodeError::Invalid {
                field: field.key(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Decode one record into a register definition.
pub fn decode_record(record: &Map<String, Value>) -> Result<RegisterDefinition, DecodeError> {
    let reader = RecordReader::new(record);

    let address = reader
        .required::<AddressLiteral>(Field::Address)
        .map_err(|e| match e {
            DecodeError::Invalid { field, .. } => DecodeError::Invalid {
                field,
                reason: "expected a non-negative integer or a string".to_string(),
            },
            other => other,
        })?
        .resolve()?;

    let definition = RegisterDefinition {
        address,
        length: reader.optional(Field::Length),
        register_type: reader.required(Field::RegisterType)?,
        access: reader.required(Field::Access)?,
        endianness: reader.optional(Field::Endianness),
        value_type: reader.required(Field::ValueType)?,
        factor: reader.optional(Field::Factor),
        unit: reader.optional(Field::Unit),
        mqtt_visibility: reader.required(Field::MqttVisibility)?,
        publish_always: reader.optional(Field::PublishAlways),
        interval: reader.required(Field::Interval)?,
        topic: reader.required(Field::Topic)?,
        title: reader.required(Field::Title)?,
    };

    // The scheduling cursor is reset on every load, whatever the document says.
    if let Some(next_read) = reader.optional::<Value>(Field::NextReadDate) {
        trace!(address, next_read = %next_read, "Discarding nextReadDate from document");
    }

    debug!(address, topic = %definition.topic, "Decoded register definition");
    Ok(definition)
}

/// Decode a record that may not be an object.
pub fn decode_value(value: &Value) -> Result<RegisterDefinition, DecodeError> {
    match value {
        Value::Object(record) => decode_record(record),
        _ => Err(DecodeError::NotARecord),
    }
}
