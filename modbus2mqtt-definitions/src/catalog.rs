//! Address-keyed catalog of register definitions.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::decode::{DecodeError, decode_value};
use crate::definition::{MqttVisibility, RegisterDefinition};
use crate::schedule::PollSchedule;

/// Errors that abort a catalog load.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read definitions: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse definitions document: {0}")]
    Parse(String),

    #[error("Definition #{index}: {source}")]
    Record {
        index: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Duplicate address {address} in definitions #{first} and #{second}")]
    DuplicateAddress {
        address: u64,
        first: usize,
        second: usize,
    },
}

impl From<json5::Error> for CatalogError {
    fn from(err: json5::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Immutable mapping from register address to definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    definitions: BTreeMap<u64, RegisterDefinition>,
}

/// Counts logged after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub definitions: usize,
    pub readable: usize,
    pub writable: usize,
    pub visible: usize,
    pub retained: usize,
    pub scaled: usize,
}

impl Catalog {
    /// Build a catalog from decoded definitions, rejecting repeated addresses.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = RegisterDefinition>,
    ) -> Result<Self, CatalogError> {
        // Keeps the document position of each address for duplicate diagnostics.
        let mut indexed: BTreeMap<u64, (usize, RegisterDefinition)> = BTreeMap::new();

        for (index, definition) in definitions.into_iter().enumerate() {
            match indexed.entry(definition.address) {
                Entry::Occupied(slot) => {
                    return Err(CatalogError::DuplicateAddress {
                        address: definition.address,
                        first: slot.get().0,
                        second: index,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert((index, definition));
                }
            }
        }

        let map = indexed
            .into_iter()
            .map(|(address, (_, definition))| (address, definition))
            .collect();

        Ok(Self { definitions: map })
    }

    /// Decode a definitions document held in memory.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CatalogError> {
        let text = std::str::from_utf8(bytes).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_str_document(text)
    }

    /// Read the whole source, then decode it.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, CatalogError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_slice(&bytes)
    }

    /// Load a definitions file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading register definitions");
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_str_document(text: &str) -> Result<Self, CatalogError> {
        let records = parse_records(text)?;

        let definitions = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                decode_value(record).map_err(|source| CatalogError::Record { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Self::from_definitions(definitions)?;
        info!(definitions = catalog.len(), "Decoded register definitions");
        Ok(catalog)
    }

    pub fn get(&self, address: u64) -> Option<&RegisterDefinition> {
        self.definitions.get(&address)
    }

    pub fn contains(&self, address: u64) -> bool {
        self.definitions.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.definitions.values()
    }

    pub fn addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.definitions.keys().copied()
    }

    /// Find the definition publishing on a topic (used to route set requests).
    pub fn by_topic(&self, topic: &str) -> Option<&RegisterDefinition> {
        self.iter().find(|def| def.topic == topic)
    }

    pub fn readable(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.iter().filter(|def| def.access.is_readable())
    }

    pub fn writable(&self) -> impl Iterator<Item = &RegisterDefinition> {
        self.iter().filter(|def| def.access.is_writable())
    }

    /// Fresh scheduling state with every register due immediately.
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::for_catalog(self)
    }

    pub fn summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary {
            definitions: self.len(),
            ..Default::default()
        };

        for def in self.iter() {
            summary.readable += def.access.is_readable() as usize;
            summary.writable += def.access.is_writable() as usize;
            summary.scaled += def.has_factor() as usize;
            match def.mqtt_visibility {
                MqttVisibility::Invisible => {}
                MqttVisibility::Visible => summary.visible += 1,
                MqttVisibility::Retained => summary.retained += 1,
            }
        }

        summary
    }

    /// Serialize as a definitions document (array in address order).
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let definitions: Vec<&RegisterDefinition> = self.iter().collect();
        serde_json::to_string_pretty(&definitions)
    }
}

/// Parse the document as plain JSON, falling back to JSON5.
///
/// JSON comes first: json5 reads every integer as `i64`, while serde_json
/// keeps the full `u64` range and turns larger integers into `f64`.
fn parse_records(text: &str) -> Result<Vec<Value>, CatalogError> {
    match serde_json::from_str(text) {
        Ok(records) => Ok(records),
        Err(e) => {
            debug!(error = %e, "Definitions are not plain JSON, trying JSON5");
            Ok(json5::from_str(text)?)
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a RegisterDefinition;
    type IntoIter = std::collections::btree_map::Values<'a, u64, RegisterDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Access, sample};

    const DOCUMENT: &str = r#"[
        {
            "address": "0x10",
            "modbustype": "holding",
            "modbusaccess": "readwrite",
            "valuetype": "int16",
            "factor": 0.1,
            "unit": "°C",
            "mqtt": "retained",
            "interval": 30,
            "topic": "heater/setpoint",
            "title": "Heater setpoint"
        },
        {
            "address": 100,
            "modbustype": "input",
            "modbusaccess": "read",
            "valuetype": "uint32",
            "mqtt": "visible",
            "interval": 1.5,
            "topic": "meter/power",
            "title": "Active power"
        },
        {
            "address": "200",
            "modbustype": "coil",
            "modbusaccess": "write",
            "valuetype": "bool",
            "mqtt": "invisible",
            "interval": 60,
            "topic": "relay/1",
            "title": "Relay 1"
        }
    ]"#;

    #[test]
    fn test_load_document() {
        let catalog = Catalog::from_slice(DOCUMENT.as_bytes()).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.addresses().collect::<Vec<_>>(), vec![16, 100, 200]);
        assert_eq!(catalog.get(16).unwrap().topic, "heater/setpoint");
        assert!(catalog.contains(200));
        assert!(!catalog.contains(17));
    }

    #[test]
    fn test_json5_document() {
        let doc = r#"[
            // inverter serial number
            {
                address: 48,
                length: 8,
                modbustype: 'holding',
                modbusaccess: 'read',
                valuetype: 'string',
                mqtt: 'retained',
                interval: 3600,
                topic: 'inverter/serial',
                title: 'Serial number',
            },
        ]"#;

        let catalog = Catalog::from_slice(doc.as_bytes()).unwrap();
        let def = catalog.get(48).unwrap();
        assert_eq!(def.span(), 8);
    }

    #[test]
    fn test_duplicate_address() {
        let catalog = Catalog::from_definitions(vec![sample(100), sample(1), sample(100)]);

        match catalog {
            Err(CatalogError::DuplicateAddress {
                address,
                first,
                second,
            }) => {
                assert_eq!(address, 100);
                assert_eq!(first, 0);
                assert_eq!(second, 2);
            }
            other => panic!("Expected DuplicateAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_hex_and_decimal_collide() {
        let doc = r#"[
            { "address": "0x64", "modbustype": "holding", "modbusaccess": "read", "valuetype": "uint16", "mqtt": "visible", "interval": 1, "topic": "a", "title": "A" },
            { "address": 100, "modbustype": "holding", "modbusaccess": "read", "valuetype": "uint16", "mqtt": "visible", "interval": 1, "topic": "b", "title": "B" }
        ]"#;

        assert!(matches!(
            Catalog::from_slice(doc.as_bytes()),
            Err(CatalogError::DuplicateAddress { address: 100, .. })
        ));
    }

    #[test]
    fn test_record_error_carries_index() {
        let doc = r#"[
            { "address": 1, "modbustype": "holding", "modbusaccess": "read", "valuetype": "uint16", "mqtt": "visible", "interval": 1, "topic": "a", "title": "A" },
            { "address": 2, "modbustype": "holding", "modbusaccess": "read", "valuetype": "uint16", "mqtt": "visible", "interval": 1, "title": "B" }
        ]"#;

        match Catalog::from_slice(doc.as_bytes()) {
            Err(CatalogError::Record { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(source, DecodeError::Missing { field: "topic" }));
            }
            other => panic!("Expected Record error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_an_array() {
        assert!(matches!(
            Catalog::from_slice(br#"{ "address": 1 }"#),
            Err(CatalogError::Parse(_))
        ));
        assert!(matches!(
            Catalog::from_slice(b"[1, 2"),
            Err(CatalogError::Parse(_))
        ));
    }

    fn single(extra: &str, address: &str) -> String {
        format!(
            r#"[{{ "address": {address}, "modbustype": "holding", "modbusaccess": "read",
                 "valuetype": "uint16", "mqtt": "visible", "interval": 1,
                 "topic": "a", "title": "A"{extra} }}]"#
        )
    }

    #[test]
    fn test_oversized_length_degrades_to_none() {
        let doc = single(r#", "length": 100000000000000000000"#, "1");
        let catalog = Catalog::from_slice(doc.as_bytes()).unwrap();

        assert_eq!(catalog.get(1).unwrap().length, None);
    }

    #[test]
    fn test_oversized_factor_is_kept() {
        let doc = single(r#", "factor": 100000000000000000000"#, "1");
        let catalog = Catalog::from_slice(doc.as_bytes()).unwrap();

        let def = catalog.get(1).unwrap();
        assert_eq!(def.factor, Some(1e20));
        assert!(def.has_factor());
    }

    #[test]
    fn test_native_address_full_u64_range() {
        for address in [9_223_372_036_854_775_808u64, u64::MAX] {
            let doc = single("", &address.to_string());
            let catalog = Catalog::from_slice(doc.as_bytes()).unwrap();
            assert!(catalog.contains(address), "address {} not decoded", address);

            let quoted = single("", &format!("\"{}\"", address));
            let catalog = Catalog::from_slice(quoted.as_bytes()).unwrap();
            assert!(catalog.contains(address));
        }
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let mut bytes = single("", "1").into_bytes();
        bytes.push(0xff);

        assert!(matches!(
            Catalog::from_slice(&bytes),
            Err(CatalogError::Parse(_))
        ));
        assert!(matches!(
            Catalog::from_reader(bytes.as_slice()),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_document() {
        let catalog = Catalog::from_slice(b"[]").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_queries() {
        let catalog = Catalog::from_slice(DOCUMENT.as_bytes()).unwrap();

        assert_eq!(catalog.by_topic("meter/power").unwrap().address, 100);
        assert!(catalog.by_topic("unknown").is_none());

        let readable: Vec<u64> = catalog.readable().map(|d| d.address).collect();
        assert_eq!(readable, vec![16, 100]);

        let writable: Vec<u64> = catalog.writable().map(|d| d.address).collect();
        assert_eq!(writable, vec![16, 200]);
        assert!(catalog.writable().all(|d| d.access != Access::Read));
    }

    #[test]
    fn test_summary() {
        let catalog = Catalog::from_slice(DOCUMENT.as_bytes()).unwrap();
        let summary = catalog.summary();

        assert_eq!(
            summary,
            CatalogSummary {
                definitions: 3,
                readable: 2,
                writable: 2,
                visible: 1,
                retained: 1,
                scaled: 1,
            }
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let catalog = Catalog::from_slice(DOCUMENT.as_bytes()).unwrap();
        let json = catalog.to_json_pretty().unwrap();
        let reloaded = Catalog::from_slice(json.as_bytes()).unwrap();

        assert_eq!(catalog, reloaded);
        // Addresses are normalized to integers on output
        assert!(json.contains("\"address\": 16"));
    }
}
