//! Register definition catalog for the modbus2mqtt bridge.
//!
//! Loads a document of register definitions, decodes every record under a
//! per-field policy and indexes the result by register address.
//!
//! # Definitions Document
//!
//! ```text
//! [
//!   {
//!     "address": "0x1388",          // integer, decimal string or 0x-prefixed hex string
//!     "modbustype": "holding",
//!     "modbusaccess": "read",
//!     "valuetype": "uint16",
//!     "factor": 0.1,                // optional
//!     "unit": "V",                  // optional
//!     "mqtt": "visible",
//!     "interval": 10,
//!     "topic": "inverter/voltage",
//!     "title": "Grid voltage"
//!   }
//! ]
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Loading and querying the address-keyed catalog
//! - [`config`] - Loader configuration (JSON5)
//! - [`decode`] - Field policy table and record decoding
//! - [`definition`] - Register definition types
//! - [`schedule`] - Poll cursors owned by the poller
//! - [`store`] - Shared holder of the current catalog

pub mod catalog;
pub mod config;
pub mod decode;
pub mod definition;
pub mod schedule;
pub mod store;

pub use catalog::{Catalog, CatalogError, CatalogSummary};
pub use decode::{AddressLiteral, DecodeError, Field, Presence};
pub use definition::{
    Access, Endianness, MqttVisibility, RegisterDefinition, RegisterType, ValueType,
};
pub use schedule::{EARLIEST, PollSchedule};
pub use store::CatalogStore;
