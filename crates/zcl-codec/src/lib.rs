//! Zigbee Cluster Library wire codec
//!
//! This crate implements the parts of the ZCL frame format needed to talk
//! to the water meter: frame headers, typed attribute values and the global
//! read / write / report / configure-reporting payloads.

pub mod attributes;
pub mod commands;
pub mod frame;
pub mod types;

pub use attributes::{AttributeRecord, ReadRecord, ReportingRecord};
pub use commands::{GlobalCommand, OnOffCommand};
pub use frame::ZclFrame;
pub use types::*;
