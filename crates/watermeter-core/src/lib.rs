//! Water meter converters
//!
//! Decodes multi-endpoint ZCL telemetry from the TLSR8258 water meter family
//! into flat state updates, and encodes set / get commands into attribute
//! writes and reads. Device profiles are static, validated tables; the Zigbee
//! stack itself sits behind [`DeviceTransport`].

pub mod bridge;
pub mod cluster;
pub mod decoder;
pub mod device;
pub mod devices;
pub mod encoder;
pub mod error;
pub mod loopback;
pub mod persistence;
pub mod profile;
pub mod registry;
pub mod report;
pub mod router;
pub mod transport;
pub mod value;

pub use bridge::{BridgeEvent, ConverterBridge, SetBatch, SetCommand};
pub use decoder::{decode, DecodeKind, DecoderRule};
pub use device::{parse_ieee_address, BoundDevice};
pub use encoder::{encode_get, encode_set, EncodeOutcome, EncoderRule, ReadRule, Target};
pub use error::{ConverterError, ProfileError};
pub use loopback::LoopbackTransport;
pub use persistence::BindingStore;
pub use profile::{Access, DeviceProfile, ExposedField, OtaCapability};
pub use registry::ProfileRegistry;
pub use report::{RawAttributeReport, ReportType};
pub use router::{Direction, EndpointRouter, Route};
pub use transport::{
    DeviceTransport, InboundFrame, PendingCommand, ReadRequest, TransportError, WriteRequest,
};
pub use value::{CommandValue, RawValue, StateUpdate, StateValue};
