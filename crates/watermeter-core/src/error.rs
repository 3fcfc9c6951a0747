//! Error types for the converter

use crate::transport::TransportError;
use thiserror::Error;
use zcl_codec::ProtocolError;

/// Errors surfaced by decode / encode calls and the bridge
#[derive(Error, Debug)]
pub enum ConverterError {
    /// Command value is neither a known token nor a base-10 integer, or does not fit the wire type
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    /// Field has no declared endpoint binding or rule
    #[error("Unbound field: {0}")]
    UnboundField(String),

    /// No profile matches the model identifier
    #[error("No profile for model: {0}")]
    ProfileNotFound(String),

    /// Device is not bound to a profile
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Malformed IEEE address
    #[error("Invalid IEEE address: {0}")]
    InvalidAddress(String),

    /// Transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wire codec failure
    #[error("Codec error: {0}")]
    Codec(#[from] ProtocolError),
}

/// Configuration-time defects found while building a profile or registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("Profile {profile} has no model identifiers")]
    MissingModel { profile: String },

    #[error("Model identifier {0} is claimed by more than one profile")]
    DuplicateModel(String),

    #[error("Profile {profile}: field `{field}` has no {missing} rule")]
    UnboundField {
        profile: String,
        field: String,
        missing: &'static str,
    },

    #[error("Profile {profile}: rule refers to field `{field}` that is not exposed")]
    UndeclaredField { profile: String, field: String },

    #[error("Profile {profile}: field `{field}` has more than one {kind} rule")]
    DuplicateRule {
        profile: String,
        field: String,
        kind: &'static str,
    },

    #[error("Profile {profile}: field `{field}` access does not allow {operation}")]
    AccessMismatch {
        profile: String,
        field: String,
        operation: &'static str,
    },
}
