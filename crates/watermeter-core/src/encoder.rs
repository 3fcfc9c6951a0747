//! Command encoder: set / get commands to write / read requests

use crate::error::ConverterError;
use crate::profile::DeviceProfile;
use crate::router::EndpointRouter;
use crate::transport::{ReadRequest, WriteRequest};
use crate::value::{CommandValue, StateUpdate, StateValue};
use serde::Serialize;
use zcl_codec::{AttributeRecord, AttributeValue, DataType};

/// Where a rule's requests are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Always this endpoint, whatever endpoint reports the field
    Fixed(u8),
    /// The endpoint named by the command key's `_<endpoint>` suffix
    Qualified,
}

/// Binds a settable field to one attribute with one wire type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncoderRule {
    pub field: String,
    pub target: Target,
    pub cluster: u16,
    pub attribute: u16,
    pub wire: DataType,
}

impl EncoderRule {
    #[must_use]
    pub fn new(field: &str, target: Target, cluster: u16, attribute: u16, wire: DataType) -> Self {
        Self {
            field: field.to_string(),
            target,
            cluster,
            attribute,
            wire,
        }
    }
}

/// Binds a gettable field to the attributes that answer it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadRule {
    pub field: String,
    pub target: Target,
    pub cluster: u16,
    pub attributes: Vec<u16>,
}

impl ReadRule {
    #[must_use]
    pub fn new(field: &str, target: Target, cluster: u16, attributes: &[u16]) -> Self {
        Self {
            field: field.to_string(),
            target,
            cluster,
            attributes: attributes.to_vec(),
        }
    }
}

/// Result of a set command
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    /// Requests to send, and the state to publish optimistically
    ///
    /// The state carries the normalized integer (`ON` publishes `1`), not
    /// the value as the caller spelled it.
    Write {
        requests: Vec<WriteRequest>,
        state: StateUpdate,
    },
    /// The field takes no writes; nothing is sent
    Ignored { key: String },
}

/// Encode a set command
///
/// # Errors
///
/// * [`ConverterError::UnboundField`] if the key is not declared by the profile
/// * [`ConverterError::InvalidValue`] if the value does not normalize to an
///   integer that fits the rule's wire type
pub fn encode_set(
    key: &str,
    value: &CommandValue,
    profile: &DeviceProfile,
) -> Result<EncodeOutcome, ConverterError> {
    let router = EndpointRouter::new(profile);
    let route = router.outbound(key)?;

    let Some(rule) = profile.encoder(&route.field) else {
        tracing::debug!("{} takes no writes on {}, ignoring set", key, profile.model());
        return Ok(EncodeOutcome::Ignored {
            key: key.to_string(),
        });
    };

    let endpoint = router.target(&route, rule.target)?;
    let normalized = value.normalize(key)?;
    let invalid = || ConverterError::InvalidValue {
        field: key.to_string(),
        value: value.raw().to_string(),
    };
    let attribute = AttributeValue::from_integer(rule.wire, normalized).map_err(|_| invalid())?;

    tracing::debug!(
        "Encoded {}={} as {:?} for {:#06x} on endpoint {}",
        key,
        value,
        attribute,
        rule.attribute,
        endpoint
    );

    let request = WriteRequest {
        endpoint,
        cluster: rule.cluster,
        attributes: vec![AttributeRecord::new(rule.attribute, attribute)],
    };
    let mut state = StateUpdate::new();
    state.insert(route.key, StateValue::from(normalized));

    Ok(EncodeOutcome::Write {
        requests: vec![request],
        state,
    })
}

/// Encode a get command
///
/// # Errors
///
/// Returns [`ConverterError::UnboundField`] if the key is undeclared, has no
/// get rule, or needs an endpoint qualifier it does not carry.
pub fn encode_get(key: &str, profile: &DeviceProfile) -> Result<ReadRequest, ConverterError> {
    let router = EndpointRouter::new(profile);
    let route = router.outbound(key)?;
    let rule = profile
        .getter(&route.field)
        .ok_or_else(|| ConverterError::UnboundField(key.to_string()))?;
    let endpoint = router.target(&route, rule.target)?;

    Ok(ReadRequest {
        endpoint,
        cluster: rule.cluster,
        attributes: rule.attributes.clone(),
    })
}
