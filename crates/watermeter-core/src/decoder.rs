//! Attribute decoder: raw reports to named state fields

use crate::cluster::{self, id, ias_zone_attrs, metering_attrs, power_config_attrs, zone_status};
use crate::profile::DeviceProfile;
use crate::report::{RawAttributeReport, ReportType};
use crate::router::EndpointRouter;
use crate::value::{StateUpdate, StateValue};
use serde::Serialize;

/// Attribute reports and read responses decode the same way
const ATTRIBUTE_DATA: &[ReportType] = &[ReportType::AttributeReport, ReportType::ReadResponse];

/// What a decoder rule extracts from a matching report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeKind {
    /// Metering accumulator, always emitted (`0` when absent)
    Accumulator {
        attribute: u16,
        field: String,
        multiplier: u64,
    },
    /// `battery` (%) and `voltage` (mV) from the power configuration cluster
    Battery,
    /// IAS zone status bits: `water_leak`, `tamper`, `battery_low`
    WaterLeak,
    /// Remote on/off command: `action` = `on_<endpoint>`
    Action,
    /// Single attribute copied as an integer, omitted when absent
    Attribute { attribute: u16, field: String },
}

/// Maps a (cluster, report type) pair to state fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecoderRule {
    pub cluster: u16,
    pub report_types: Vec<ReportType>,
    /// Endpoints the rule listens on; empty means any
    pub endpoints: Vec<u8>,
    pub kind: DecodeKind,
}

impl DecoderRule {
    #[must_use]
    pub fn new(cluster: u16, report_types: &[ReportType], kind: DecodeKind) -> Self {
        Self {
            cluster,
            report_types: report_types.to_vec(),
            endpoints: Vec::new(),
            kind,
        }
    }

    /// `currentSummDelivered` -> `volume`, unscaled
    #[must_use]
    pub fn metering_volume(endpoints: &[u8]) -> Self {
        Self::new(
            id::METERING,
            ATTRIBUTE_DATA,
            DecodeKind::Accumulator {
                attribute: metering_attrs::CURRENT_SUMMATION_DELIVERED,
                field: "volume".to_string(),
                multiplier: 1,
            },
        )
        .on_endpoints(endpoints)
    }

    #[must_use]
    pub fn battery() -> Self {
        Self::new(id::POWER_CONFIG, ATTRIBUTE_DATA, DecodeKind::Battery)
    }

    #[must_use]
    pub fn ias_water_leak_alarm() -> Self {
        Self::new(
            id::IAS_ZONE,
            &[
                ReportType::StatusChangeNotification,
                ReportType::AttributeReport,
            ],
            DecodeKind::WaterLeak,
        )
    }

    #[must_use]
    pub fn command_on_off(endpoints: &[u8]) -> Self {
        Self::new(
            id::ON_OFF,
            &[
                ReportType::CommandOn,
                ReportType::CommandOff,
                ReportType::CommandToggle,
            ],
            DecodeKind::Action,
        )
        .on_endpoints(endpoints)
    }

    /// Copy one attribute into `field`
    #[must_use]
    pub fn attribute(cluster: u16, attribute: u16, field: &str) -> Self {
        Self::new(
            cluster,
            ATTRIBUTE_DATA,
            DecodeKind::Attribute {
                attribute,
                field: field.to_string(),
            },
        )
    }

    #[must_use]
    pub fn on_endpoints(mut self, endpoints: &[u8]) -> Self {
        self.endpoints = endpoints.to_vec();
        self
    }

    #[must_use]
    pub fn matches(&self, report: &RawAttributeReport) -> bool {
        self.cluster == report.cluster
            && self.report_types.contains(&report.report_type)
            && (self.endpoints.is_empty() || self.endpoints.contains(&report.endpoint))
    }

    /// Base field names this rule can emit
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        match &self.kind {
            DecodeKind::Accumulator { field, .. } | DecodeKind::Attribute { field, .. } => {
                vec![field.as_str()]
            }
            DecodeKind::Battery => vec!["battery", "voltage"],
            DecodeKind::WaterLeak => vec!["water_leak", "tamper", "battery_low"],
            DecodeKind::Action => vec!["action"],
        }
    }

    /// Extract (base field, value) pairs from a matching report
    #[must_use]
    pub fn apply(
        &self,
        report: &RawAttributeReport,
        multi_endpoint: bool,
    ) -> Vec<(String, StateValue)> {
        match &self.kind {
            DecodeKind::Accumulator {
                attribute,
                field,
                multiplier,
            } => {
                let raw = report
                    .attribute(*attribute)
                    .and_then(|value| value.accumulator())
                    .unwrap_or(0);
                vec![(
                    field.clone(),
                    StateValue::Unsigned(raw.saturating_mul(*multiplier)),
                )]
            }
            DecodeKind::Battery => {
                let mut fields = Vec::new();
                // Both attributes are uint8 on the wire
                let uint8 = |attribute: u16| -> Option<u8> {
                    let value = report.attribute(attribute)?.as_i64()?;
                    match u8::try_from(value) {
                        Ok(value) => Some(value),
                        Err(_) => {
                            tracing::debug!(
                                "Dropping out of range value {} for attribute {:#06x}",
                                value,
                                attribute
                            );
                            None
                        }
                    }
                };
                if let Some(percentage) = uint8(power_config_attrs::BATTERY_PERCENTAGE_REMAINING) {
                    // Reported in half percent steps
                    let battery = f64::from(percentage) / 2.0;
                    fields.push(("battery".to_string(), StateValue::Float(battery)));
                }
                if let Some(voltage) = uint8(power_config_attrs::BATTERY_VOLTAGE) {
                    fields.push((
                        "voltage".to_string(),
                        StateValue::Unsigned(u64::from(voltage) * 100),
                    ));
                }
                fields
            }
            DecodeKind::WaterLeak => {
                let status = report
                    .attribute(ias_zone_attrs::ZONE_STATUS)
                    .and_then(|value| value.as_i64())
                    .unwrap_or(0);
                let bit = |mask: u16| StateValue::Bool(status & i64::from(mask) != 0);
                vec![
                    ("water_leak".to_string(), bit(zone_status::ALARM1)),
                    ("tamper".to_string(), bit(zone_status::TAMPER)),
                    ("battery_low".to_string(), bit(zone_status::BATTERY_LOW)),
                ]
            }
            DecodeKind::Action => {
                let action = match report.report_type {
                    ReportType::CommandOn => "on",
                    ReportType::CommandOff => "off",
                    ReportType::CommandToggle => "toggle",
                    _ => return Vec::new(),
                };
                let action = if multi_endpoint {
                    format!("{action}_{}", report.endpoint)
                } else {
                    action.to_string()
                };
                vec![("action".to_string(), StateValue::Text(action))]
            }
            DecodeKind::Attribute { attribute, field } => report
                .attribute(*attribute)
                .and_then(|value| value.as_i64())
                .map(|value| vec![(field.clone(), StateValue::from(value))])
                .unwrap_or_default(),
        }
    }
}

/// Decode a raw report into published key -> value pairs
///
/// Never fails: unrecognised telemetry yields an empty update, and fields
/// whose endpoint is not declared by the profile are dropped.
#[must_use]
pub fn decode(report: &RawAttributeReport, profile: &DeviceProfile) -> StateUpdate {
    let router = EndpointRouter::new(profile);
    let mut update = StateUpdate::new();
    let mut recognised = false;

    for rule in profile.decoders().iter().filter(|rule| rule.matches(report)) {
        recognised = true;
        for (field, value) in rule.apply(report, profile.multi_endpoint()) {
            match router.inbound(&field, report.endpoint) {
                Ok(key) => {
                    update.insert(key, value);
                }
                Err(e) => tracing::warn!(
                    "Dropping {} from endpoint {} of {}: {}",
                    field,
                    report.endpoint,
                    profile.model(),
                    e
                ),
            }
        }
    }

    if !recognised {
        tracing::debug!(
            "Ignoring {:?} on cluster {:#06x} ({}) endpoint {}",
            report.report_type,
            report.cluster,
            cluster::cluster_name(report.cluster),
            report.endpoint
        );
    }

    update
}
