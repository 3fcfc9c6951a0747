//! Raw attribute reports handed over by the transport

use crate::cluster::{ias_zone_attrs, id};
use crate::value::RawValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zcl_codec::attributes::{parse_attribute_records, parse_read_response};
use zcl_codec::commands::ias_zone;
use zcl_codec::{GlobalCommand, OnOffCommand, ProtocolError, ZclFrame};

/// Category of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Unsolicited attribute report
    AttributeReport,
    /// Response to an explicit read
    ReadResponse,
    CommandOn,
    CommandOff,
    CommandToggle,
    /// IAS zone status change notification
    StatusChangeNotification,
}

/// One inbound telemetry record from a single endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttributeReport {
    pub cluster: u16,
    pub endpoint: u8,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    #[serde(default)]
    pub attributes: BTreeMap<u16, RawValue>,
}

impl RawAttributeReport {
    #[must_use]
    pub fn new(cluster: u16, endpoint: u8, report_type: ReportType) -> Self {
        Self {
            cluster,
            endpoint,
            report_type,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: u16, value: RawValue) -> Self {
        self.attributes.insert(attribute, value);
        self
    }

    #[must_use]
    pub fn attribute(&self, attribute: u16) -> Option<&RawValue> {
        self.attributes.get(&attribute)
    }

    /// Build a report from a ZCL frame received on `cluster` / `endpoint`
    ///
    /// Returns `Ok(None)` for frames that carry no telemetry (responses to
    /// writes, default responses, unknown cluster commands).
    #[allow(clippy::missing_errors_doc)]
    pub fn from_frame(
        cluster: u16,
        endpoint: u8,
        frame: &ZclFrame,
    ) -> Result<Option<Self>, ProtocolError> {
        if frame.is_cluster_specific() {
            return Ok(Self::from_cluster_command(cluster, endpoint, frame));
        }

        let report = match frame.global_command() {
            Some(GlobalCommand::ReportAttributes) => {
                let mut report = Self::new(cluster, endpoint, ReportType::AttributeReport);
                for record in parse_attribute_records(frame.payload())? {
                    report
                        .attributes
                        .insert(record.id, RawValue::from(&record.value));
                }
                report
            }
            Some(GlobalCommand::ReadAttributesResponse) => {
                let mut report = Self::new(cluster, endpoint, ReportType::ReadResponse);
                for record in parse_read_response(frame.payload())? {
                    match record.value {
                        Some(value) => {
                            report.attributes.insert(record.id, RawValue::from(&value));
                        }
                        None => tracing::debug!(
                            "Read of {:#06x} on endpoint {} failed with status {:#04x}",
                            record.id,
                            endpoint,
                            record.status
                        ),
                    }
                }
                report
            }
            _ => return Ok(None),
        };
        Ok(Some(report))
    }

    fn from_cluster_command(cluster: u16, endpoint: u8, frame: &ZclFrame) -> Option<Self> {
        match cluster {
            id::ON_OFF => {
                let report_type = match OnOffCommand::from_u8(frame.command_id())? {
                    OnOffCommand::On => ReportType::CommandOn,
                    OnOffCommand::Off => ReportType::CommandOff,
                    OnOffCommand::Toggle => ReportType::CommandToggle,
                };
                Some(Self::new(cluster, endpoint, report_type))
            }
            id::IAS_ZONE if frame.command_id() == ias_zone::STATUS_CHANGE_NOTIFICATION => {
                let mut report = Self::new(cluster, endpoint, ReportType::StatusChangeNotification);
                if let [low, high, ..] = *frame.payload() {
                    report.attributes.insert(
                        ias_zone_attrs::ZONE_STATUS,
                        RawValue::Integer(i64::from(u16::from_le_bytes([low, high]))),
                    );
                }
                Some(report)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::metering_attrs;
    use zcl_codec::attributes::{encode_attribute_records, encode_read_response};
    use zcl_codec::{AttributeRecord, AttributeValue, ReadRecord};

    #[test]
    fn test_from_report_frame() {
        let payload = encode_attribute_records(&[AttributeRecord::new(
            metering_attrs::CURRENT_SUMMATION_DELIVERED,
            AttributeValue::Uint48(1500),
        )])
        .unwrap();
        let frame = ZclFrame::global(5, GlobalCommand::ReportAttributes, payload).from_server();

        let report = RawAttributeReport::from_frame(id::METERING, 1, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(report.report_type, ReportType::AttributeReport);
        assert_eq!(
            report.attribute(metering_attrs::CURRENT_SUMMATION_DELIVERED),
            Some(&RawValue::Words(0, 1500))
        );
    }

    #[test]
    fn test_read_response_skips_failures() {
        let payload = encode_read_response(&[
            ReadRecord::success(0xF002, AttributeValue::Uint16(75)),
            ReadRecord::unsupported(0xF001),
        ])
        .unwrap();
        let frame = ZclFrame::global(1, GlobalCommand::ReadAttributesResponse, payload);

        let report = RawAttributeReport::from_frame(id::METERING, 3, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(report.report_type, ReportType::ReadResponse);
        assert_eq!(report.attributes.len(), 1);
        assert_eq!(report.attribute(0xF002), Some(&RawValue::Integer(75)));
    }

    #[test]
    fn test_on_off_command() {
        let frame = ZclFrame::cluster_command(9, OnOffCommand::On as u8, Vec::new());
        let report = RawAttributeReport::from_frame(id::ON_OFF, 4, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(report.report_type, ReportType::CommandOn);
        assert_eq!(report.endpoint, 4);
    }

    #[test]
    fn test_zone_status_notification() {
        // Zone status 0x0005: alarm1 + tamper, extended status, zone id, delay
        let frame = ZclFrame::cluster_command(
            2,
            ias_zone::STATUS_CHANGE_NOTIFICATION,
            vec![0x05, 0x00, 0x00, 0x01, 0x00, 0x00],
        );
        let report = RawAttributeReport::from_frame(id::IAS_ZONE, 4, &frame)
            .unwrap()
            .unwrap();
        assert_eq!(
            report.attribute(ias_zone_attrs::ZONE_STATUS),
            Some(&RawValue::Integer(5))
        );
    }

    #[test]
    fn test_write_response_is_not_telemetry() {
        let frame = ZclFrame::global(1, GlobalCommand::WriteAttributesResponse, vec![0x00]);
        assert_eq!(
            RawAttributeReport::from_frame(id::METERING, 3, &frame).unwrap(),
            None
        );
    }

    #[test]
    fn test_report_json() {
        let json = r#"{"cluster":1794,"endpoint":2,"type":"attribute_report"}"#;
        let report: RawAttributeReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.cluster, id::METERING);
        assert!(report.attributes.is_empty());
    }
}
